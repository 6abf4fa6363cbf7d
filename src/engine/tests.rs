//! Tests for engine module

use super::*;
use crate::error::{Error, HandlerError};
use crate::handler::{FnHandler, HandlerOutput, InputContext, PassthroughHandler};
use crate::output::MemorySink;
use crate::schema::{FieldType, MergeStrategy, ERROR_MESSAGE_FIELD};
use crate::source::{open_source, VecSource};
use crate::types::{Outcome, RecordFormat, ThresholdPolicy};
use crate::value::{Record, Value};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

fn records(ids: impl IntoIterator<Item = i32>) -> Vec<Record> {
    ids.into_iter().map(|id| Record::new().with("id", id)).collect()
}

fn id_of(ctx: &InputContext) -> std::result::Result<i32, HandlerError> {
    ctx.record
        .get("id")
        .and_then(Value::as_i64)
        .and_then(|id| i32::try_from(id).ok())
        .ok_or_else(|| HandlerError::business("missing id"))
}

fn doubling() -> RecordProcessor {
    RecordProcessor::new(FnHandler::new(|ctx: &InputContext| {
        let id = id_of(ctx)?;
        Ok(HandlerOutput::success(
            Record::new().with("id", id).with("doubled", id * 2),
        ))
    }))
}

/// Handler that sleeps before succeeding
fn sleeping(millis: u64) -> RecordProcessor {
    RecordProcessor::new(FnHandler::new(move |ctx: &InputContext| {
        std::thread::sleep(Duration::from_millis(millis));
        Ok(HandlerOutput::success(ctx.record.clone()))
    }))
}

fn async_config(timeout_ms: u64) -> ProcessorConfig {
    ProcessorConfig::new()
        .with_execution(ExecutionMode::Async)
        .with_async_timeout(Duration::from_millis(timeout_ms))
}

fn memory_sink() -> Arc<MemorySink> {
    Arc::new(MemorySink::new(RecordFormat::Json))
}

async fn run_batch(
    config: ProcessorConfig,
    processor: RecordProcessor,
    input: Vec<Record>,
    sink: &Arc<MemorySink>,
) -> Result<BatchReport> {
    let batch = BatchProcessor::new(config, processor)?;
    let mut source = VecSource::new(input);
    batch.run(&mut source, sink.clone(), Attributes::new()).await
}

// ============================================================================
// Construction Tests
// ============================================================================

#[test]
fn test_new_rejects_invalid_config() {
    let config = ProcessorConfig::new().with_max_concurrency(0);
    let result = BatchProcessor::new(config, RecordProcessor::new(PassthroughHandler));
    assert!(matches!(result, Err(Error::InvalidConfigValue { .. })));
}

#[tokio::test]
async fn test_config_hooks_fill_empty_slots() {
    let mut config = ProcessorConfig::new().with_attribute("tenant", "acme");
    config
        .hooks
        .build_input
        .insert("tenant".to_string(), "{{ attributes.tenant }}".to_string());

    let sink = memory_sink();
    let report = run_batch(config, RecordProcessor::new(PassthroughHandler), records([1]), &sink)
        .await
        .unwrap();

    assert_eq!(report.routed_to(&Outcome::Success), 1);
    let written = sink.records(&Outcome::Success).unwrap();
    assert_eq!(written[0].to_json(), json!({"id": 1, "tenant": "acme"}));
}

// ============================================================================
// Sync Executor Tests
// ============================================================================

#[test]
fn test_sync_executor_resolves_merged_schema() {
    let sink: Arc<dyn Sink> = memory_sink();
    let ctx = BatchContext::new(
        Attributes::new(),
        SchemaResolver::new(MergeStrategy::InputAndOutput),
        OutcomeMultiplexer::new(sink, Attributes::new()),
    );
    let processor = doubling();
    let mut source = VecSource::new(records([1, 2]));

    SyncExecutor::new(&processor).execute(&mut source, &ctx).unwrap();

    let schema = ctx.multiplexer().unit_schema(&Outcome::Success).unwrap();
    assert_eq!(schema.to_string(), "{id:int, doubled:int}");
    assert_eq!(ctx.stats().records_in, 2);
    assert_eq!(ctx.error_count(), 0);
}

#[tokio::test]
async fn test_sync_preserves_source_order() {
    let sink = memory_sink();
    let report = run_batch(ProcessorConfig::new(), doubling(), records([1, 2, 3]), &sink)
        .await
        .unwrap();

    assert_eq!(report.records_in, 3);
    assert_eq!(report.routed_to(&Outcome::Success), 3);
    assert!(report.is_complete());

    let written: Vec<_> = sink
        .records(&Outcome::Success)
        .unwrap()
        .iter()
        .map(Record::to_json)
        .collect();
    assert_eq!(
        written,
        vec![
            json!({"id": 1, "doubled": 2}),
            json!({"id": 2, "doubled": 4}),
            json!({"id": 3, "doubled": 6}),
        ]
    );
}

#[tokio::test]
async fn test_business_error_writes_error_record() {
    let processor = RecordProcessor::new(FnHandler::new(|_: &InputContext| {
        Err(HandlerError::business("bad id"))
    }));
    let sink = memory_sink();
    let report = run_batch(ProcessorConfig::new(), processor, records([1]), &sink)
        .await
        .unwrap();

    assert_eq!(report.routed_to(&Outcome::Failure), 1);
    assert_eq!(report.errors, 0);
    let failed = sink.records(&Outcome::Failure).unwrap();
    assert_eq!(failed[0].get("id"), Some(&Value::Int(1)));
    assert_eq!(failed[0].get(ERROR_MESSAGE_FIELD).and_then(Value::as_str), Some("bad id"));
    assert!(failed[0].get("atTime").is_some_and(|v| !v.is_null()));
}

fn mixed_id_records() -> Vec<Record> {
    vec![Record::new().with("id", 1), Record::new().with("id", "x")]
}

#[tokio::test]
async fn test_business_error_with_mismatched_input_type_still_routes() {
    let processor = RecordProcessor::new(FnHandler::new(|_: &InputContext| {
        Err(HandlerError::business("rejected"))
    }));
    let sink = memory_sink();
    let report = run_batch(ProcessorConfig::new(), processor, mixed_id_records(), &sink)
        .await
        .unwrap();

    assert_eq!(report.routed_to(&Outcome::Failure), 2);
    let failed = sink.records(&Outcome::Failure).unwrap();
    assert_eq!(failed[0].get("id"), Some(&Value::Int(1)));
    assert_eq!(failed[1].get("id"), Some(&Value::Null));
    assert_eq!(failed[1].get(ERROR_MESSAGE_FIELD).and_then(Value::as_str), Some("rejected"));
}

#[tokio::test]
async fn test_rerouted_violation_with_mismatched_input_type() {
    let processor = RecordProcessor::new(FnHandler::new(|ctx: &InputContext| {
        let output = match ctx.record.get("id") {
            Some(Value::Int(_)) => Record::new().with("a", 7),
            _ => Record::new().with("a", "not a number"),
        };
        Ok(HandlerOutput::success(output))
    }));
    let config = ProcessorConfig::new()
        .with_output_example(r#"{"a": 1}"#)
        .with_merge_strategy(MergeStrategy::OutputOnly);
    let sink = memory_sink();
    let report = run_batch(config, processor, mixed_id_records(), &sink).await.unwrap();

    assert_eq!(report.rerouted, 1);
    assert_eq!(report.routed_to(&Outcome::Success), 1);
    assert_eq!(report.routed_to(&Outcome::Failure), 1);
}

#[tokio::test]
async fn test_input_schema_comes_from_source_record() {
    // Business error on the odd id; the hook-built tenant field never
    // reaches the input schema, whichever outcome comes first.
    let processor = || {
        RecordProcessor::new(FnHandler::new(|ctx: &InputContext| {
            let id = id_of(ctx)?;
            if id % 2 == 1 {
                return Err(HandlerError::business("odd"));
            }
            Ok(HandlerOutput::success(Record::new().with("doubled", id * 2)))
        }))
    };
    let config = || {
        let mut config = ProcessorConfig::new()
            .with_attribute("tenant", "acme")
            .with_merge_strategy(MergeStrategy::InputAndOutput);
        config
            .hooks
            .build_input
            .insert("tenant".to_string(), "{{ attributes.tenant }}".to_string());
        config
    };

    for ids in [[1, 2], [2, 1]] {
        let sink = memory_sink();
        run_batch(config(), processor(), records(ids), &sink).await.unwrap();

        let written = sink.records(&Outcome::Success).unwrap();
        assert_eq!(written[0].to_json(), json!({"id": 2, "doubled": 4}));
        let failed = sink.records(&Outcome::Failure).unwrap();
        assert_eq!(failed[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(failed[0].get("tenant"), None);
    }
}

#[tokio::test]
async fn test_custom_outcomes_get_their_own_units() {
    let processor = RecordProcessor::new(FnHandler::new(|ctx: &InputContext| {
        let id = id_of(ctx)?;
        let outcome = if id % 2 == 0 { "even" } else { "odd" };
        Ok(HandlerOutput::new(outcome, ctx.record.clone()))
    }));
    let sink = memory_sink();
    let report = run_batch(ProcessorConfig::new(), processor, records(1..=5), &sink)
        .await
        .unwrap();

    assert_eq!(report.routed_to(&Outcome::custom("odd")), 3);
    assert_eq!(report.routed_to(&Outcome::custom("even")), 2);
    assert_eq!(sink.outcomes().len(), 2);
}

#[tokio::test]
async fn test_fatal_error_aborts_without_sink_calls() {
    let processor = RecordProcessor::new(FnHandler::new(|ctx: &InputContext| {
        if id_of(ctx)? == 2 {
            return Err(HandlerError::fatal("connection pool exhausted"));
        }
        Ok(HandlerOutput::success(ctx.record.clone()))
    }));
    let sink = memory_sink();
    let result = run_batch(ProcessorConfig::new(), processor, records([1, 2, 3]), &sink).await;

    assert!(matches!(result, Err(Error::HandlerFatal(_))));
    assert!(sink.units().is_empty());
}

#[tokio::test]
async fn test_schema_violation_reroutes_to_failure() {
    let processor = RecordProcessor::new(FnHandler::new(|ctx: &InputContext| {
        let output = if id_of(ctx)? == 2 {
            Record::new().with("a", "not a number")
        } else {
            Record::new().with("a", 7)
        };
        Ok(HandlerOutput::success(output))
    }));
    let config = ProcessorConfig::new()
        .with_output_example(r#"{"a": 1}"#)
        .with_merge_strategy(MergeStrategy::OutputOnly);
    let sink = memory_sink();
    let report = run_batch(config, processor, records([1, 2]), &sink).await.unwrap();

    assert_eq!(report.rerouted, 1);
    assert_eq!(report.routed_to(&Outcome::Success), 1);
    assert_eq!(report.routed_to(&Outcome::Failure), 1);

    let failed = sink.records(&Outcome::Failure).unwrap();
    assert_eq!(failed[0].get("id"), Some(&Value::Int(2)));
    let message = failed[0].get(ERROR_MESSAGE_FIELD).and_then(Value::as_str).unwrap();
    assert!(message.starts_with("Schema violation on field 'a'"));
}

#[tokio::test]
async fn test_host_attributes_override_config() {
    let processor = RecordProcessor::new(FnHandler::new(|ctx: &InputContext| {
        let tenant = ctx.attribute("tenant").unwrap_or_default().to_string();
        Ok(HandlerOutput::success(Record::new().with("tenant", tenant)))
    }));
    let batch = BatchProcessor::new(
        ProcessorConfig::new()
            .with_attribute("tenant", "default")
            .with_merge_strategy(MergeStrategy::OutputOnly),
        processor,
    )
    .unwrap();
    let sink = memory_sink();
    let attributes = Attributes::from([("tenant".to_string(), "acme".to_string())]);

    batch
        .run(&mut VecSource::new(records([1])), sink.clone(), attributes)
        .await
        .unwrap();

    let written = sink.records(&Outcome::Success).unwrap();
    assert_eq!(written[0].to_json(), json!({"tenant": "acme"}));
    let unit = sink.unit(&Outcome::Success).unwrap();
    assert_eq!(unit.attributes.get("tenant").map(String::as_str), Some("acme"));
}

#[tokio::test]
async fn test_embedded_source_schema_seeds_error_schema() {
    let processor = RecordProcessor::new(FnHandler::new(|_: &InputContext| {
        Err(HandlerError::retryable("upstream busy"))
    }));
    let embedded = crate::schema::Schema::new()
        .with_field(crate::schema::SchemaField::new("id", FieldType::Long));
    let sink = Arc::new(MemorySink::new(RecordFormat::Parquet));
    let batch = BatchProcessor::new(ProcessorConfig::new(), processor).unwrap();

    let mut source = VecSource::new(records([1])).with_schema(embedded);
    batch.run(&mut source, sink.clone(), Attributes::new()).await.unwrap();

    let unit = sink.unit(&Outcome::Retry).unwrap();
    let written = open_source(RecordFormat::Parquet, unit.content).unwrap();
    let schema = written.schema().unwrap();
    assert_eq!(schema.field("id").unwrap().field_type, FieldType::Long);
    assert!(schema.field(ERROR_MESSAGE_FIELD).is_some());
}

// ============================================================================
// Async Executor Tests
// ============================================================================

#[tokio::test]
async fn test_async_timeout_routes_original_record_to_retry() {
    let sink = memory_sink();
    let report = run_batch(async_config(10), sleeping(100), records([1]), &sink)
        .await
        .unwrap();

    assert_eq!(report.routed_to(&Outcome::Retry), 1);
    assert_eq!(report.routed_to(&Outcome::Success), 0);
    assert_eq!(report.timeouts, 1);
    assert_eq!(report.errors, 1);

    let retried = sink.records(&Outcome::Retry).unwrap();
    assert_eq!(retried[0].get("id"), Some(&Value::Int(1)));
    assert!(retried[0].get(ERROR_MESSAGE_FIELD).map_or(true, Value::is_null));
}

#[tokio::test]
async fn test_async_collects_in_submission_order() {
    // Earlier records sleep longer, so they finish last
    let processor = RecordProcessor::new(FnHandler::new(|ctx: &InputContext| {
        let id = id_of(ctx)?;
        std::thread::sleep(Duration::from_millis(u64::from((8 - id.unsigned_abs()) * 5)));
        Ok(HandlerOutput::success(ctx.record.clone()))
    }));
    let sink = memory_sink();
    let report = run_batch(async_config(2_000), processor, records(0..8), &sink)
        .await
        .unwrap();

    assert_eq!(report.routed_to(&Outcome::Success), 8);
    let ids: Vec<_> = sink
        .records(&Outcome::Success)
        .unwrap()
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_i64))
        .collect();
    assert_eq!(ids, (0..8).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_async_threshold_abort() {
    let config = async_config(10).with_max_error_count(2);
    let sink = memory_sink();
    let result = run_batch(config, sleeping(100), records([1, 2, 3]), &sink).await;

    assert!(matches!(result, Err(Error::MaxErrorsExceeded { count: 2, max: 2 })));
    assert!(sink.units().is_empty());
}

#[tokio::test]
async fn test_async_threshold_warn_continues() {
    let config = async_config(10)
        .with_max_error_count(2)
        .with_error_threshold(ThresholdPolicy::Warn);
    let sink = memory_sink();
    let report = run_batch(config, sleeping(100), records([1, 2, 3]), &sink)
        .await
        .unwrap();

    assert_eq!(report.errors, 3);
    assert_eq!(report.routed_to(&Outcome::Retry), 3);
}

#[tokio::test]
async fn test_async_panic_routes_to_failure() {
    let processor = RecordProcessor::new(FnHandler::new(|ctx: &InputContext| {
        if id_of(ctx)? == 2 {
            panic!("boom");
        }
        Ok(HandlerOutput::success(ctx.record.clone()))
    }));
    let sink = memory_sink();
    let report = run_batch(async_config(1_000), processor, records([1, 2, 3]), &sink)
        .await
        .unwrap();

    assert_eq!(report.routed_to(&Outcome::Success), 2);
    assert_eq!(report.routed_to(&Outcome::Failure), 1);
    assert_eq!(report.errors, 1);

    let failed = sink.records(&Outcome::Failure).unwrap();
    assert_eq!(failed[0].get("id"), Some(&Value::Int(2)));
    assert_eq!(
        failed[0].get(ERROR_MESSAGE_FIELD).and_then(Value::as_str),
        Some("handler panicked: boom")
    );
}

#[tokio::test]
async fn test_async_business_errors_do_not_count() {
    let processor = RecordProcessor::new(FnHandler::new(|_: &InputContext| {
        Err(HandlerError::business("bad id"))
    }));
    let config = async_config(1_000).with_max_error_count(1);
    let sink = memory_sink();
    let report = run_batch(config, processor, records([1, 2]), &sink).await.unwrap();

    assert_eq!(report.errors, 0);
    assert_eq!(report.routed_to(&Outcome::Failure), 2);
}

#[tokio::test]
async fn test_async_fatal_error_aborts() {
    let processor = RecordProcessor::new(FnHandler::new(|_: &InputContext| {
        Err(HandlerError::fatal("driver missing"))
    }));
    let sink = memory_sink();
    let result = run_batch(async_config(1_000), processor, records([1, 2]), &sink).await;

    assert!(matches!(result, Err(Error::HandlerFatal(_))));
    assert!(sink.units().is_empty());
}

// ============================================================================
// Stats Tests
// ============================================================================

#[test]
fn test_batch_stats() {
    let mut stats = BatchStats::new();
    stats.add_record();
    stats.add_routed(&Outcome::Success);
    stats.add_routed(&Outcome::Success);
    stats.add_routed(&Outcome::Failure);
    stats.add_timeout();

    assert_eq!(stats.records_in, 1);
    assert_eq!(stats.total_routed(), 3);
    assert_eq!(stats.routed.get(&Outcome::Success), Some(&2));
    assert_eq!(stats.timeouts, 1);
}

#[test]
fn test_record_error_warns_once() {
    let sink: Arc<dyn Sink> = memory_sink();
    let ctx = BatchContext::new(
        Attributes::new(),
        SchemaResolver::new(MergeStrategy::default()),
        OutcomeMultiplexer::new(sink, Attributes::new()),
    );
    assert!(ctx.record_error(1, ThresholdPolicy::Warn).is_ok());
    assert!(ctx.record_error(1, ThresholdPolicy::Warn).is_ok());
    assert!(ctx.record_error(1, ThresholdPolicy::Abort).is_err());
    assert_eq!(ctx.error_count(), 3);
}
