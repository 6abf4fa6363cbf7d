//! Batch execution engine
//!
//! Drives one batch from a [`RecordSource`] through a [`RecordProcessor`]
//! into a [`Sink`].
//!
//! # Overview
//!
//! The engine module provides:
//! - `BatchProcessor` - Validates configuration and runs batches
//! - `SyncExecutor` - Sequential, source-ordered execution
//! - `AsyncExecutor` - Concurrent execution with a per-record timeout
//! - `BatchContext` - Shared per-batch state
//! - `BatchReport` - What happened to a batch
//!
//! # Example
//!
//! ```ignore
//! use recordflow::{BatchProcessor, MemorySink, PassthroughHandler, ProcessorConfig, RecordProcessor, VecSource};
//!
//! let processor = BatchProcessor::new(ProcessorConfig::new(), RecordProcessor::new(PassthroughHandler))?;
//! let sink = Arc::new(MemorySink::new(RecordFormat::Json));
//! let report = processor.run(&mut VecSource::new(records), sink, Attributes::new()).await?;
//! ```

mod async_executor;
mod context;
mod sync_executor;
mod types;

pub use async_executor::{AsyncExecutor, TaskOutcome};
pub use context::BatchContext;
pub use sync_executor::SyncExecutor;
pub use types::{BatchReport, BatchStats};

use crate::config::ProcessorConfig;
use crate::error::Result;
use crate::handler::RecordProcessor;
use crate::output::{OutcomeMultiplexer, Sink};
use crate::schema::{Schema, SchemaResolver};
use crate::source::RecordSource;
use crate::types::{Attributes, ExecutionMode};
use std::sync::Arc;
use std::time::Instant;

/// Runs batches with a fixed configuration and processor
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    config: ProcessorConfig,
    processor: RecordProcessor,
    example: Option<Schema>,
}

impl BatchProcessor {
    /// Create a batch processor
    ///
    /// Validates the configuration. Hooks configured as templates fill any
    /// hook slot the processor does not already have.
    pub fn new(config: ProcessorConfig, processor: RecordProcessor) -> Result<Self> {
        config.validate()?;

        let configured = config.hooks()?;
        let mut hooks = processor.hooks().clone();
        if hooks.build_input.is_none() {
            hooks.build_input = configured.build_input;
        }
        if hooks.build_output.is_none() {
            hooks.build_output = configured.build_output;
        }
        let processor = processor.with_hooks(hooks);
        let example = config.example_schema()?;

        Ok(Self {
            config,
            processor,
            example,
        })
    }

    /// The configuration in effect
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The record processor
    pub fn processor(&self) -> &RecordProcessor {
        &self.processor
    }

    /// Run one batch
    ///
    /// `attributes` override the configured static attributes. On any
    /// batch-level error every open output unit is discarded and the sink
    /// receives nothing.
    pub async fn run(
        &self,
        source: &mut dyn RecordSource,
        sink: Arc<dyn Sink>,
        attributes: Attributes,
    ) -> Result<BatchReport> {
        let start = Instant::now();

        let mut merged = self.config.attributes.clone();
        merged.extend(attributes);

        let mut resolver = SchemaResolver::new(self.config.merge_strategy);
        if let Some(example) = &self.example {
            resolver = resolver.with_example(example.clone());
        }
        if let Some(schema) = source.schema() {
            tracing::debug!(schema = %schema, "Using embedded input schema");
            resolver.seed_input(schema);
        }

        let multiplexer = OutcomeMultiplexer::new(sink, merged.clone());
        let ctx = BatchContext::new(merged, resolver, multiplexer);

        tracing::info!(
            handler = self.processor.handler().name(),
            execution = ?self.config.execution,
            "Starting batch"
        );

        let result = match self.config.execution {
            ExecutionMode::Sync => SyncExecutor::new(&self.processor).execute(source, &ctx),
            ExecutionMode::Async => {
                AsyncExecutor::new(self.processor.clone())
                    .with_timeout(self.config.async_timeout())
                    .with_max_concurrency(self.config.max_concurrency)
                    .with_error_threshold(self.config.max_error_count, self.config.error_threshold)
                    .execute(source, &ctx)
                    .await
            }
        };

        let (multiplexer, stats, errors) = ctx.into_parts();
        if let Err(e) = result {
            tracing::warn!(error = %e, records_in = stats.records_in, "Batch aborted");
            multiplexer.abort();
            return Err(e);
        }

        let finalize = multiplexer.finalize_all();
        let report = BatchReport {
            records_in: stats.records_in,
            routed: stats.routed,
            rerouted: stats.rerouted,
            timeouts: stats.timeouts,
            errors,
            finalize,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(
            records_in = report.records_in,
            units = report.finalize.finalized.len(),
            failed_units = report.finalize.failed.len(),
            errors = report.errors,
            duration_ms = report.duration_ms,
            "Completed batch"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests;
