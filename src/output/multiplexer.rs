//! Outcome multiplexer
//!
//! Routes records into one output unit per outcome. Units are opened
//! lazily on the first record for their outcome, bound to a schema that
//! never changes afterwards, and sealed together by [`OutcomeMultiplexer::finalize_all`].
//! Finalization consumes the multiplexer, so no record can be routed to a
//! unit after it was handed to the sink.

use super::sink::{FinishedUnit, Sink, MIME_TYPE_ATTRIBUTE, RECORD_COUNT_ATTRIBUTE};
use super::writer::RecordWriter;
use crate::error::Result;
use crate::schema::Schema;
use crate::types::{Attributes, Outcome};
use crate::value::Record;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

/// One in-progress output unit
struct OutputUnit {
    schema: Arc<Schema>,
    writer: Box<dyn RecordWriter>,
}

/// A unit that reached the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizedUnit {
    pub outcome: Outcome,
    pub record_count: usize,
}

/// A unit that could not be finalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUnit {
    pub outcome: Outcome,
    pub error: String,
}

/// Result of the batch-end finalize pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FinalizeReport {
    /// Units handed to the sink, in creation order
    pub finalized: Vec<FinalizedUnit>,
    /// Units whose writer or sink failed
    pub failed: Vec<FailedUnit>,
}

impl FinalizeReport {
    /// Whether every unit was finalized
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Records across all finalized units
    pub fn total_records(&self) -> usize {
        self.finalized.iter().map(|u| u.record_count).sum()
    }

    /// Record count of a finalized unit
    pub fn record_count(&self, outcome: &Outcome) -> Option<usize> {
        self.finalized
            .iter()
            .find(|u| &u.outcome == outcome)
            .map(|u| u.record_count)
    }
}

/// Routes records into per-outcome output units
pub struct OutcomeMultiplexer {
    sink: Arc<dyn Sink>,
    attributes: Attributes,
    units: Mutex<IndexMap<Outcome, OutputUnit>>,
}

impl std::fmt::Debug for OutcomeMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomeMultiplexer")
            .field("attributes", &self.attributes)
            .field("outcomes", &self.outcomes())
            .finish_non_exhaustive()
    }
}

impl OutcomeMultiplexer {
    /// Create a multiplexer; `attributes` are copied onto every finished unit
    pub fn new(sink: Arc<dyn Sink>, attributes: Attributes) -> Self {
        Self {
            sink,
            attributes,
            units: Mutex::new(IndexMap::new()),
        }
    }

    /// Route a record to `outcome`
    ///
    /// The first record for an outcome opens its unit, bound to the schema
    /// `schema` yields; later records reuse that unit and its schema. The
    /// record is conformed to the unit schema before it is written, so a
    /// schema violation leaves the unit untouched.
    pub fn route<F>(&self, outcome: &Outcome, record: &Record, schema: F) -> Result<()>
    where
        F: FnOnce() -> Result<Arc<Schema>>,
    {
        self.route_with(outcome, record, schema, Schema::conform)
    }

    /// Route an error record to `outcome`
    ///
    /// Same as [`route`](Self::route), but the record is conformed
    /// leniently: values that do not fit the unit schema are nulled, so an
    /// error record is never rejected.
    pub fn route_error<F>(&self, outcome: &Outcome, record: &Record, schema: F) -> Result<()>
    where
        F: FnOnce() -> Result<Arc<Schema>>,
    {
        self.route_with(outcome, record, schema, |schema, record| {
            Ok(schema.conform_lenient(record))
        })
    }

    fn route_with<F, C>(&self, outcome: &Outcome, record: &Record, schema: F, conform: C) -> Result<()>
    where
        F: FnOnce() -> Result<Arc<Schema>>,
        C: Fn(&Schema, &Record) -> Result<Record>,
    {
        let mut units = self.units.lock().unwrap_or_else(PoisonError::into_inner);

        if !units.contains_key(outcome) {
            let schema = schema()?;
            // Conform first so a violating record does not open an empty unit
            let conformed = conform(&schema, record)?;
            let mut writer = self.sink.create_writer(outcome, &schema)?;
            writer.write(&conformed)?;
            tracing::debug!(outcome = %outcome, schema = %schema, "Opened output unit");
            units.insert(outcome.clone(), OutputUnit { schema, writer });
            return Ok(());
        }

        if let Some(unit) = units.get_mut(outcome) {
            let conformed = conform(&unit.schema, record)?;
            unit.writer.write(&conformed)?;
        }
        Ok(())
    }

    /// Schema of an open unit
    pub fn unit_schema(&self, outcome: &Outcome) -> Option<Arc<Schema>> {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(outcome)
            .map(|u| Arc::clone(&u.schema))
    }

    /// Outcomes with an open unit, in creation order
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Records routed to an outcome so far
    pub fn record_count(&self, outcome: &Outcome) -> usize {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(outcome)
            .map_or(0, |u| u.writer.record_count())
    }

    /// Seal every unit and hand it to the sink
    ///
    /// Each writer is finished and then closed, whatever the finish result.
    /// A failure on one unit (finish, close or sink) is logged and recorded
    /// in the report; the remaining units are still finalized.
    pub fn finalize_all(self) -> FinalizeReport {
        let units = self.units.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut report = FinalizeReport::default();

        for (outcome, mut unit) in units {
            match finish_unit(&*self.sink, &self.attributes, &outcome, unit.writer.as_mut()) {
                Ok(record_count) => report.finalized.push(FinalizedUnit {
                    outcome,
                    record_count,
                }),
                Err(e) => {
                    tracing::warn!(outcome = %outcome, error = %e, "Failed to finalize output unit");
                    report.failed.push(FailedUnit {
                        outcome,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            finalized = report.finalized.len(),
            failed = report.failed.len(),
            "Finalize pass complete"
        );
        report
    }

    /// Close every unit without handing anything to the sink
    pub fn abort(self) {
        let units = self.units.into_inner().unwrap_or_else(PoisonError::into_inner);
        for (outcome, mut unit) in units {
            if let Err(e) = unit.writer.close() {
                tracing::debug!(outcome = %outcome, error = %e, "Writer close failed during abort");
            }
        }
    }
}

fn finish_unit(
    sink: &dyn Sink,
    batch_attributes: &Attributes,
    outcome: &Outcome,
    writer: &mut dyn RecordWriter,
) -> Result<usize> {
    let mime_type = writer.mime_type();
    let finished = writer.finish();
    let closed = writer.close();
    let result = finished?;
    closed?;

    let mut attributes = batch_attributes.clone();
    attributes.extend(result.attributes);
    attributes.insert(RECORD_COUNT_ATTRIBUTE.to_string(), result.record_count.to_string());
    attributes.insert(MIME_TYPE_ATTRIBUTE.to_string(), mime_type.to_string());

    sink.finalize(FinishedUnit {
        outcome: outcome.clone(),
        record_count: result.record_count,
        attributes,
        content: result.content,
    })?;
    Ok(result.record_count)
}
