//! Per-batch execution context
//!
//! Everything that is shared while one batch runs lives here and nowhere
//! else: the attributes, the memoized schemas, the error counter, the
//! output units and the statistics.

use super::types::BatchStats;
use crate::error::{Error, Result};
use crate::handler::{Routed, SchemaKind};
use crate::output::OutcomeMultiplexer;
use crate::schema::SchemaResolver;
use crate::types::{Attributes, Outcome, ThresholdPolicy};
use crate::value::Record;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Shared state of one batch
#[derive(Debug)]
pub struct BatchContext {
    attributes: Attributes,
    resolver: SchemaResolver,
    multiplexer: OutcomeMultiplexer,
    errors: AtomicUsize,
    threshold_warned: AtomicBool,
    stats: Mutex<BatchStats>,
}

impl BatchContext {
    /// Create a context
    pub fn new(
        attributes: Attributes,
        resolver: SchemaResolver,
        multiplexer: OutcomeMultiplexer,
    ) -> Self {
        Self {
            attributes,
            resolver,
            multiplexer,
            errors: AtomicUsize::new(0),
            threshold_warned: AtomicBool::new(false),
            stats: Mutex::new(BatchStats::new()),
        }
    }

    /// Batch attributes
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Schema resolver
    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    /// Output multiplexer
    pub fn multiplexer(&self) -> &OutcomeMultiplexer {
        &self.multiplexer
    }

    /// Current value of the error counter
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    /// Snapshot of the statistics
    pub fn stats(&self) -> BatchStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Count a record read from the source
    ///
    /// The first source record fixes the input schema (unless the source
    /// embedded one), before any hook has touched it.
    pub fn accept(&self, record: &Record) -> Result<()> {
        self.update_stats(|s| s.add_record());
        self.resolver.input_schema(record)?;
        Ok(())
    }

    /// Update the statistics
    pub fn update_stats(&self, f: impl FnOnce(&mut BatchStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Increment the error counter and apply the threshold policy
    pub fn record_error(&self, max: usize, policy: ThresholdPolicy) -> Result<()> {
        let count = self.errors.fetch_add(1, Ordering::SeqCst) + 1;
        if count < max {
            return Ok(());
        }
        match policy {
            ThresholdPolicy::Abort => {
                tracing::warn!(count, max, "Error threshold reached, aborting batch");
                Err(Error::MaxErrorsExceeded { count, max })
            }
            ThresholdPolicy::Warn => {
                if !self.threshold_warned.swap(true, Ordering::SeqCst) {
                    tracing::warn!(count, max, "Error threshold reached, continuing");
                }
                Ok(())
            }
        }
    }

    /// Write a classified record to its output unit
    ///
    /// `failure` and `retry` units are bound to the error schema, every
    /// other unit to the output schema. Error records are conformed
    /// leniently and never rejected. A completed record that violates
    /// its unit schema is re-routed to `failure` as an error record.
    pub fn deliver(&self, routed: Routed) -> Result<()> {
        let record = match routed.schema {
            SchemaKind::Output => self.resolver.strategy().compose(&routed.input, routed.record.clone()),
            SchemaKind::Error => routed.record.clone(),
        };

        let result = match routed.outcome {
            Outcome::Failure | Outcome::Retry => self
                .multiplexer
                .route_error(&routed.outcome, &record, || self.resolver.error_schema(&routed.input)),
            _ => self.multiplexer.route(&routed.outcome, &record, || {
                self.resolver.output_schema(&routed.input, &routed.record)
            }),
        };

        match result {
            Ok(()) => {
                self.update_stats(|s| s.add_routed(&routed.outcome));
                Ok(())
            }
            Err(Error::SchemaViolation { field, message }) if routed.schema == SchemaKind::Output => {
                tracing::debug!(
                    outcome = %routed.outcome,
                    field = %field,
                    error = %message,
                    "Record violates output schema, routing to failure"
                );
                let failure = Routed::failure(
                    routed.input,
                    format!("Schema violation on field '{field}': {message}"),
                );
                self.multiplexer.route_error(&Outcome::Failure, &failure.record, || {
                    self.resolver.error_schema(&failure.input)
                })?;
                self.update_stats(|s| {
                    s.add_rerouted();
                    s.add_routed(&Outcome::Failure);
                });
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Take the multiplexer and final statistics
    pub fn into_parts(self) -> (OutcomeMultiplexer, BatchStats, usize) {
        let errors = self.errors.into_inner();
        let stats = self.stats.into_inner().unwrap_or_else(PoisonError::into_inner);
        (self.multiplexer, stats, errors)
    }
}
