//! Engine types
//!
//! Statistics and the report returned for a batch.

use crate::output::FinalizeReport;
use crate::types::Outcome;
use serde::Serialize;
use std::collections::BTreeMap;

/// Statistics collected while a batch runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Records read from the source
    pub records_in: usize,
    /// Records routed per outcome
    pub routed: BTreeMap<Outcome, usize>,
    /// Successful records re-routed to `failure` by a schema violation
    pub rerouted: usize,
    /// Async handler calls that exceeded the timeout
    pub timeouts: usize,
    /// Async handler calls that panicked
    pub panics: usize,
}

impl BatchStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a record read from the source
    pub fn add_record(&mut self) {
        self.records_in += 1;
    }

    /// Count a routed record
    pub fn add_routed(&mut self, outcome: &Outcome) {
        *self.routed.entry(outcome.clone()).or_default() += 1;
    }

    /// Count a schema-violation re-route
    pub fn add_rerouted(&mut self) {
        self.rerouted += 1;
    }

    /// Count a timeout
    pub fn add_timeout(&mut self) {
        self.timeouts += 1;
    }

    /// Count a panic
    pub fn add_panic(&mut self) {
        self.panics += 1;
    }

    /// Total routed records
    pub fn total_routed(&self) -> usize {
        self.routed.values().sum()
    }
}

/// Summary of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Records read from the source
    pub records_in: usize,
    /// Records routed per outcome
    pub routed: BTreeMap<Outcome, usize>,
    /// Successful records re-routed to `failure` by a schema violation
    pub rerouted: usize,
    /// Async timeouts
    pub timeouts: usize,
    /// Value of the error counter at the end of the batch
    pub errors: usize,
    /// Result of the finalize pass
    pub finalize: FinalizeReport,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl BatchReport {
    /// Records routed to an outcome
    pub fn routed_to(&self, outcome: &Outcome) -> usize {
        self.routed.get(outcome).copied().unwrap_or(0)
    }

    /// Whether every output unit reached the sink
    pub fn is_complete(&self) -> bool {
        self.finalize.is_complete()
    }
}
