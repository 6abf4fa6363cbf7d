//! Enrichment handler

use super::types::LookupService;
use crate::error::HandlerError;
use crate::handler::{Handler, HandlerOutput, InputContext};
use crate::types::Outcome;
use serde::{Deserialize, Serialize};

/// Outcome name for inputs the lookup matched
pub const MATCHED: &str = "matched";

/// Outcome name for inputs the lookup did not match
pub const UNMATCHED: &str = "unmatched";

/// Where enriched records go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupRouting {
    /// Everything goes to `success`, matched or not
    #[default]
    RouteToSuccess,
    /// Matches go to `matched`, misses to `unmatched`
    RouteToMatchedUnmatched,
}

/// Handler that merges a lookup result into each input
///
/// A match produces the input fields followed by the lookup fields (the
/// lookup wins on collisions). A miss passes the input through unchanged.
#[derive(Debug)]
pub struct EnrichHandler<L> {
    service: L,
    routing: LookupRouting,
}

impl<L: LookupService> EnrichHandler<L> {
    /// Create a handler routing everything to `success`
    pub fn new(service: L) -> Self {
        Self {
            service,
            routing: LookupRouting::default(),
        }
    }

    /// Set the routing strategy
    #[must_use]
    pub fn with_routing(mut self, routing: LookupRouting) -> Self {
        self.routing = routing;
        self
    }

    /// The lookup service
    pub fn service(&self) -> &L {
        &self.service
    }

    fn outcome(&self, matched: bool) -> Outcome {
        match (self.routing, matched) {
            (LookupRouting::RouteToSuccess, _) => Outcome::Success,
            (LookupRouting::RouteToMatchedUnmatched, true) => Outcome::custom(MATCHED),
            (LookupRouting::RouteToMatchedUnmatched, false) => Outcome::custom(UNMATCHED),
        }
    }
}

impl<L: LookupService> Handler for EnrichHandler<L> {
    fn process(&self, ctx: &InputContext) -> Result<HandlerOutput, HandlerError> {
        let mut output = ctx.record.clone();
        let found = self.service.lookup(ctx)?;
        let matched = found.is_some();
        if let Some(found) = found {
            output.merge_from(&found);
        }
        tracing::trace!(lookup = self.service.name(), matched, "Lookup complete");
        Ok(HandlerOutput::new(self.outcome(matched), output))
    }

    fn name(&self) -> &str {
        "enrich"
    }
}
