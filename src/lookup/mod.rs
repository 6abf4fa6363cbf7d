//! Lookup and enrichment
//!
//! A [`LookupService`] finds the record that enriches an input;
//! [`EnrichHandler`] turns any service into a [`Handler`](crate::Handler).
//!
//! # Example
//!
//! ```ignore
//! use recordflow::lookup::{CachedLookup, EnrichHandler, LookupRouting, StaticLookup};
//!
//! let table = StaticLookup::from_records("customer_id", customers)?;
//! let handler = EnrichHandler::new(CachedLookup::new(table, 1000))
//!     .with_routing(LookupRouting::RouteToMatchedUnmatched);
//! ```

mod cache;
mod enrich;
mod types;

pub use cache::CachedLookup;
pub use enrich::{EnrichHandler, LookupRouting, MATCHED, UNMATCHED};
pub use types::{LookupService, StaticLookup};

#[cfg(test)]
mod tests;
