//! Record sources
//!
//! A [`RecordSource`] yields the input records of one batch in order and
//! may carry an embedded schema. Malformed input is an environment error
//! and aborts the batch.

mod readers;
mod types;

pub use readers::{decode_records, open_source, JsonSource, ParquetSource};
pub use types::{RecordSource, VecSource};

#[cfg(test)]
mod tests;
