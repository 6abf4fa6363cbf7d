//! Record value model
//!
//! A tagged-union [`Value`] and an ordered [`Record`] of named values.
//!
//! # Overview
//!
//! - `Value` covers the primitives (bool, int, long, double, string,
//!   timestamp), sequences, string-keyed maps and nested records
//! - `Record` keeps field insertion order, so schemas inferred from a
//!   record list fields in the order the record produced them
//! - JSON conversion in both directions, timestamps rendered as
//!   `yyyy-MM-dd HH:mm:ss`

mod convert;
mod types;

pub use convert::{format_timestamp, parse_timestamp, TIMESTAMP_FORMAT};
pub use types::{Record, Value};
