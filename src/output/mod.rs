//! Output module
//!
//! Handles everything between a routed record and a finished unit:
//! per-outcome multiplexing, record writers, sinks, and the Arrow bridge
//! used for parquet.
//!
//! # Overview
//!
//! - [`OutcomeMultiplexer`] opens one unit per outcome on first use
//! - [`RecordWriter`] serializes a unit (JSON lines or parquet)
//! - [`Sink`] receives each finished unit exactly once

mod columnar;
mod multiplexer;
mod sink;
mod writer;

pub use columnar::{batch_to_records, from_arrow_schema, records_to_batch, to_arrow_schema};
pub use multiplexer::{FailedUnit, FinalizeReport, FinalizedUnit, OutcomeMultiplexer};
pub use sink::{
    DirectorySink, FinishedUnit, MemorySink, Sink, MIME_TYPE_ATTRIBUTE, RECORD_COUNT_ATTRIBUTE,
};
pub use writer::{
    create_writer, JsonRecordWriter, ParquetCompression, ParquetRecordWriter, ParquetWriterConfig,
    RecordWriter, WriteResult,
};
