// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # recordflow
//!
//! A record-transformation engine: reads a batch of records, runs each one
//! through a caller-supplied handler and writes the results into one output
//! unit per outcome.
//!
//! ## Features
//!
//! - **Outcome Routing**: `success`, `failure`, `retry` and custom channels
//! - **Schema Resolution**: Inferred or example-driven output schemas, fixed per batch
//! - **Error Records**: Failed inputs keep their fields plus `errorMessage` and `atTime`
//! - **Sync or Async Execution**: Source-ordered, or concurrent with a per-record timeout
//! - **JSON and Parquet**: Both as input and as output
//! - **Lookup Enrichment**: Keyed tables with a per-instance TTL cache
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use recordflow::{BatchProcessor, FnHandler, HandlerOutput, MemorySink, ProcessorConfig, RecordProcessor};
//!
//! #[tokio::main]
//! async fn main() -> recordflow::Result<()> {
//!     let handler = FnHandler::new(|ctx| Ok(HandlerOutput::success(ctx.record.clone())));
//!     let batch = BatchProcessor::new(ProcessorConfig::load("flow.yaml")?, RecordProcessor::new(handler))?;
//!
//!     let sink = Arc::new(MemorySink::new(RecordFormat::Json));
//!     let report = batch.run(&mut source, sink, Attributes::new()).await?;
//!     println!("{}", serde_json::to_string(&report)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐    ┌──────────────────────────────────┐    ┌──────────┐
//! │ RecordSource  │ →  │ BatchProcessor                   │ →  │   Sink   │
//! │ JSON/Parquet  │    │ Sync | Async executor            │    │ Memory   │
//! └───────────────┘    │   RecordProcessor (hooks+handler)│    │ Directory│
//!                      │   OutcomeMultiplexer             │    └──────────┘
//!                      │   SchemaResolver                 │
//!                      └──────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Record values
pub mod value;

/// Schema model, inference and resolution
pub mod schema;

/// Handler contract, hooks and templates
pub mod handler;

/// Record sources
pub mod source;

/// Writers, sinks and the outcome multiplexer
pub mod output;

/// Batch execution
pub mod engine;

/// Processor configuration
pub mod config;

/// Lookup services and enrichment
pub mod lookup;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, HandlerError, Result};
pub use types::*;

// Re-export commonly used types
pub use config::ProcessorConfig;
pub use engine::{BatchProcessor, BatchReport};
pub use handler::{
    FnHandler, Handler, HandlerOutput, Hooks, InputContext, PassthroughHandler, RecordProcessor,
};
pub use output::{DirectorySink, MemorySink, Sink};
pub use schema::{MergeStrategy, Schema};
pub use source::{RecordSource, VecSource};
pub use value::{Record, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
