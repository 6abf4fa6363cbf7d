//! CLI module
//!
//! Command-line interface for running batches.
//!
//! # Commands
//!
//! - `infer` - Print the schema inferred from an example
//! - `validate` - Check a processor configuration
//! - `run` - Run one batch from a file into an output directory

mod commands;
mod runner;

pub use commands::{parse_attribute, Cli, Commands, OutputFormat, RoutingArg};
pub use runner::Runner;

#[cfg(test)]
mod tests;
