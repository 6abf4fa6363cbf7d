//! CLI commands and argument parsing

use crate::lookup::LookupRouting;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Record transformation CLI
#[derive(Parser, Debug)]
#[command(name = "recordflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Infer a schema from an example document or a set of records
    Infer {
        /// JSON object, JSON array or JSON lines file
        #[arg(short, long)]
        example: PathBuf,
    },

    /// Validate a processor configuration
    Validate {
        /// Configuration file (YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Run one batch
    Run {
        /// Configuration file (YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Input file in the configured input format
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory, one subdirectory per outcome
        #[arg(short, long)]
        output: PathBuf,

        /// Batch identifier used as the output file name
        #[arg(long)]
        batch_id: Option<String>,

        /// Batch attribute (repeatable)
        #[arg(short, long = "attr", value_name = "KEY=VALUE", value_parser = parse_attribute)]
        attributes: Vec<(String, String)>,

        /// Lookup table (JSON array or JSON lines) to enrich records with
        #[arg(long, requires = "key")]
        lookup: Option<PathBuf>,

        /// Field the lookup table is keyed on
        #[arg(long, requires = "lookup")]
        key: Option<String>,

        /// Routing for enriched records
        #[arg(long, default_value = "success")]
        routing: RoutingArg,

        /// Lookup cache size (0 disables the cache)
        #[arg(long, default_value = "1000")]
        cache_size: usize,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Indented JSON
    Pretty,
}

/// Routing choice for the enrich handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RoutingArg {
    /// Everything to `success`
    Success,
    /// Matches to `matched`, misses to `unmatched`
    MatchedUnmatched,
}

impl From<RoutingArg> for LookupRouting {
    fn from(arg: RoutingArg) -> Self {
        match arg {
            RoutingArg::Success => LookupRouting::RouteToSuccess,
            RoutingArg::MatchedUnmatched => LookupRouting::RouteToMatchedUnmatched,
        }
    }
}

/// Parse a `KEY=VALUE` attribute
pub fn parse_attribute(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid attribute '{s}', expected KEY=VALUE")),
    }
}
