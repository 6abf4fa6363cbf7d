//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::ProcessorConfig;
use crate::engine::BatchProcessor;
use crate::error::{Error, Result, ResultExt};
use crate::handler::{PassthroughHandler, RecordProcessor};
use crate::lookup::{CachedLookup, EnrichHandler, StaticLookup};
use crate::output::DirectorySink;
use crate::schema::SchemaInferrer;
use crate::source::{open_source, JsonSource, RecordSource};
use crate::types::Attributes;
use bytes::Bytes;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Infer { example } => self.infer(example),
            Commands::Validate { config } => self.validate(config),
            Commands::Run {
                config,
                input,
                output,
                batch_id,
                attributes,
                lookup,
                key,
                routing,
                cache_size,
            } => {
                let config = ProcessorConfig::load(config)?;
                let processor = match (lookup, key) {
                    (Some(lookup), Some(key)) => {
                        let table = load_lookup(lookup, key)?;
                        let handler = EnrichHandler::new(CachedLookup::new(table, *cache_size))
                            .with_routing((*routing).into());
                        RecordProcessor::new(handler)
                    }
                    _ => RecordProcessor::new(PassthroughHandler),
                };
                let attributes: Attributes = attributes.iter().cloned().collect();
                self.run_batch(config, processor, input, output, batch_id.as_deref(), attributes)
                    .await
            }
        }
    }

    /// Infer and print a schema
    fn infer(&self, path: &Path) -> Result<()> {
        let content = read_file(path)?;
        let text = String::from_utf8_lossy(&content);
        let inferrer = SchemaInferrer::new();

        let schema = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(_)) => inferrer.infer_example(&text)?,
            _ => {
                let records = JsonSource::from_bytes(&content)?.read_all()?;
                inferrer.infer_records(&records)?
            }
        };

        self.output_message(&schema.to_json());
        Ok(())
    }

    /// Validate a configuration file
    fn validate(&self, path: &Path) -> Result<()> {
        let config = ProcessorConfig::load(path)?;
        config.validate()?;

        self.output_message(&json!({
            "valid": true,
            "execution": config.execution,
            "input_format": config.input_format,
            "output_format": config.output_format,
            "merge_strategy": config.merge_strategy,
        }));
        Ok(())
    }

    async fn run_batch(
        &self,
        config: ProcessorConfig,
        processor: RecordProcessor,
        input: &Path,
        output: &Path,
        batch_id: Option<&str>,
        attributes: Attributes,
    ) -> Result<()> {
        let mut sink = DirectorySink::new(output, config.output_format)
            .with_parquet_config(config.parquet_config());
        if let Some(id) = batch_id {
            sink = sink.with_batch_id(id);
        }

        let content = Bytes::from(read_file(input)?);
        let mut source = open_source(config.input_format, content)
            .with_context(|| format!("Failed to open {}", input.display()))?;
        let batch = BatchProcessor::new(config, processor)?;

        let report = batch.run(source.as_mut(), Arc::new(sink), attributes).await?;
        self.output_message(&serde_json::to_value(&report)?);

        if !report.is_complete() {
            return Err(Error::sink(format!(
                "{} output unit(s) failed to finalize",
                report.finalize.failed.len()
            )));
        }
        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound {
            path: path.display().to_string(),
        },
        _ => Error::Io(e),
    })
}

/// Load a lookup table from a JSON array or JSON lines file
fn load_lookup(path: &Path, key: &str) -> Result<StaticLookup> {
    let content = read_file(path)?;
    let records = JsonSource::from_bytes(&content)?.read_all()?;
    let table = StaticLookup::from_records(key, records)
        .with_context(|| format!("Invalid lookup table {}", path.display()))?;
    tracing::info!(path = %path.display(), entries = table.len(), key, "Loaded lookup table");
    Ok(table)
}
