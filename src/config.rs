//! Processor configuration
//!
//! A [`ProcessorConfig`] carries every knob of a batch processor. It can be
//! built in code with the `with_*` methods or loaded from YAML or JSON:
//!
//! ```yaml
//! input_format: json
//! output_format: parquet
//! output_schema:
//!   example: '{"id": 1, "doubled": 2}'
//! merge_strategy: output_only
//! execution: async
//! async_timeout_ms: 2000
//! max_error_count: 5
//! attributes:
//!   source.system: crm
//! hooks:
//!   build_output:
//!     tenant: "{{ attributes.tenant }}"
//! ```

use crate::error::{Error, Result};
use crate::handler::{Hooks, TemplateTransform};
use crate::output::{ParquetCompression, ParquetWriterConfig};
use crate::schema::{MergeStrategy, Schema, SchemaInferrer};
use crate::types::{Attributes, ExecutionMode, RecordFormat, ThresholdPolicy};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Processor Config
// ============================================================================

/// Complete processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Serialization of input records
    pub input_format: RecordFormat,

    /// Serialization of output records
    pub output_format: RecordFormat,

    /// Where the output schema comes from: `inferred`, or
    /// `{example: '<json>'}`
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub output_schema: OutputSchemaSource,

    /// How output records are composed
    pub merge_strategy: MergeStrategy,

    /// Execution discipline
    pub execution: ExecutionMode,

    /// Per-record timeout of the async executor
    pub async_timeout_ms: u64,

    /// Async error count at which the threshold policy applies
    pub max_error_count: usize,

    /// Maximum handler calls in flight under the async executor
    pub max_concurrency: usize,

    /// What happens once `max_error_count` is reached
    pub error_threshold: ThresholdPolicy,

    /// Compression of parquet output
    pub parquet_compression: ParquetCompression,

    /// Static attributes added to every batch
    pub attributes: Attributes,

    /// Template hooks around the handler
    pub hooks: HooksConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            input_format: RecordFormat::Json,
            output_format: RecordFormat::Json,
            output_schema: OutputSchemaSource::Inferred,
            merge_strategy: MergeStrategy::InputAndOutput,
            execution: ExecutionMode::Sync,
            async_timeout_ms: 5000,
            max_error_count: 10,
            max_concurrency: 16,
            error_threshold: ThresholdPolicy::Abort,
            parquet_compression: ParquetCompression::Snappy,
            attributes: Attributes::new(),
            hooks: HooksConfig::default(),
        }
    }
}

/// Source of the output schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSchemaSource {
    /// Inferred from the first processed record
    #[default]
    Inferred,
    /// Inferred from an example JSON document
    Example(String),
}

/// Template assignments applied before and after the handler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// `field: template` pairs applied to the input
    pub build_input: IndexMap<String, String>,
    /// `field: template` pairs applied to the output
    pub build_output: IndexMap<String, String>,
}

impl HooksConfig {
    /// Check if no hooks are configured
    pub fn is_empty(&self) -> bool {
        self.build_input.is_empty() && self.build_output.is_empty()
    }
}

impl ProcessorConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load from a file; `.json` files are read as JSON, anything else as YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::config(format!("Failed to read config '{}': {e}", path.display()))
            }
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges, the example document and hook templates
    pub fn validate(&self) -> Result<()> {
        if self.async_timeout_ms == 0 {
            return Err(Error::invalid_value("async_timeout_ms", "must be greater than 0"));
        }
        if self.max_concurrency == 0 {
            return Err(Error::invalid_value("max_concurrency", "must be greater than 0"));
        }
        if self.max_error_count == 0 {
            return Err(Error::invalid_value("max_error_count", "must be greater than 0"));
        }
        self.example_schema()
            .map_err(|e| Error::invalid_value("output_schema", e.to_string()))?;
        self.hooks()?;
        Ok(())
    }

    // ========================================================================
    // Derived settings
    // ========================================================================

    /// Per-record timeout as a duration
    pub fn async_timeout(&self) -> Duration {
        Duration::from_millis(self.async_timeout_ms)
    }

    /// Output schema from the example document, if one is configured
    pub fn example_schema(&self) -> Result<Option<Schema>> {
        match &self.output_schema {
            OutputSchemaSource::Inferred => Ok(None),
            OutputSchemaSource::Example(doc) => SchemaInferrer::new().infer_example(doc).map(Some),
        }
    }

    /// Compile the configured hook templates
    pub fn hooks(&self) -> Result<Hooks> {
        let mut hooks = Hooks::new();
        if !self.hooks.build_input.is_empty() {
            let transform = TemplateTransform::compile(self.hooks.build_input.clone())?
                .with_name("build_input");
            hooks = hooks.with_build_input(transform);
        }
        if !self.hooks.build_output.is_empty() {
            let transform = TemplateTransform::compile(self.hooks.build_output.clone())?
                .with_name("build_output");
            hooks = hooks.with_build_output(transform);
        }
        Ok(hooks)
    }

    /// Parquet writer settings
    pub fn parquet_config(&self) -> ParquetWriterConfig {
        ParquetWriterConfig::new().with_codec(self.parquet_compression)
    }

    // ========================================================================
    // Builders
    // ========================================================================

    /// Set the input format
    #[must_use]
    pub fn with_input_format(mut self, format: RecordFormat) -> Self {
        self.input_format = format;
        self
    }

    /// Set the output format
    #[must_use]
    pub fn with_output_format(mut self, format: RecordFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Use an example document as output schema
    #[must_use]
    pub fn with_output_example(mut self, example: impl Into<String>) -> Self {
        self.output_schema = OutputSchemaSource::Example(example.into());
        self
    }

    /// Set the merge strategy
    #[must_use]
    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }

    /// Set the execution mode
    #[must_use]
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Set the async per-record timeout
    #[must_use]
    pub fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the max tolerated error count
    #[must_use]
    pub fn with_max_error_count(mut self, max: usize) -> Self {
        self.max_error_count = max;
        self
    }

    /// Set the async concurrency limit
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Set the threshold policy
    #[must_use]
    pub fn with_error_threshold(mut self, policy: ThresholdPolicy) -> Self {
        self.error_threshold = policy;
        self
    }

    /// Add a static attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ProcessorConfig::default();
        assert_eq!(config.execution, ExecutionMode::Sync);
        assert_eq!(config.merge_strategy, MergeStrategy::InputAndOutput);
        assert_eq!(config.async_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_error_count, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
output_format: parquet
output_schema:
  example: '{"a": 1}'
merge_strategy: output_only
execution: async
async_timeout_ms: 250
error_threshold: warn
attributes:
  source.system: crm
hooks:
  build_output:
    tenant: "{{ attributes.tenant }}"
"#;
        let config = ProcessorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.output_format, RecordFormat::Parquet);
        assert_eq!(config.merge_strategy, MergeStrategy::OutputOnly);
        assert_eq!(config.execution, ExecutionMode::Async);
        assert_eq!(config.async_timeout(), Duration::from_millis(250));
        assert_eq!(config.error_threshold, ThresholdPolicy::Warn);
        assert_eq!(config.attributes.get("source.system").map(String::as_str), Some("crm"));
        assert_eq!(
            config.example_schema().unwrap().unwrap().to_string(),
            "{a:int}"
        );
        let hooks = config.hooks().unwrap();
        assert!(hooks.build_input.is_none());
        assert!(hooks.build_output.is_some());
    }

    #[test]
    fn test_from_json() {
        let config =
            ProcessorConfig::from_json_str(r#"{"execution": "async", "max_concurrency": 2}"#)
                .unwrap();
        assert_eq!(config.execution, ExecutionMode::Async);
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.output_schema, OutputSchemaSource::Inferred);
    }

    #[test]
    fn test_output_schema_forms() {
        let yaml = ProcessorConfig::from_yaml_str("output_schema: inferred\n").unwrap();
        assert_eq!(yaml.output_schema, OutputSchemaSource::Inferred);

        let json = ProcessorConfig::from_json_str(r#"{"output_schema": {"example": "{\"b\": true}"}}"#)
            .unwrap();
        assert_eq!(
            json.output_schema,
            OutputSchemaSource::Example(r#"{"b": true}"#.to_string())
        );
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let err = ProcessorConfig::new()
            .with_async_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("async_timeout_ms"));

        assert!(ProcessorConfig::new().with_max_concurrency(0).validate().is_err());
        assert!(ProcessorConfig::new().with_max_error_count(0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_example() {
        let err = ProcessorConfig::new()
            .with_output_example("{not json")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "output_schema"));
    }

    #[test]
    fn test_validate_rejects_bad_hook_template() {
        let yaml = "hooks:\n  build_input:\n    x: \"{{ secrets.key }}\"\n";
        assert!(ProcessorConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processor.yaml");
        std::fs::write(&path, "execution: async\n").unwrap();
        assert_eq!(
            ProcessorConfig::load(&path).unwrap().execution,
            ExecutionMode::Async
        );

        let missing = ProcessorConfig::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_parquet_config_codec() {
        let config = ProcessorConfig {
            parquet_compression: ParquetCompression::None,
            ..ProcessorConfig::default()
        };
        assert_eq!(
            config.parquet_config().compression(),
            parquet::basic::Compression::UNCOMPRESSED
        );
    }
}
