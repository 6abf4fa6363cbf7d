//! Common types used throughout recordflow
//!
//! This module contains shared type definitions, type aliases,
//! and small configuration enums used across multiple modules.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Read-only attributes bound to a batch (host attributes plus static
/// attributes from the processor config)
pub type Attributes = BTreeMap<String, String>;

// ============================================================================
// Outcome
// ============================================================================

/// A named destination a processed record routes to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    /// Processed successfully
    Success,
    /// Cannot succeed, even if retried
    Failure,
    /// May succeed when re-consumed later
    Retry,
    /// Processor-defined channel (e.g. `matched` / `unmatched`)
    Custom(String),
}

impl Outcome {
    /// Create a custom outcome. The reserved names map to their built-in
    /// variants so `Outcome::custom("retry") == Outcome::Retry`.
    pub fn custom(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.as_str() {
            "success" => Outcome::Success,
            "failure" => Outcome::Failure,
            "retry" => Outcome::Retry,
            _ => Outcome::Custom(name),
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Retry => "retry",
            Outcome::Custom(name) => name,
        }
    }

    /// Whether this is one of the closed set {success, failure, retry}
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Outcome::Custom(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for Outcome {
    fn from(name: &str) -> Self {
        Outcome::custom(name)
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Outcome::custom(name))
    }
}

// ============================================================================
// Record Format
// ============================================================================

/// Serialization kind of input or output records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// JSON array or JSON Lines (json-like)
    #[default]
    Json,
    /// Parquet (binary, schema embedded)
    Parquet,
}

impl RecordFormat {
    /// Content type reported on finished output units
    pub fn mime_type(self) -> &'static str {
        match self {
            RecordFormat::Json => "application/json",
            RecordFormat::Parquet => "application/vnd.apache.parquet",
        }
    }

    /// File extension used by directory sinks
    pub fn extension(self) -> &'static str {
        match self {
            RecordFormat::Json => "json",
            RecordFormat::Parquet => "parquet",
        }
    }
}

// ============================================================================
// Execution Mode
// ============================================================================

/// Execution discipline for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One record at a time, in source order, on the calling thread
    #[default]
    Sync,
    /// Concurrent handler calls with a per-record timeout
    Async,
}

// ============================================================================
// Threshold Policy
// ============================================================================

/// What to do once the async error counter reaches `max_error_count`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Abort the batch with `Error::MaxErrorsExceeded`
    #[default]
    Abort,
    /// Log a warning once and keep routing
    Warn,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_names() {
        assert_eq!(Outcome::Success.to_string(), "success");
        assert_eq!(Outcome::Failure.name(), "failure");
        assert_eq!(Outcome::custom("matched").name(), "matched");
        assert_eq!(Outcome::custom("retry"), Outcome::Retry);
        assert!(!Outcome::custom("unmatched").is_builtin());
    }

    #[test]
    fn test_outcome_serde() {
        let json = serde_json::to_string(&Outcome::custom("matched")).unwrap();
        assert_eq!(json, "\"matched\"");
        let parsed: Outcome = serde_json::from_str("\"failure\"").unwrap();
        assert_eq!(parsed, Outcome::Failure);
    }

    #[test]
    fn test_config_enums_serde() {
        let mode: ExecutionMode = serde_json::from_str("\"async\"").unwrap();
        assert_eq!(mode, ExecutionMode::Async);
        let format: RecordFormat = serde_json::from_str("\"parquet\"").unwrap();
        assert_eq!(format.extension(), "parquet");
        assert_eq!(ThresholdPolicy::default(), ThresholdPolicy::Abort);
    }
}
