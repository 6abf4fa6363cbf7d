//! Error types for recordflow
//!
//! Two layers live here. [`Error`] is the batch-level error: anything that
//! surfaces as an `Err(Error)` from the engine aborts the whole batch.
//! [`HandlerError`] is the record-level taxonomy a handler raises; the
//! executors turn its business and retryable variants into routed error
//! records and only its fatal variant into an [`Error`].

use thiserror::Error;

/// The main error type for recordflow
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Schema Errors
    // ============================================================================
    #[error("Schema inference failed: {message}")]
    SchemaInference { message: String },

    #[error("Schema violation on field '{field}': {message}")]
    SchemaViolation { field: String, message: String },

    #[error("Failed to decode record: {message}")]
    Decode { message: String },

    // ============================================================================
    // Execution Errors
    // ============================================================================
    #[error("Environment error: {message}")]
    Environment { message: String },

    #[error("Handler failed fatally: {0}")]
    HandlerFatal(#[source] anyhow::Error),

    #[error("Maximum tolerated error count reached ({count} >= {max})")]
    MaxErrorsExceeded { count: usize, max: usize },

    // ============================================================================
    // Output Errors
    // ============================================================================
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Writer error for outcome '{outcome}': {message}")]
    Writer { outcome: String, message: String },

    #[error("Sink error: {message}")]
    Sink { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a schema inference error
    pub fn schema_inference(message: impl Into<String>) -> Self {
        Self::SchemaInference {
            message: message.into(),
        }
    }

    /// Create a schema violation error
    pub fn schema_violation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create an environment error
    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment {
            message: message.into(),
        }
    }

    /// Create a writer error
    pub fn writer(outcome: impl ToString, message: impl Into<String>) -> Self {
        Self::Writer {
            outcome: outcome.to_string(),
            message: message.into(),
        }
    }

    /// Create a sink error
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Whether this error invalidates the input batch itself (as opposed to
    /// the environment it ran in). The host uses this to decide between
    /// backing off and rejecting the batch outright.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Error::Decode { .. } | Error::SchemaInference { .. } | Error::SchemaViolation { .. }
        )
    }
}

/// Result type alias for recordflow
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

// ============================================================================
// Record-level taxonomy
// ============================================================================

/// Failure raised by a handler for a single record
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The record cannot succeed, even if retried. Routed to `failure`.
    #[error("{0}")]
    Business(String),

    /// A transient condition; the record may succeed later. Routed to `retry`.
    #[error("{0}")]
    Retryable(String),

    /// Anything else. Aborts the whole batch.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl HandlerError {
    /// Create a non-retryable business error
    pub fn business(message: impl Into<String>) -> Self {
        Self::Business(message.into())
    }

    /// Create a retryable error
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable(message.into())
    }

    /// Create a fatal error from any displayable message
    pub fn fatal(message: impl std::fmt::Display) -> Self {
        Self::Fatal(anyhow::anyhow!("{message}"))
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Retryable(_))
    }

    /// Check if this error must abort the batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, HandlerError::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::schema_violation("id", "missing required field");
        assert_eq!(
            err.to_string(),
            "Schema violation on field 'id': missing required field"
        );

        let err = Error::MaxErrorsExceeded { count: 10, max: 10 };
        assert_eq!(
            err.to_string(),
            "Maximum tolerated error count reached (10 >= 10)"
        );
    }

    #[test]
    fn test_is_data_error() {
        assert!(Error::decode("bad json").is_data_error());
        assert!(Error::schema_inference("mixed").is_data_error());
        assert!(!Error::environment("disk full").is_data_error());
        assert!(!Error::sink("closed").is_data_error());
    }

    #[test]
    fn test_handler_error_classes() {
        assert!(HandlerError::retryable("busy").is_retryable());
        assert!(!HandlerError::business("bad id").is_retryable());
        assert!(HandlerError::fatal("boom").is_fatal());
        assert_eq!(HandlerError::business("bad id").to_string(), "bad id");
    }

    #[test]
    fn test_anyhow_converts_to_fatal() {
        fn parse(s: &str) -> std::result::Result<i32, HandlerError> {
            let n: i32 = s.parse().map_err(anyhow::Error::from)?;
            Ok(n)
        }
        assert!(parse("x").unwrap_err().is_fatal());
        assert_eq!(parse("7").unwrap(), 7);
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
