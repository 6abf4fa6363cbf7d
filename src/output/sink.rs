//! Sinks: where finished output units go

use super::writer::{create_writer, ParquetWriterConfig, RecordWriter};
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::source::decode_records;
use crate::types::{Attributes, Outcome, RecordFormat};
use crate::value::Record;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Attribute holding the number of records in a unit
pub const RECORD_COUNT_ATTRIBUTE: &str = "record.count";

/// Attribute holding the content type of a unit
pub const MIME_TYPE_ATTRIBUTE: &str = "mime.type";

/// A sealed output unit handed to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedUnit {
    /// Channel the unit belongs to
    pub outcome: Outcome,
    /// Number of records written
    pub record_count: usize,
    /// Batch attributes, writer metadata, `record.count` and `mime.type`
    pub attributes: Attributes,
    /// Serialized records
    pub content: Bytes,
}

impl FinishedUnit {
    /// Content type, if recorded
    pub fn mime_type(&self) -> Option<&str> {
        self.attributes.get(MIME_TYPE_ATTRIBUTE).map(String::as_str)
    }
}

/// Persists or exposes finished output units
///
/// A sink receives each finished unit exactly once and must tolerate
/// `finalize` being called concurrently for distinct units.
pub trait Sink: Send + Sync {
    /// Create the writer for a new output unit
    fn create_writer(&self, outcome: &Outcome, schema: &Schema) -> Result<Box<dyn RecordWriter>>;

    /// Accept a finished unit
    fn finalize(&self, unit: FinishedUnit) -> Result<()>;
}

// ============================================================================
// Memory sink
// ============================================================================

/// Sink collecting finished units in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    format: RecordFormat,
    parquet: ParquetWriterConfig,
    units: Mutex<Vec<FinishedUnit>>,
}

impl MemorySink {
    /// Create a sink writing `format`
    pub fn new(format: RecordFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Set the parquet writer configuration
    #[must_use]
    pub fn with_parquet_config(mut self, config: ParquetWriterConfig) -> Self {
        self.parquet = config;
        self
    }

    /// All finished units, in finalize order
    pub fn units(&self) -> Vec<FinishedUnit> {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The finished unit for an outcome
    pub fn unit(&self, outcome: &Outcome) -> Option<FinishedUnit> {
        self.units().into_iter().find(|u| &u.outcome == outcome)
    }

    /// Decoded records of an outcome's unit (empty if there is none)
    pub fn records(&self, outcome: &Outcome) -> Result<Vec<Record>> {
        match self.unit(outcome) {
            Some(unit) => decode_records(self.format, &unit.content),
            None => Ok(Vec::new()),
        }
    }

    /// Outcomes that received a unit
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.units().into_iter().map(|u| u.outcome).collect()
    }
}

impl Sink for MemorySink {
    fn create_writer(&self, outcome: &Outcome, schema: &Schema) -> Result<Box<dyn RecordWriter>> {
        create_writer(self.format, outcome, schema, &self.parquet)
    }

    fn finalize(&self, unit: FinishedUnit) -> Result<()> {
        let mut units = self.units.lock().unwrap_or_else(PoisonError::into_inner);
        if units.iter().any(|u| u.outcome == unit.outcome) {
            return Err(Error::sink(format!(
                "unit for outcome '{}' already finalized",
                unit.outcome
            )));
        }
        units.push(unit);
        Ok(())
    }
}

// ============================================================================
// Directory sink
// ============================================================================

/// Sink writing each unit to `<root>/<outcome>/<batch-id>.<ext>`
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
    batch_id: String,
    format: RecordFormat,
    parquet: ParquetWriterConfig,
}

impl DirectorySink {
    /// Create a sink rooted at `root`. The batch id defaults to the
    /// current UTC time.
    pub fn new(root: impl AsRef<Path>, format: RecordFormat) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            batch_id: chrono::Utc::now().format("%Y%m%dT%H%M%S%3f").to_string(),
            format,
            parquet: ParquetWriterConfig::default(),
        }
    }

    /// Set the batch id used as file stem
    #[must_use]
    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = batch_id.into();
        self
    }

    /// Set the parquet writer configuration
    #[must_use]
    pub fn with_parquet_config(mut self, config: ParquetWriterConfig) -> Self {
        self.parquet = config;
        self
    }

    /// Path a unit for `outcome` is written to
    pub fn unit_path(&self, outcome: &Outcome) -> PathBuf {
        self.root
            .join(outcome.name())
            .join(format!("{}.{}", self.batch_id, self.format.extension()))
    }
}

impl Sink for DirectorySink {
    fn create_writer(&self, outcome: &Outcome, schema: &Schema) -> Result<Box<dyn RecordWriter>> {
        create_writer(self.format, outcome, schema, &self.parquet)
    }

    fn finalize(&self, unit: FinishedUnit) -> Result<()> {
        let path = self.unit_path(&unit.outcome);
        if path.exists() {
            return Err(Error::sink(format!("{} already exists", path.display())));
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, &unit.content)?;

        tracing::info!(
            outcome = %unit.outcome,
            records = unit.record_count,
            path = %path.display(),
            "Finalized output unit"
        );
        Ok(())
    }
}
