//! Record writers
//!
//! A writer accumulates the records of one output unit in memory and
//! hands back the serialized content when finished.

use super::columnar::{records_to_batch, to_arrow_schema};
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::types::{Attributes, Outcome, RecordFormat};
use crate::value::Record;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a writer reports when finished
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResult {
    /// Number of records written
    pub record_count: usize,
    /// Writer-reported metadata
    pub attributes: Attributes,
    /// Serialized content
    pub content: Bytes,
}

/// Serializes the records of one output unit
pub trait RecordWriter: Send {
    /// Append a record
    fn write(&mut self, record: &Record) -> Result<()>;

    /// Flush everything and return the content. The writer accepts no
    /// further records afterwards.
    fn finish(&mut self) -> Result<WriteResult>;

    /// Release the writer. Called once the unit is finished or abandoned,
    /// and must tolerate a writer that was already finished.
    fn close(&mut self) -> Result<()>;

    /// Content type of the serialized output
    fn mime_type(&self) -> &'static str;

    /// Records written so far
    fn record_count(&self) -> usize;
}

/// Create a writer for a record format
pub fn create_writer(
    format: RecordFormat,
    outcome: &Outcome,
    schema: &Schema,
    parquet: &ParquetWriterConfig,
) -> Result<Box<dyn RecordWriter>> {
    match format {
        RecordFormat::Json => Ok(Box::new(JsonRecordWriter::new(outcome.clone()))),
        RecordFormat::Parquet => Ok(Box::new(ParquetRecordWriter::new(
            outcome.clone(),
            schema,
            parquet.clone(),
        )?)),
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Writes one JSON object per line, leaving out null fields
#[derive(Debug)]
pub struct JsonRecordWriter {
    outcome: Outcome,
    buffer: Option<Vec<u8>>,
    record_count: usize,
}

impl JsonRecordWriter {
    /// Create a writer
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            buffer: Some(Vec::new()),
            record_count: 0,
        }
    }
}

impl RecordWriter for JsonRecordWriter {
    fn write(&mut self, record: &Record) -> Result<()> {
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| Error::writer(&self.outcome, "writer already finished"))?;
        serde_json::to_writer(&mut *buffer, &record.to_json_without_nulls())?;
        buffer.push(b'\n');
        self.record_count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<WriteResult> {
        let buffer = self
            .buffer
            .take()
            .ok_or_else(|| Error::writer(&self.outcome, "writer already finished"))?;
        Ok(WriteResult {
            record_count: self.record_count,
            attributes: Attributes::new(),
            content: Bytes::from(buffer),
        })
    }

    fn close(&mut self) -> Result<()> {
        self.buffer = None;
        Ok(())
    }

    fn mime_type(&self) -> &'static str {
        RecordFormat::Json.mime_type()
    }

    fn record_count(&self) -> usize {
        self.record_count
    }
}

// ============================================================================
// Parquet
// ============================================================================

/// Compression codec for parquet output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    None,
    #[default]
    Snappy,
    Gzip,
    Zstd,
}

/// Configuration for Parquet writer
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
    batch_size: usize,
    dictionary_enabled: bool,
    statistics_enabled: bool,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 1024 * 1024,
            batch_size: 1024,
            dictionary_enabled: true,
            statistics_enabled: true,
        }
    }
}

impl ParquetWriterConfig {
    /// Create a new config with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set compression from a codec choice
    #[must_use]
    pub fn with_codec(self, codec: ParquetCompression) -> Self {
        match codec {
            ParquetCompression::None => self.uncompressed(),
            ParquetCompression::Snappy => self.with_compression(Compression::SNAPPY),
            ParquetCompression::Gzip => self.gzip(),
            ParquetCompression::Zstd => self.zstd(),
        }
    }

    /// Set compression algorithm
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set row group size
    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Set how many records are buffered before they are encoded
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Enable or disable dictionary encoding
    #[must_use]
    pub fn with_dictionary(mut self, enabled: bool) -> Self {
        self.dictionary_enabled = enabled;
        self
    }

    /// Enable or disable statistics
    #[must_use]
    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.statistics_enabled = enabled;
        self
    }

    /// Use no compression
    #[must_use]
    pub fn uncompressed(mut self) -> Self {
        self.compression = Compression::UNCOMPRESSED;
        self
    }

    /// Use ZSTD compression
    #[must_use]
    pub fn zstd(mut self) -> Self {
        self.compression = Compression::ZSTD(parquet::basic::ZstdLevel::default());
        self
    }

    /// Use GZIP compression
    #[must_use]
    pub fn gzip(mut self) -> Self {
        self.compression = Compression::GZIP(parquet::basic::GzipLevel::default());
        self
    }

    /// Configured compression
    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Get row group size
    #[must_use]
    pub fn row_group_size(&self) -> usize {
        self.row_group_size
    }

    fn build_properties(&self) -> WriterProperties {
        let mut builder = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size);

        if !self.dictionary_enabled {
            builder = builder.set_dictionary_enabled(false);
        }

        if !self.statistics_enabled {
            builder =
                builder.set_statistics_enabled(parquet::file::properties::EnabledStatistics::None);
        }

        builder.build()
    }
}

/// Writes records as a parquet file held in memory
pub struct ParquetRecordWriter {
    outcome: Outcome,
    schema: Schema,
    writer: Option<ArrowWriter<Vec<u8>>>,
    pending: Vec<Record>,
    config: ParquetWriterConfig,
    record_count: usize,
}

impl std::fmt::Debug for ParquetRecordWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetRecordWriter")
            .field("outcome", &self.outcome)
            .field("schema", &self.schema.to_string())
            .field("pending", &self.pending.len())
            .field("record_count", &self.record_count)
            .finish_non_exhaustive()
    }
}

impl ParquetRecordWriter {
    /// Create a writer for records of `schema`
    pub fn new(outcome: Outcome, schema: &Schema, config: ParquetWriterConfig) -> Result<Self> {
        let arrow_schema = Arc::new(to_arrow_schema(schema));
        let props = config.build_properties();
        let writer = ArrowWriter::try_new(Vec::new(), arrow_schema, Some(props))
            .map_err(|e| Error::writer(&outcome, format!("Failed to create Parquet writer: {e}")))?;

        Ok(Self {
            outcome,
            schema: schema.clone(),
            writer: Some(writer),
            pending: Vec::new(),
            config,
            record_count: 0,
        })
    }

    fn flush_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::writer(&self.outcome, "writer already finished"))?;
        let batch = records_to_batch(&self.schema, &self.pending)?;
        writer
            .write(&batch)
            .map_err(|e| Error::writer(&self.outcome, format!("Failed to write batch: {e}")))?;
        self.pending.clear();
        Ok(())
    }
}

impl RecordWriter for ParquetRecordWriter {
    fn write(&mut self, record: &Record) -> Result<()> {
        if self.writer.is_none() {
            return Err(Error::writer(&self.outcome, "writer already finished"));
        }
        self.pending.push(record.clone());
        self.record_count += 1;
        if self.pending.len() >= self.config.batch_size {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<WriteResult> {
        self.flush_pending()?;
        let writer = self
            .writer
            .take()
            .ok_or_else(|| Error::writer(&self.outcome, "writer already finished"))?;
        let content = writer.into_inner().map_err(|e| {
            Error::writer(&self.outcome, format!("Failed to close Parquet writer: {e}"))
        })?;

        let mut attributes = Attributes::new();
        attributes.insert(
            "parquet.compression".to_string(),
            format!("{:?}", self.config.compression),
        );
        attributes.insert("parquet.columns".to_string(), self.schema.len().to_string());

        Ok(WriteResult {
            record_count: self.record_count,
            attributes,
            content: Bytes::from(content),
        })
    }

    fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.writer = None;
        Ok(())
    }

    fn mime_type(&self) -> &'static str {
        RecordFormat::Parquet.mime_type()
    }

    fn record_count(&self) -> usize {
        self.record_count
    }
}
