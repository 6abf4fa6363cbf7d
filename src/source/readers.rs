//! JSON and parquet sources

use super::types::{RecordSource, VecSource};
use crate::error::{Error, Result};
use crate::output::{batch_to_records, from_arrow_schema};
use crate::schema::Schema;
use crate::types::RecordFormat;
use crate::value::Record;
use bytes::Bytes;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::collections::VecDeque;

// ============================================================================
// JSON
// ============================================================================

/// Source over a JSON array of objects or JSON Lines
///
/// JSON carries no schema; the resolver infers one from the first record.
#[derive(Debug)]
pub struct JsonSource {
    records: VecSource,
}

impl JsonSource {
    /// Parse a JSON document. A leading `[` selects array mode, anything
    /// else is read as one object per line.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::environment(format!("JSON input is not UTF-8: {e}")))?;

        let records = if text.trim_start().starts_with('[') {
            parse_array(text)?
        } else {
            parse_lines(text)?
        };

        tracing::debug!(records = records.len(), "Parsed JSON input");
        Ok(Self {
            records: VecSource::new(records),
        })
    }
}

fn parse_array(text: &str) -> Result<Vec<Record>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(text)
        .map_err(|e| Error::environment(format!("malformed JSON array: {e}")))?;
    values
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            Record::from_json(value)
                .map_err(|e| Error::environment(format!("element {idx}: {e}")))
        })
        .collect()
}

fn parse_lines(text: &str) -> Result<Vec<Record>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            Record::from_json_str(line)
                .map_err(|e| Error::environment(format!("line {}: {e}", idx + 1)))
        })
        .collect()
}

impl RecordSource for JsonSource {
    fn schema(&self) -> Option<Schema> {
        None
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        self.records.next_record()
    }
}

// ============================================================================
// Parquet
// ============================================================================

/// Source over a parquet file, with the file's embedded schema
pub struct ParquetSource {
    schema: Schema,
    reader: ParquetRecordBatchReader,
    buffered: VecDeque<Record>,
}

impl std::fmt::Debug for ParquetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetSource")
            .field("schema", &self.schema.to_string())
            .field("buffered", &self.buffered.len())
            .finish_non_exhaustive()
    }
}

impl ParquetSource {
    /// Open parquet content
    pub fn from_bytes(bytes: Bytes) -> Result<Self> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
            .map_err(|e| Error::environment(format!("invalid parquet input: {e}")))?;
        let schema = from_arrow_schema(builder.schema())?;
        let reader = builder
            .build()
            .map_err(|e| Error::environment(format!("invalid parquet input: {e}")))?;

        Ok(Self {
            schema,
            reader,
            buffered: VecDeque::new(),
        })
    }
}

impl RecordSource for ParquetSource {
    fn schema(&self) -> Option<Schema> {
        Some(self.schema.clone())
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        while self.buffered.is_empty() {
            match self.reader.next() {
                Some(batch) => {
                    let batch = batch
                        .map_err(|e| Error::environment(format!("failed to read parquet: {e}")))?;
                    self.buffered.extend(batch_to_records(&batch)?);
                }
                None => return Ok(None),
            }
        }
        Ok(self.buffered.pop_front())
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Open a source for serialized input of the given format
pub fn open_source(format: RecordFormat, bytes: Bytes) -> Result<Box<dyn RecordSource>> {
    match format {
        RecordFormat::Json => Ok(Box::new(JsonSource::from_bytes(&bytes)?)),
        RecordFormat::Parquet => Ok(Box::new(ParquetSource::from_bytes(bytes)?)),
    }
}

/// Decode serialized records of the given format
pub fn decode_records(format: RecordFormat, bytes: &Bytes) -> Result<Vec<Record>> {
    open_source(format, bytes.clone())?.read_all()
}
