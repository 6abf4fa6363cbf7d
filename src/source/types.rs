//! Record source contract

use crate::error::Result;
use crate::schema::Schema;
use crate::value::Record;
use std::collections::VecDeque;

/// Supplies the finite, ordered input records of one batch
pub trait RecordSource: Send {
    /// Schema embedded in the source, if the format carries one
    fn schema(&self) -> Option<Schema>;

    /// Next record, `None` at end of stream
    fn next_record(&mut self) -> Result<Option<Record>>;

    /// Drain the remaining records
    fn read_all(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn schema(&self) -> Option<Schema> {
        (**self).schema()
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        (**self).next_record()
    }
}

/// In-memory source
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    schema: Option<Schema>,
    records: VecDeque<Record>,
}

impl VecSource {
    /// Create a source over records
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            schema: None,
            records: records.into_iter().collect(),
        }
    }

    /// Attach an embedded schema
    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Records not yet read
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl RecordSource for VecSource {
    fn schema(&self) -> Option<Schema> {
        self.schema.clone()
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        Ok(self.records.pop_front())
    }
}
