//! Lookup service trait and the in-memory table

use crate::error::{Error, HandlerError};
use crate::handler::InputContext;
use crate::value::Record;
use std::collections::HashMap;
use std::sync::Arc;

/// Finds the record that enriches an input
///
/// `Ok(None)` means no match. Errors follow the handler classification:
/// a retryable error routes the input to `retry`, a fatal one aborts the
/// batch.
pub trait LookupService: Send + Sync {
    /// Look up the enrichment record for an input
    fn lookup(&self, ctx: &InputContext) -> std::result::Result<Option<Record>, HandlerError>;

    /// Cache key for an input, `None` if the input cannot be looked up
    fn cache_key(&self, ctx: &InputContext) -> Option<String>;

    /// Name used in logs
    fn name(&self) -> &str {
        "lookup"
    }
}

impl<L: LookupService + ?Sized> LookupService for Arc<L> {
    fn lookup(&self, ctx: &InputContext) -> std::result::Result<Option<Record>, HandlerError> {
        (**self).lookup(ctx)
    }

    fn cache_key(&self, ctx: &InputContext) -> Option<String> {
        (**self).cache_key(ctx)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// In-memory table keyed by one field of the input record
#[derive(Debug, Clone)]
pub struct StaticLookup {
    key_field: String,
    entries: HashMap<String, Record>,
}

impl StaticLookup {
    /// Create an empty table matching on `key_field` (a dotted path)
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            entries: HashMap::new(),
        }
    }

    /// Build a table from records, keyed by their own `key_field`
    pub fn from_records(
        key_field: impl Into<String>,
        records: impl IntoIterator<Item = Record>,
    ) -> crate::error::Result<Self> {
        let mut table = Self::new(key_field);
        for (idx, record) in records.into_iter().enumerate() {
            let key = record
                .get_path(&table.key_field)
                .filter(|v| !v.is_null())
                .map(ToString::to_string)
                .ok_or_else(|| {
                    Error::invalid_value(
                        "lookup",
                        format!("entry {idx} has no '{}' field", table.key_field),
                    )
                })?;
            table.entries.insert(key, record);
        }
        Ok(table)
    }

    /// Add an entry
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, record: Record) -> Self {
        self.entries.insert(key.into(), record);
        self
    }

    /// Field the table matches on
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LookupService for StaticLookup {
    fn lookup(&self, ctx: &InputContext) -> std::result::Result<Option<Record>, HandlerError> {
        Ok(self
            .cache_key(ctx)
            .and_then(|key| self.entries.get(&key).cloned()))
    }

    fn cache_key(&self, ctx: &InputContext) -> Option<String> {
        ctx.record
            .get_path(&self.key_field)
            .filter(|v| !v.is_null())
            .map(ToString::to_string)
    }

    fn name(&self) -> &str {
        "static"
    }
}
