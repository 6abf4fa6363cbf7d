//! Schema inference from record values

use super::types::{FieldType, MergeStrategy, Schema, SchemaField};
use crate::error::{Error, Result};
use crate::value::{parse_timestamp, Record, Value};

/// Schema inferrer with configuration options
#[derive(Debug, Clone)]
pub struct SchemaInferrer {
    /// Infer `timestamp` for strings that parse as timestamps
    detect_timestamps: bool,
    /// Maximum depth for nested records
    max_depth: usize,
}

impl Default for SchemaInferrer {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaInferrer {
    /// Create a new schema inferrer with default settings
    pub fn new() -> Self {
        Self {
            detect_timestamps: false,
            max_depth: 10,
        }
    }

    /// Enable/disable timestamp detection on string values
    #[must_use]
    pub fn with_timestamp_detection(mut self, enabled: bool) -> Self {
        self.detect_timestamps = enabled;
        self
    }

    /// Set maximum depth for nested records
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Infer a schema from a single record
    pub fn infer_record(&self, record: &Record) -> Result<Schema> {
        self.infer_fields(record, 0, "")
    }

    /// Infer a schema from an example document (a JSON object)
    pub fn infer_example(&self, example: &str) -> Result<Schema> {
        let json: serde_json::Value = serde_json::from_str(example).map_err(|e| {
            Error::schema_inference(format!("example document is not valid JSON: {e}"))
        })?;
        let record = Record::from_json(&json).map_err(|e| {
            Error::schema_inference(format!("example document is not a record: {e}"))
        })?;
        self.infer_record(&record)
    }

    /// Infer a schema covering several records
    ///
    /// Fields missing from some records become nullable; conflicting
    /// field types fail the inference.
    pub fn infer_records(&self, records: &[Record]) -> Result<Schema> {
        let Some((first, rest)) = records.split_first() else {
            return Ok(Schema::new());
        };

        let mut schema = self.infer_record(first)?;
        for (idx, record) in rest.iter().enumerate() {
            let next = self.infer_record(record)?;
            schema = schema.union(&next).ok_or_else(|| {
                Error::schema_inference(format!(
                    "record {} has field types incompatible with {schema}",
                    idx + 1
                ))
            })?;
        }
        Ok(schema)
    }

    fn infer_fields(&self, record: &Record, depth: usize, prefix: &str) -> Result<Schema> {
        let mut schema = Schema::new();
        for (name, value) in record.iter() {
            let path = join_path(prefix, name);
            let field = match self.infer_value(value, depth, &path)? {
                Some(field_type) => SchemaField::new(name.clone(), field_type),
                // All-null field defaults to string
                None => SchemaField::nullable(name.clone(), FieldType::String),
            };
            schema.add_field(field);
        }
        Ok(schema)
    }

    /// Infer the type of a value; `None` for null
    fn infer_value(&self, value: &Value, depth: usize, path: &str) -> Result<Option<FieldType>> {
        if depth >= self.max_depth {
            return Ok(Some(FieldType::String));
        }

        let field_type = match value {
            Value::Null => return Ok(None),
            Value::Bool(_) => FieldType::Boolean,
            Value::Int(_) => FieldType::Int,
            Value::Long(_) => FieldType::Long,
            Value::Double(_) => FieldType::Double,
            Value::Timestamp(_) => FieldType::Timestamp,
            Value::String(s) => {
                if self.detect_timestamps && parse_timestamp(s).is_some() {
                    FieldType::Timestamp
                } else {
                    FieldType::String
                }
            }
            Value::Array(items) => FieldType::array(self.infer_elements(items, depth, path)?),
            Value::Map(map) => {
                let values: Vec<Value> = map.values().cloned().collect();
                FieldType::map(self.infer_elements(&values, depth, path)?)
            }
            Value::Record(record) => FieldType::Record(self.infer_fields(record, depth + 1, path)?),
        };
        Ok(Some(field_type))
    }

    /// Element type of a sequence: taken from the first non-null element,
    /// every other element must unify with it
    fn infer_elements(&self, items: &[Value], depth: usize, path: &str) -> Result<FieldType> {
        let mut element: Option<FieldType> = None;
        for (idx, item) in items.iter().enumerate() {
            let Some(item_type) = self.infer_value(item, depth + 1, path)? else {
                continue;
            };
            element = Some(match element {
                None => item_type,
                Some(current) => current.unify(&item_type).ok_or_else(|| {
                    Error::schema_inference(format!(
                        "field '{path}' mixes element types {current} and {item_type} (element {idx})"
                    ))
                })?,
            });
        }
        Ok(element.unwrap_or(FieldType::String))
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Infer schema from a single record (convenience function)
pub fn infer_schema(record: &Record) -> Result<Schema> {
    SchemaInferrer::new().infer_record(record)
}

/// Merge an input and an output schema under a merge strategy
///
/// `InputAndOutput` keeps input fields in input order, replaces the ones
/// the output also declares (output wins), then appends output-only
/// fields in output order.
pub fn merge_schemas(input: &Schema, output: &Schema, strategy: MergeStrategy) -> Schema {
    match strategy {
        MergeStrategy::OutputOnly => output.clone(),
        MergeStrategy::InputAndOutput => {
            let mut merged = input.clone();
            for field in &output.fields {
                merged.add_field(field.clone());
            }
            merged
        }
    }
}
