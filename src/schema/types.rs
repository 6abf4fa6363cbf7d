//! Schema types

use crate::value::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the error message field appended to error records
pub const ERROR_MESSAGE_FIELD: &str = "errorMessage";

/// Name of the timestamp field appended to error records
pub const AT_TIME_FIELD: &str = "atTime";

/// Field type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Long,
    Boolean,
    Double,
    Timestamp,
    Array { items: Box<FieldType> },
    Map { values: Box<FieldType> },
    Record(Schema),
}

impl FieldType {
    /// Create an array type
    pub fn array(items: FieldType) -> Self {
        FieldType::Array {
            items: Box::new(items),
        }
    }

    /// Create a map type
    pub fn map(values: FieldType) -> Self {
        FieldType::Map {
            values: Box::new(values),
        }
    }

    /// Check if this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Long | FieldType::Double)
    }

    /// Unify two types into the narrowest type holding both, if any
    ///
    /// Numbers widen (`int` → `long` → `double`), nested records union
    /// their fields; any other mismatch has no common type.
    pub fn unify(&self, other: &FieldType) -> Option<FieldType> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (FieldType::Int, FieldType::Long) | (FieldType::Long, FieldType::Int) => {
                Some(FieldType::Long)
            }
            (a, b) if a.is_numeric() && b.is_numeric() => Some(FieldType::Double),
            (FieldType::Array { items: a }, FieldType::Array { items: b }) => {
                a.unify(b).map(FieldType::array)
            }
            (FieldType::Map { values: a }, FieldType::Map { values: b }) => {
                a.unify(b).map(FieldType::map)
            }
            (FieldType::Record(a), FieldType::Record(b)) => a.union(b).map(FieldType::Record),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Int => write!(f, "int"),
            FieldType::Long => write!(f, "long"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Double => write!(f, "double"),
            FieldType::Timestamp => write!(f, "timestamp"),
            FieldType::Array { items } => write!(f, "array<{items}>"),
            FieldType::Map { values } => write!(f, "map<{values}>"),
            FieldType::Record(_) => write!(f, "record"),
        }
    }
}

/// A named, typed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field name
    pub name: String,

    /// Field type
    #[serde(flatten)]
    pub field_type: FieldType,

    /// Whether the field may be null or absent
    #[serde(default)]
    pub nullable: bool,
}

impl SchemaField {
    /// Create a non-nullable field
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
        }
    }

    /// Create a nullable field
    pub fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
        }
    }
}

/// Ordered list of fields describing a record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Fields in order
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a schema from fields
    pub fn from_fields(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    /// Add a field, replacing any existing field of the same name in place
    pub fn add_field(&mut self, field: SchemaField) {
        match self.index_of(&field.name) {
            Some(idx) => self.fields[idx] = field,
            None => self.fields.push(field),
        }
    }

    /// Builder-style add
    #[must_use]
    pub fn with_field(mut self, field: SchemaField) -> Self {
        self.add_field(field);
        self
    }

    /// Get a field by name
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Position of a field
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Check if a field exists
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Field names in order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Schema of error records: this schema followed by a nullable
    /// `errorMessage:string` and a nullable `atTime:timestamp`
    ///
    /// Every field is relaxed to nullable so a malformed input record can
    /// always be written to the failure or retry channel.
    #[must_use]
    pub fn with_error_fields(&self) -> Schema {
        let mut schema = self.clone();
        for field in &mut schema.fields {
            field.nullable = true;
        }
        schema.add_field(SchemaField::nullable(ERROR_MESSAGE_FIELD, FieldType::String));
        schema.add_field(SchemaField::nullable(AT_TIME_FIELD, FieldType::Timestamp));
        schema
    }

    /// Union of two schemas: shared fields unify their types, fields
    /// present on one side only become nullable. `None` when a shared
    /// field has no common type.
    pub fn union(&self, other: &Schema) -> Option<Schema> {
        let mut merged = Schema::new();
        for field in &self.fields {
            match other.field(&field.name) {
                Some(theirs) => merged.fields.push(SchemaField {
                    name: field.name.clone(),
                    field_type: unify_fields(field, theirs)?,
                    nullable: field.nullable || theirs.nullable,
                }),
                None => merged
                    .fields
                    .push(SchemaField::nullable(field.name.clone(), field.field_type.clone())),
            }
        }
        for field in &other.fields {
            if !self.contains(&field.name) {
                merged
                    .fields
                    .push(SchemaField::nullable(field.name.clone(), field.field_type.clone()));
            }
        }
        Some(merged)
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Convert to pretty JSON string
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Unify two same-named fields. A nullable string is what inference
/// produces for an all-null sample, so it yields to the other side.
fn unify_fields(a: &SchemaField, b: &SchemaField) -> Option<FieldType> {
    a.field_type.unify(&b.field_type).or_else(|| {
        if a.nullable && a.field_type == FieldType::String {
            Some(b.field_type.clone())
        } else if b.nullable && b.field_type == FieldType::String {
            Some(a.field_type.clone())
        } else {
            None
        }
    })
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", field.name, field.field_type)?;
            if field.nullable {
                write!(f, "?")?;
            }
        }
        write!(f, "}}")
    }
}

/// How the output schema of a batch is composed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Only the handler's output fields
    OutputOnly,
    /// Input fields followed by output fields, output wins on collisions
    #[default]
    InputAndOutput,
}

impl MergeStrategy {
    /// Compose the record that gets written for a successfully processed input
    pub fn compose(self, input: &Record, output: Record) -> Record {
        match self {
            MergeStrategy::OutputOnly => output,
            MergeStrategy::InputAndOutput => {
                let mut composed = input.clone();
                composed.merge_from(&output);
                composed
            }
        }
    }
}
