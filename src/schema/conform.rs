//! Record conformance: coercing records onto a resolved schema

use super::types::{FieldType, Schema};
use crate::error::{Error, Result};
use crate::value::{format_timestamp, parse_timestamp, Record, Value};
use chrono::DateTime;
use indexmap::IndexMap;

impl Schema {
    /// Conform a record to this schema
    ///
    /// Fields the schema does not declare are dropped, missing nullable
    /// fields are filled with null, values are coerced to the declared
    /// type. A missing or null non-nullable field, or a value that cannot
    /// be coerced, is a schema violation.
    pub fn conform(&self, record: &Record) -> Result<Record> {
        self.conform_at(record, "")
    }

    /// Conform a record without ever failing
    ///
    /// Used for error records, whose schema declares every top-level field
    /// nullable: a missing field or a value that cannot be coerced to the
    /// declared type is written as null instead of rejecting the record.
    pub fn conform_lenient(&self, record: &Record) -> Record {
        let mut out = Record::new();
        for field in &self.fields {
            let value = match record.get(&field.name) {
                None => Value::Null,
                Some(value) => coerce(value, &field.field_type, &field.name).unwrap_or_else(|e| {
                    tracing::debug!(field = %field.name, error = %e, "Dropping value from error record");
                    Value::Null
                }),
            };
            out.insert(field.name.clone(), value);
        }
        out
    }

    fn conform_at(&self, record: &Record, prefix: &str) -> Result<Record> {
        let mut out = Record::new();
        for field in &self.fields {
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{prefix}.{}", field.name)
            };
            let value = match record.get(&field.name) {
                None | Some(Value::Null) if field.nullable => Value::Null,
                None => return Err(Error::schema_violation(path, "missing required field")),
                Some(Value::Null) => {
                    return Err(Error::schema_violation(path, "required field is null"))
                }
                Some(value) => coerce(value, &field.field_type, &path)?,
            };
            out.insert(field.name.clone(), value);
        }
        Ok(out)
    }
}

/// Coerce a value to a field type
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
fn coerce(value: &Value, target: &FieldType, path: &str) -> Result<Value> {
    let mismatch = || {
        Error::schema_violation(
            path,
            format!("cannot coerce {} to {target}", value.type_name()),
        )
    };

    match (target, value) {
        (_, Value::Null) => Ok(Value::Null),

        (FieldType::String, Value::String(_)) => Ok(value.clone()),
        (FieldType::String, Value::Timestamp(ts)) => Ok(Value::String(format_timestamp(ts))),
        (FieldType::String, other) => Ok(Value::String(other.to_string())),

        (FieldType::Int, Value::Int(_)) => Ok(value.clone()),
        (FieldType::Int, Value::Long(l)) => i32::try_from(*l).map(Value::Int).map_err(|_| mismatch()),
        (FieldType::Int, Value::Double(d)) if d.fract() == 0.0 => {
            let l = *d as i64;
            i32::try_from(l).map(Value::Int).map_err(|_| mismatch())
        }
        (FieldType::Int, Value::String(s)) => s.trim().parse().map(Value::Int).map_err(|_| mismatch()),

        (FieldType::Long, Value::Int(i)) => Ok(Value::Long(i64::from(*i))),
        (FieldType::Long, Value::Long(_)) => Ok(value.clone()),
        (FieldType::Long, Value::Double(d)) if d.fract() == 0.0 => Ok(Value::Long(*d as i64)),
        (FieldType::Long, Value::Timestamp(ts)) => Ok(Value::Long(ts.timestamp_millis())),
        (FieldType::Long, Value::String(s)) => {
            s.trim().parse().map(Value::Long).map_err(|_| mismatch())
        }

        (FieldType::Double, Value::Int(_) | Value::Long(_) | Value::Double(_)) => {
            value.as_f64().map(Value::Double).ok_or_else(mismatch)
        }
        (FieldType::Double, Value::String(s)) => {
            s.trim().parse().map(Value::Double).map_err(|_| mismatch())
        }

        (FieldType::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (FieldType::Boolean, Value::String(s)) => match s.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },

        (FieldType::Timestamp, Value::Timestamp(_)) => Ok(value.clone()),
        (FieldType::Timestamp, Value::String(s)) => parse_timestamp(s)
            .map(Value::Timestamp)
            .ok_or_else(mismatch),
        (FieldType::Timestamp, Value::Int(_) | Value::Long(_)) => value
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(Value::Timestamp)
            .ok_or_else(mismatch),

        (FieldType::Array { items }, Value::Array(values)) => values
            .iter()
            .enumerate()
            .map(|(idx, v)| coerce(v, items, &format!("{path}[{idx}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),

        (FieldType::Map { values }, Value::Map(map)) => coerce_map(map.iter(), values, path),
        (FieldType::Map { values }, Value::Record(record)) => coerce_map(record.iter(), values, path),

        (FieldType::Record(schema), Value::Record(record)) => {
            schema.conform_at(record, path).map(Value::Record)
        }
        (FieldType::Record(schema), Value::Map(map)) => {
            let record: Record = map.clone().into();
            schema.conform_at(&record, path).map(Value::Record)
        }

        _ => Err(mismatch()),
    }
}

fn coerce_map<'a>(
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
    values: &FieldType,
    path: &str,
) -> Result<Value> {
    let mut out = IndexMap::new();
    for (key, value) in entries {
        out.insert(key.clone(), coerce(value, values, &format!("{path}.{key}"))?);
    }
    Ok(Value::Map(out))
}
