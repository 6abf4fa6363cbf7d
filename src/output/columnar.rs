//! Arrow bridge
//!
//! Maps resolved schemas onto Arrow schemas, records onto RecordBatches
//! (for the parquet writer), and RecordBatches back onto records (for the
//! parquet source).

use crate::error::{Error, Result};
use crate::schema::{FieldType, Schema, SchemaField};
use crate::value::{Record, Value};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int32Array, Int64Array, ListArray,
    MapArray, NullArray, StringArray, StructArray, TimestampMillisecondArray,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{
    DataType, Date32Type, Field, Fields, Float32Type, Float64Type, Int16Type, Int32Type,
    Int64Type, Int8Type, Schema as ArrowSchema, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::DateTime;
use indexmap::IndexMap;
use std::sync::Arc;

const TIMEZONE: &str = "UTC";

// ============================================================================
// Schema mapping
// ============================================================================

/// Convert a schema to an Arrow schema
pub fn to_arrow_schema(schema: &Schema) -> ArrowSchema {
    ArrowSchema::new(schema.fields.iter().map(to_arrow_field).collect::<Vec<_>>())
}

fn to_arrow_field(field: &SchemaField) -> Field {
    Field::new(&field.name, to_arrow_type(&field.field_type), field.nullable)
}

fn to_arrow_type(field_type: &FieldType) -> DataType {
    match field_type {
        FieldType::String => DataType::Utf8,
        FieldType::Int => DataType::Int32,
        FieldType::Long => DataType::Int64,
        FieldType::Boolean => DataType::Boolean,
        FieldType::Double => DataType::Float64,
        FieldType::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, Some(TIMEZONE.into())),
        FieldType::Array { items } => {
            DataType::List(Arc::new(Field::new("item", to_arrow_type(items), true)))
        }
        FieldType::Map { values } => {
            let entries = Fields::from(vec![
                Field::new("keys", DataType::Utf8, false),
                Field::new("values", to_arrow_type(values), true),
            ]);
            DataType::Map(
                Arc::new(Field::new("entries", DataType::Struct(entries), false)),
                false,
            )
        }
        FieldType::Record(schema) => DataType::Struct(Fields::from(
            schema.fields.iter().map(to_arrow_field).collect::<Vec<_>>(),
        )),
    }
}

/// Convert an Arrow schema (e.g. the one embedded in a parquet file) to a schema
pub fn from_arrow_schema(schema: &ArrowSchema) -> Result<Schema> {
    schema
        .fields()
        .iter()
        .map(|f| from_arrow_field(f))
        .collect::<Result<Vec<_>>>()
        .map(Schema::from_fields)
}

fn from_arrow_field(field: &Field) -> Result<SchemaField> {
    let field_type = from_arrow_type(field.data_type())?;
    let nullable = field.is_nullable() || field.data_type() == &DataType::Null;
    Ok(SchemaField {
        name: field.name().clone(),
        field_type,
        nullable,
    })
}

fn from_arrow_type(data_type: &DataType) -> Result<FieldType> {
    Ok(match data_type {
        DataType::Null | DataType::Utf8 | DataType::LargeUtf8 => FieldType::String,
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::UInt8 | DataType::UInt16 => {
            FieldType::Int
        }
        DataType::Int64 | DataType::UInt32 | DataType::UInt64 => FieldType::Long,
        DataType::Float32 | DataType::Float64 => FieldType::Double,
        DataType::Boolean => FieldType::Boolean,
        DataType::Timestamp(_, _) | DataType::Date32 => FieldType::Timestamp,
        DataType::List(item) | DataType::LargeList(item) => {
            FieldType::array(from_arrow_type(item.data_type())?)
        }
        DataType::Struct(fields) => FieldType::Record(Schema::from_fields(
            fields
                .iter()
                .map(|f| from_arrow_field(f))
                .collect::<Result<Vec<_>>>()?,
        )),
        DataType::Map(entries, _) => match entries.data_type() {
            DataType::Struct(kv) if kv.len() == 2 => FieldType::map(from_arrow_type(kv[1].data_type())?),
            other => return Err(Error::decode(format!("unsupported map entries type {other}"))),
        },
        other => return Err(Error::decode(format!("unsupported column type {other}"))),
    })
}

// ============================================================================
// Records -> Arrow
// ============================================================================

/// Convert records (already conformed to `schema`) into a RecordBatch
pub fn records_to_batch(schema: &Schema, records: &[Record]) -> Result<RecordBatch> {
    let arrow_schema = Arc::new(to_arrow_schema(schema));

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.len());
    for (field, arrow_field) in schema.fields.iter().zip(arrow_schema.fields()) {
        let values: Vec<Option<&Value>> = records
            .iter()
            .map(|record| record.get(&field.name).filter(|v| !v.is_null()))
            .collect();
        columns.push(build_array(&values, arrow_field.data_type())?);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(records.len()));
    Ok(RecordBatch::try_new_with_options(arrow_schema, columns, &options)?)
}

/// Build an Arrow array from record values
fn build_array(values: &[Option<&Value>], data_type: &DataType) -> Result<ArrayRef> {
    match data_type {
        DataType::Null => Ok(Arc::new(NullArray::new(values.len()))),

        DataType::Boolean => {
            let arr: BooleanArray = values.iter().map(|v| v.and_then(Value::as_bool)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Int32 => {
            let arr: Int32Array = values
                .iter()
                .map(|v| v.and_then(|v| v.as_i64()).and_then(|i| i32::try_from(i).ok()))
                .collect();
            Ok(Arc::new(arr))
        }

        DataType::Int64 => {
            let arr: Int64Array = values.iter().map(|v| v.and_then(Value::as_i64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Float64 => {
            let arr: Float64Array = values.iter().map(|v| v.and_then(Value::as_f64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Utf8 => {
            let arr: StringArray = values.iter().map(|v| v.map(ToString::to_string)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Timestamp(TimeUnit::Millisecond, tz) => {
            let arr: TimestampMillisecondArray = values
                .iter()
                .map(|v| {
                    v.and_then(|v| match v {
                        Value::Timestamp(ts) => Some(ts.timestamp_millis()),
                        other => other.as_i64(),
                    })
                })
                .collect();
            Ok(Arc::new(arr.with_timezone_opt(tz.clone())))
        }

        DataType::List(field) => build_list_array(values, field),

        DataType::Struct(fields) => build_struct_array(values, fields),

        DataType::Map(entries, _) => build_map_array(values, entries),

        other => Err(Error::Other(format!("unsupported arrow type {other}"))),
    }
}

fn offset(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| Error::Other("Array too large for i32 offset".to_string()))
}

/// Build a list array from array values
fn build_list_array(values: &[Option<&Value>], field: &Arc<Field>) -> Result<ArrayRef> {
    let mut all_items: Vec<Option<&Value>> = Vec::new();
    let mut offsets: Vec<i32> = vec![0];
    let mut valid = Vec::with_capacity(values.len());

    for value in values {
        if let Some(Value::Array(arr)) = value {
            all_items.extend(arr.iter().map(|item| Some(item).filter(|v| !v.is_null())));
            valid.push(true);
        } else {
            valid.push(false);
        }
        offsets.push(offset(all_items.len())?);
    }

    let items_array = build_array(&all_items, field.data_type())?;
    let list_array = ListArray::try_new(
        Arc::clone(field),
        OffsetBuffer::new(offsets.into()),
        items_array,
        Some(NullBuffer::from(valid)),
    )?;
    Ok(Arc::new(list_array))
}

fn nested_get<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    match value {
        Value::Record(r) => r.get(name),
        Value::Map(m) => m.get(name),
        _ => None,
    }
}

/// Build a struct array from nested records
fn build_struct_array(values: &[Option<&Value>], fields: &Fields) -> Result<ArrayRef> {
    let valid: Vec<bool> = values
        .iter()
        .map(|v| matches!(v, Some(Value::Record(_) | Value::Map(_))))
        .collect();
    let nulls = NullBuffer::from(valid);

    if fields.is_empty() {
        return Ok(Arc::new(StructArray::new_empty_fields(values.len(), Some(nulls))));
    }

    let mut child_arrays: Vec<ArrayRef> = Vec::with_capacity(fields.len());
    for field in fields {
        let child_values: Vec<Option<&Value>> = values
            .iter()
            .map(|v| {
                v.and_then(|v| nested_get(v, field.name()))
                    .filter(|v| !v.is_null())
            })
            .collect();
        child_arrays.push(build_array(&child_values, field.data_type())?);
    }

    let struct_array = StructArray::try_new(fields.clone(), child_arrays, Some(nulls))?;
    Ok(Arc::new(struct_array))
}

/// Build a map array from map values
fn build_map_array(values: &[Option<&Value>], entries: &Arc<Field>) -> Result<ArrayRef> {
    let DataType::Struct(entry_fields) = entries.data_type() else {
        return Err(Error::Other(format!(
            "map entries must be a struct, got {}",
            entries.data_type()
        )));
    };
    if entry_fields.len() != 2 {
        return Err(Error::Other("map entries must have a key and a value".to_string()));
    }

    let mut keys: Vec<&str> = Vec::new();
    let mut items: Vec<Option<&Value>> = Vec::new();
    let mut offsets: Vec<i32> = vec![0];
    let mut valid = Vec::with_capacity(values.len());

    for value in values {
        match value {
            Some(Value::Map(map)) => {
                for (k, v) in map {
                    keys.push(k);
                    items.push(Some(v).filter(|v| !v.is_null()));
                }
                valid.push(true);
            }
            Some(Value::Record(record)) => {
                for (k, v) in record.iter() {
                    keys.push(k);
                    items.push(Some(v).filter(|v| !v.is_null()));
                }
                valid.push(true);
            }
            _ => valid.push(false),
        }
        offsets.push(offset(keys.len())?);
    }

    let key_array: ArrayRef = Arc::new(StringArray::from(keys));
    let value_array = build_array(&items, entry_fields[1].data_type())?;
    let entry_array = StructArray::try_new(entry_fields.clone(), vec![key_array, value_array], None)?;

    let map_array = MapArray::try_new(
        Arc::clone(entries),
        OffsetBuffer::new(offsets.into()),
        entry_array,
        Some(NullBuffer::from(valid)),
        false,
    )?;
    Ok(Arc::new(map_array))
}

// ============================================================================
// Arrow -> Records
// ============================================================================

/// Convert a RecordBatch to records, one per row
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<Record>> {
    let schema = batch.schema();
    let mut records = Vec::with_capacity(batch.num_rows());

    for row in 0..batch.num_rows() {
        let mut record = Record::new();
        for (col_idx, field) in schema.fields().iter().enumerate() {
            let value = array_value(batch.column(col_idx).as_ref(), row)?;
            record.insert(field.name().clone(), value);
        }
        records.push(record);
    }

    Ok(records)
}

fn millis_to_value(millis: Option<i64>) -> Result<Value> {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .map(Value::Timestamp)
        .ok_or_else(|| Error::decode("timestamp out of range"))
}

/// Convert a single array element to a value
fn array_value(array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),

        DataType::Int8 => Value::Int(i32::from(array.as_primitive::<Int8Type>().value(row))),
        DataType::Int16 => Value::Int(i32::from(array.as_primitive::<Int16Type>().value(row))),
        DataType::Int32 => Value::Int(array.as_primitive::<Int32Type>().value(row)),
        DataType::UInt8 => Value::Int(i32::from(array.as_primitive::<UInt8Type>().value(row))),
        DataType::UInt16 => Value::Int(i32::from(array.as_primitive::<UInt16Type>().value(row))),
        DataType::Int64 => Value::Long(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt32 => Value::Long(i64::from(array.as_primitive::<UInt32Type>().value(row))),
        DataType::UInt64 => {
            // UInt64 might overflow i64
            let val = array.as_primitive::<UInt64Type>().value(row);
            i64::try_from(val).map_or_else(|_| Value::String(val.to_string()), Value::Long)
        }

        DataType::Float32 => Value::Double(f64::from(array.as_primitive::<Float32Type>().value(row))),
        DataType::Float64 => Value::Double(array.as_primitive::<Float64Type>().value(row)),

        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(row).to_string()),

        DataType::Timestamp(unit, _) => {
            let millis = match unit {
                TimeUnit::Second => array
                    .as_primitive::<TimestampSecondType>()
                    .value(row)
                    .checked_mul(1000),
                TimeUnit::Millisecond => {
                    Some(array.as_primitive::<TimestampMillisecondType>().value(row))
                }
                TimeUnit::Microsecond => {
                    Some(array.as_primitive::<TimestampMicrosecondType>().value(row) / 1000)
                }
                TimeUnit::Nanosecond => {
                    Some(array.as_primitive::<TimestampNanosecondType>().value(row) / 1_000_000)
                }
            };
            millis_to_value(millis)?
        }
        DataType::Date32 => {
            let days = i64::from(array.as_primitive::<Date32Type>().value(row));
            millis_to_value(days.checked_mul(86_400_000))?
        }

        DataType::List(_) => list_values(array.as_list::<i32>().value(row).as_ref())?,
        DataType::LargeList(_) => list_values(array.as_list::<i64>().value(row).as_ref())?,

        DataType::Struct(_) => {
            let arr = array.as_struct();
            let mut record = Record::new();
            for (i, field) in arr.fields().iter().enumerate() {
                record.insert(field.name().clone(), array_value(arr.column(i).as_ref(), row)?);
            }
            Value::Record(record)
        }

        DataType::Map(_, _) => {
            let entries = array.as_map().value(row);
            let mut map = IndexMap::with_capacity(entries.len());
            for i in 0..entries.len() {
                let key = array_value(entries.column(0).as_ref(), i)?.to_string();
                map.insert(key, array_value(entries.column(1).as_ref(), i)?);
            }
            Value::Map(map)
        }

        other => return Err(Error::decode(format!("unsupported column type {other}"))),
    };
    Ok(value)
}

fn list_values(values: &dyn Array) -> Result<Value> {
    (0..values.len())
        .map(|i| array_value(values, i))
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}
