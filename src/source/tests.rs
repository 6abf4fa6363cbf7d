//! Tests for record sources

use super::*;
use crate::error::Error;
use crate::output::{create_writer, ParquetWriterConfig, RecordWriter};
use crate::schema::{FieldType, Schema, SchemaField};
use crate::types::{Outcome, RecordFormat};
use crate::value::{Record, Value};
use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_vec_source_yields_in_order() {
    let mut source = VecSource::new(vec![
        Record::new().with("id", 1),
        Record::new().with("id", 2),
    ]);
    assert_eq!(source.remaining(), 2);
    assert!(source.schema().is_none());

    let all = source.read_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].get("id"), Some(&Value::Int(1)));
    assert!(source.next_record().unwrap().is_none());
}

#[test]
fn test_json_array_source() {
    let mut source = JsonSource::from_bytes(br#"[{"id": 1}, {"id": 2, "x": "y"}]"#).unwrap();
    assert!(source.schema().is_none());
    let records = source.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].to_json(), json!({"id": 2, "x": "y"}));
}

#[test]
fn test_json_lines_source_skips_blank_lines() {
    let input = b"{\"id\": 1}\n\n{\"id\": 2}\n";
    let records = JsonSource::from_bytes(input).unwrap().read_all().unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn test_json_source_malformed_is_environment_error() {
    let err = JsonSource::from_bytes(b"{\"id\": 1}\n{oops").unwrap_err();
    assert!(matches!(err, Error::Environment { .. }));
    assert!(err.to_string().contains("line 2"));

    let err = JsonSource::from_bytes(b"[1, 2]").unwrap_err();
    assert!(matches!(err, Error::Environment { .. }));
}

#[test]
fn test_parquet_source_reads_embedded_schema() {
    let schema = Schema::new()
        .with_field(SchemaField::new("id", FieldType::Int))
        .with_field(SchemaField::nullable("name", FieldType::String))
        .with_field(SchemaField::nullable("tags", FieldType::array(FieldType::String)));

    let mut writer = create_writer(
        RecordFormat::Parquet,
        &Outcome::Success,
        &schema,
        &ParquetWriterConfig::default().with_batch_size(1),
    )
    .unwrap();
    writer
        .write(&Record::from_json(&json!({"id": 1, "name": "a", "tags": ["x"]})).unwrap())
        .unwrap();
    writer
        .write(&Record::from_json(&json!({"id": 2, "name": null, "tags": null})).unwrap())
        .unwrap();
    let content = writer.finish().unwrap().content;

    let mut source = open_source(RecordFormat::Parquet, content).unwrap();
    assert_eq!(source.schema(), Some(schema));

    let records = source.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].to_json(), json!({"id": 1, "name": "a", "tags": ["x"]}));
    assert_eq!(records[1].get("name"), Some(&Value::Null));
}

#[test]
fn test_parquet_source_rejects_garbage() {
    let result = open_source(RecordFormat::Parquet, Bytes::from_static(b"not parquet"));
    assert!(matches!(result, Err(Error::Environment { .. })));
}

#[test]
fn test_decode_records_json() {
    let records = decode_records(RecordFormat::Json, &Bytes::from_static(b"{\"a\":1}\n")).unwrap();
    assert_eq!(records, vec![Record::new().with("a", 1)]);
}
