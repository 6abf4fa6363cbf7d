//! Schema inference and resolution module
//!
//! Derives record schemas from example documents, embedded source schemas
//! or inference over sample records, and resolves the output schema of a
//! batch exactly once.
//!
//! # Features
//!
//! - **Type Inference**: Infers field types from record values
//! - **Schema Merging**: Output-only or input-and-output composition, output wins
//! - **Nullable Detection**: Null samples produce nullable string fields
//! - **Array Type Inference**: Element type from the first non-null element
//! - **Nested Record Support**: Handles nested records recursively
//! - **Conformance**: Coerces records onto a resolved schema

mod conform;
mod inference;
mod resolver;
mod types;

pub use inference::{infer_schema, merge_schemas, SchemaInferrer};
pub use resolver::{resolve, SchemaResolver};
pub use types::{
    FieldType, MergeStrategy, Schema, SchemaField, AT_TIME_FIELD, ERROR_MESSAGE_FIELD,
};
