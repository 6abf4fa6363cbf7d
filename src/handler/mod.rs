//! Per-record handler contract
//!
//! A [`Handler`] maps `(attributes, input record)` to an outcome and an
//! output record, or fails with a [`HandlerError`](crate::HandlerError):
//!
//! - `Business` routes an error record to `failure`
//! - `Retryable` routes an error record to `retry`
//! - `Fatal` aborts the batch
//!
//! [`Hooks`] run around the handler; their failures are logged and never
//! affect the record. [`RecordProcessor::process`] turns all of this into a
//! [`Routed`] decision for the multiplexer.

mod hooks;
mod template;
mod types;

pub use hooks::{Hooks, RecordProcessor, Transform, TransformContext};
pub use template::{extract_variables, has_templates, render, TemplateTransform};
pub use types::{
    FnHandler, Handler, HandlerOutput, InputContext, PassthroughHandler, Routed, SchemaKind,
};
