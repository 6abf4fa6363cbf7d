//! Handler contract types

use crate::error::HandlerError;
use crate::schema::{AT_TIME_FIELD, ERROR_MESSAGE_FIELD};
use crate::types::{Attributes, Outcome};
use crate::value::{Record, Value};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What a handler sees for one record
///
/// Every invocation gets its own copy of the batch attributes and of the
/// input record, so nothing a handler does can leak into another record.
#[derive(Debug, Clone, PartialEq)]
pub struct InputContext {
    /// Read-only batch attributes
    pub attributes: Attributes,
    /// The current input record
    pub record: Record,
    /// When processing of this record started
    pub at_time: DateTime<Utc>,
}

impl InputContext {
    /// Create a context stamped with the current time
    pub fn new(attributes: Attributes, record: Record) -> Self {
        Self {
            attributes,
            record,
            at_time: Utc::now(),
        }
    }

    /// Override the processing timestamp
    #[must_use]
    pub fn with_at_time(mut self, at_time: DateTime<Utc>) -> Self {
        self.at_time = at_time;
        self
    }

    /// Look up a batch attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Result of a successful handler call
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    /// Channel the record routes to
    pub outcome: Outcome,
    /// Output record
    pub record: Record,
}

impl HandlerOutput {
    /// Route to an explicit outcome
    pub fn new(outcome: impl Into<Outcome>, record: Record) -> Self {
        Self {
            outcome: outcome.into(),
            record,
        }
    }

    /// Route to `success`
    pub fn success(record: Record) -> Self {
        Self::new(Outcome::Success, record)
    }
}

/// Caller-supplied per-record business logic
///
/// Handlers are synchronous and may block. The async executor runs each
/// call on the blocking pool, so a slow driver or remote call does not
/// stall the runtime.
pub trait Handler: Send + Sync {
    /// Map one input record to an outcome and an output record
    fn process(&self, ctx: &InputContext) -> Result<HandlerOutput, HandlerError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "handler"
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn process(&self, ctx: &InputContext) -> Result<HandlerOutput, HandlerError> {
        (**self).process(ctx)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn process(&self, ctx: &InputContext) -> Result<HandlerOutput, HandlerError> {
        (**self).process(ctx)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Adapts a closure into a [`Handler`]
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&InputContext) -> Result<HandlerOutput, HandlerError> + Send + Sync,
{
    /// Wrap a closure
    pub fn new(func: F) -> Self {
        Self {
            name: "fn".to_string(),
            func,
        }
    }

    /// Set the name used in logs
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&InputContext) -> Result<HandlerOutput, HandlerError> + Send + Sync,
{
    fn process(&self, ctx: &InputContext) -> Result<HandlerOutput, HandlerError> {
        (self.func)(ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handler that routes every input to `success` unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughHandler;

impl Handler for PassthroughHandler {
    fn process(&self, ctx: &InputContext) -> Result<HandlerOutput, HandlerError> {
        Ok(HandlerOutput::success(ctx.record.clone()))
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

// ============================================================================
// Routing decisions
// ============================================================================

/// Which resolved schema an output unit is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// The batch output schema
    Output,
    /// The input schema extended with the error fields
    Error,
}

/// A classified record, ready for the multiplexer
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    /// Destination channel
    pub outcome: Outcome,
    /// Record the schemas are resolved from
    pub input: Record,
    /// Record to write: the raw handler output for [`SchemaKind::Output`],
    /// the finished error record for [`SchemaKind::Error`]
    pub record: Record,
    /// Schema the record is written against
    pub schema: SchemaKind,
}

impl Routed {
    /// A record the handler completed normally
    pub fn completed(outcome: Outcome, input: Record, output: Record) -> Self {
        Self {
            outcome,
            input,
            record: output,
            schema: SchemaKind::Output,
        }
    }

    /// An error record: the input fields followed by `errorMessage` and
    /// `atTime`
    pub fn error(
        outcome: Outcome,
        input: Record,
        message: impl Into<String>,
        at_time: DateTime<Utc>,
    ) -> Self {
        let record = input
            .clone()
            .with(ERROR_MESSAGE_FIELD, message.into())
            .with(AT_TIME_FIELD, at_time);
        Self {
            outcome,
            input,
            record,
            schema: SchemaKind::Error,
        }
    }

    /// Business failure routed to `failure`
    pub fn failure(input: Record, message: impl Into<String>) -> Self {
        Self::error(Outcome::Failure, input, message, Utc::now())
    }

    /// Transient failure routed to `retry`
    pub fn retry(input: Record, message: impl Into<String>) -> Self {
        Self::error(Outcome::Retry, input, message, Utc::now())
    }

    /// A record whose handler call never completed: routed to `retry`
    /// exactly as it came in, with no error fields of its own
    pub fn timed_out(input: Record) -> Self {
        Self {
            outcome: Outcome::Retry,
            record: input.clone(),
            input,
            schema: SchemaKind::Error,
        }
    }

    /// Error message carried by an error record, if any
    pub fn error_message(&self) -> Option<&str> {
        match self.schema {
            SchemaKind::Error => self.record.get(ERROR_MESSAGE_FIELD).and_then(Value::as_str),
            SchemaKind::Output => None,
        }
    }
}
