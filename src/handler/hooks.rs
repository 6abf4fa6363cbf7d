//! Build-input / build-output hooks and per-record classification

use super::types::{Handler, InputContext, Routed};
use crate::error::{Error, HandlerError, Result};
use crate::types::{Attributes, Outcome};
use crate::value::Record;
use std::fmt;
use std::sync::Arc;

/// Mutable view a [`Transform`] operates on
#[derive(Debug, Clone, PartialEq)]
pub struct TransformContext {
    /// Batch attributes
    pub attributes: Attributes,
    /// Input record
    pub input: Record,
    /// Output record; `None` while building the input
    pub output: Option<Record>,
}

impl TransformContext {
    /// Context for a build-input hook
    pub fn for_input(attributes: Attributes, input: Record) -> Self {
        Self {
            attributes,
            input,
            output: None,
        }
    }

    /// Context for a build-output hook
    pub fn for_output(attributes: Attributes, input: Record, output: Record) -> Self {
        Self {
            attributes,
            input,
            output: Some(output),
        }
    }

    /// The record a transform writes to: the output when present,
    /// otherwise the input
    pub fn target_mut(&mut self) -> &mut Record {
        match &mut self.output {
            Some(output) => output,
            None => &mut self.input,
        }
    }
}

/// A record transformation prepared once and applied per record
pub trait Transform: Send + Sync {
    /// Apply to one record's context in place
    fn apply(&self, ctx: &mut TransformContext) -> anyhow::Result<()>;

    /// Name used in logs
    fn name(&self) -> &str {
        "transform"
    }
}

impl<F> Transform for F
where
    F: Fn(&mut TransformContext) -> anyhow::Result<()> + Send + Sync,
{
    fn apply(&self, ctx: &mut TransformContext) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Optional transforms around the handler call
#[derive(Clone, Default)]
pub struct Hooks {
    /// Runs before the handler, may rewrite the input
    pub build_input: Option<Arc<dyn Transform>>,
    /// Runs after the handler, may rewrite the output
    pub build_output: Option<Arc<dyn Transform>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("build_input", &self.build_input.as_ref().map(|t| t.name().to_string()))
            .field("build_output", &self.build_output.as_ref().map(|t| t.name().to_string()))
            .finish()
    }
}

impl Hooks {
    /// No hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the build-input transform
    #[must_use]
    pub fn with_build_input(mut self, transform: impl Transform + 'static) -> Self {
        self.build_input = Some(Arc::new(transform));
        self
    }

    /// Set the build-output transform
    #[must_use]
    pub fn with_build_output(mut self, transform: impl Transform + 'static) -> Self {
        self.build_output = Some(Arc::new(transform));
        self
    }

    /// Apply the build-input hook. A failing hook leaves the record as it was.
    pub fn build_input(&self, attributes: &Attributes, input: Record) -> Record {
        let Some(transform) = &self.build_input else {
            return input;
        };
        let mut ctx = TransformContext::for_input(attributes.clone(), input.clone());
        match transform.apply(&mut ctx) {
            Ok(()) => ctx.input,
            Err(e) => {
                tracing::debug!(hook = transform.name(), error = %e, "build_input hook failed, ignoring");
                input
            }
        }
    }

    /// Apply the build-output hook. A failing hook leaves the output as it was.
    pub fn build_output(&self, attributes: &Attributes, input: &Record, output: Record) -> Record {
        let Some(transform) = &self.build_output else {
            return output;
        };
        let mut ctx = TransformContext::for_output(attributes.clone(), input.clone(), output.clone());
        match transform.apply(&mut ctx) {
            Ok(()) => ctx.output.unwrap_or(output),
            Err(e) => {
                tracing::debug!(hook = transform.name(), error = %e, "build_output hook failed, ignoring");
                output
            }
        }
    }
}

/// A handler together with its hooks
///
/// `process` runs one record through build-input, the handler and
/// build-output, then classifies the result into a [`Routed`] decision.
/// Only a fatal handler error escapes as `Err`.
#[derive(Clone)]
pub struct RecordProcessor {
    handler: Arc<dyn Handler>,
    hooks: Hooks,
}

impl fmt::Debug for RecordProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordProcessor")
            .field("handler", &self.handler.name())
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl RecordProcessor {
    /// Wrap a handler with no hooks
    pub fn new(handler: impl Handler + 'static) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    /// Wrap a shared handler
    pub fn from_arc(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            hooks: Hooks::default(),
        }
    }

    /// Attach hooks
    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// The wrapped handler
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    /// The attached hooks
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Process one record
    pub fn process(&self, attributes: &Attributes, record: Record) -> Result<Routed> {
        let built = self.hooks.build_input(attributes, record.clone());
        let ctx = InputContext::new(attributes.clone(), built);

        match self.handler.process(&ctx) {
            Ok(output) => {
                let InputContext { record: input, .. } = ctx;
                let out = self.hooks.build_output(attributes, &input, output.record);
                tracing::debug!(handler = self.handler.name(), outcome = %output.outcome, "Record processed");
                Ok(Routed::completed(output.outcome, input, out))
            }
            Err(HandlerError::Business(message)) => {
                tracing::debug!(handler = self.handler.name(), error = %message, "Record failed");
                Ok(Routed::error(Outcome::Failure, record, message, ctx.at_time))
            }
            Err(HandlerError::Retryable(message)) => {
                tracing::debug!(handler = self.handler.name(), error = %message, "Record marked for retry");
                Ok(Routed::error(Outcome::Retry, record, message, ctx.at_time))
            }
            Err(HandlerError::Fatal(e)) => Err(Error::HandlerFatal(e)),
        }
    }
}
