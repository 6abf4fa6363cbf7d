//! Per-batch schema resolution
//!
//! The output and error schemas of a batch are resolved lazily from the
//! first record that needs them and never change afterwards. Under the
//! async executor several tasks may race to resolve first; `OnceCell`
//! makes exactly one of them win and everyone else observe its result.

use super::inference::{merge_schemas, SchemaInferrer};
use super::types::{MergeStrategy, Schema};
use crate::error::Result;
use crate::value::Record;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Resolve an output schema from a sample input/output pair
pub fn resolve(
    sample_input: &Record,
    sample_output: &Record,
    strategy: MergeStrategy,
) -> Result<Schema> {
    let inferrer = SchemaInferrer::new();
    let output = inferrer.infer_record(sample_output)?;
    match strategy {
        MergeStrategy::OutputOnly => Ok(output),
        MergeStrategy::InputAndOutput => {
            let input = inferrer.infer_record(sample_input)?;
            Ok(merge_schemas(&input, &output, strategy))
        }
    }
}

/// Memoized schema state for one batch
#[derive(Debug)]
pub struct SchemaResolver {
    strategy: MergeStrategy,
    /// Output schema from an explicit example document
    example: Option<Schema>,
    inferrer: SchemaInferrer,
    input: OnceCell<Arc<Schema>>,
    output: OnceCell<Arc<Schema>>,
    error: OnceCell<Arc<Schema>>,
}

impl SchemaResolver {
    /// Create a resolver that infers the output schema from records
    pub fn new(strategy: MergeStrategy) -> Self {
        Self {
            strategy,
            example: None,
            inferrer: SchemaInferrer::new(),
            input: OnceCell::new(),
            output: OnceCell::new(),
            error: OnceCell::new(),
        }
    }

    /// Use an explicit output schema (from an example document) instead of
    /// inferring one from the first output record
    #[must_use]
    pub fn with_example(mut self, example: Schema) -> Self {
        self.example = Some(example);
        self
    }

    /// Use a custom inferrer
    #[must_use]
    pub fn with_inferrer(mut self, inferrer: SchemaInferrer) -> Self {
        self.inferrer = inferrer;
        self
    }

    /// Merge strategy in effect
    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Seed the input schema with a source's embedded schema. Returns
    /// `false` if an input schema was already established.
    pub fn seed_input(&self, schema: Schema) -> bool {
        self.input.set(Arc::new(schema)).is_ok()
    }

    /// Input schema, inferred from `sample` unless already established
    pub fn input_schema(&self, sample: &Record) -> Result<Arc<Schema>> {
        self.input
            .get_or_try_init(|| self.inferrer.infer_record(sample).map(Arc::new))
            .cloned()
    }

    /// Output schema, resolved once from the first (input, output) pair
    pub fn output_schema(&self, sample_input: &Record, sample_output: &Record) -> Result<Arc<Schema>> {
        self.output
            .get_or_try_init(|| -> Result<Arc<Schema>> {
                let output = match &self.example {
                    Some(example) => example.clone(),
                    None => self.inferrer.infer_record(sample_output)?,
                };
                let schema = match self.strategy {
                    MergeStrategy::OutputOnly => output,
                    MergeStrategy::InputAndOutput => {
                        let input = self.input_schema(sample_input)?;
                        merge_schemas(&input, &output, self.strategy)
                    }
                };
                tracing::debug!(schema = %schema, strategy = ?self.strategy, "Resolved output schema");
                Ok(Arc::new(schema))
            })
            .cloned()
    }

    /// Error-record schema: the input schema plus the error fields
    pub fn error_schema(&self, sample_input: &Record) -> Result<Arc<Schema>> {
        self.error
            .get_or_try_init(|| -> Result<Arc<Schema>> {
                let input = self.input_schema(sample_input)?;
                Ok(Arc::new(input.with_error_fields()))
            })
            .cloned()
    }

    /// The output schema, if it has been resolved
    pub fn resolved_output(&self) -> Option<Arc<Schema>> {
        self.output.get().cloned()
    }
}
