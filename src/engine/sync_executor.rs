//! Sequential executor

use super::context::BatchContext;
use crate::error::Result;
use crate::handler::RecordProcessor;
use crate::source::RecordSource;

/// Runs records one at a time, in source order, on the calling task
#[derive(Debug)]
pub struct SyncExecutor<'a> {
    processor: &'a RecordProcessor,
}

impl<'a> SyncExecutor<'a> {
    /// Create an executor
    pub fn new(processor: &'a RecordProcessor) -> Self {
        Self { processor }
    }

    /// Drain the source through the processor
    pub fn execute(&self, source: &mut dyn RecordSource, ctx: &BatchContext) -> Result<()> {
        while let Some(record) = source.next_record()? {
            ctx.accept(&record)?;
            let routed = self.processor.process(ctx.attributes(), record)?;
            ctx.deliver(routed)?;
        }
        Ok(())
    }
}
