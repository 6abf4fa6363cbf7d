//! Concurrent executor
//!
//! Every record becomes its own tokio task. A task waits for a slot on
//! the concurrency semaphore, then runs the (blocking) handler on the
//! blocking pool under the per-record timeout. Results are collected in
//! submission order, so a slow record holds back the ones behind it but
//! never lets them overtake it.

use super::context::BatchContext;
use crate::error::Result;
use crate::handler::{RecordProcessor, Routed};
use crate::source::RecordSource;
use crate::types::{Attributes, ThresholdPolicy};
use crate::value::Record;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Final state of one submitted record
#[derive(Debug)]
pub enum TaskOutcome {
    /// The handler returned; `Err` is fatal for the batch
    Completed(Result<Routed>),
    /// The handler did not return within the timeout
    TimedOut,
    /// The handler panicked
    Panicked(String),
}

/// Runs records concurrently with a per-record timeout
#[derive(Debug, Clone)]
pub struct AsyncExecutor {
    processor: RecordProcessor,
    timeout: Duration,
    max_concurrency: usize,
    max_error_count: usize,
    policy: ThresholdPolicy,
}

impl AsyncExecutor {
    /// Create an executor with default limits
    pub fn new(processor: RecordProcessor) -> Self {
        Self {
            processor,
            timeout: Duration::from_secs(5),
            max_concurrency: 16,
            max_error_count: 10,
            policy: ThresholdPolicy::default(),
        }
    }

    /// Set the per-record timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of handler calls allowed to run at once
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Set the error threshold and what happens when it is reached
    #[must_use]
    pub fn with_error_threshold(mut self, max: usize, policy: ThresholdPolicy) -> Self {
        self.max_error_count = max;
        self.policy = policy;
        self
    }

    /// Submit every record of the source, then collect in submission order
    pub async fn execute(&self, source: &mut dyn RecordSource, ctx: &BatchContext) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let attributes = Arc::new(ctx.attributes().clone());
        let mut pending: VecDeque<(Record, JoinHandle<TaskOutcome>)> = VecDeque::new();

        loop {
            let record = match source.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    abort_pending(pending);
                    return Err(e);
                }
            };
            if let Err(e) = ctx.accept(&record) {
                abort_pending(pending);
                return Err(e);
            }
            let handle = self.spawn(record.clone(), Arc::clone(&semaphore), Arc::clone(&attributes));
            pending.push_back((record, handle));
        }

        tracing::debug!(
            tasks = pending.len(),
            max_concurrency = self.max_concurrency,
            timeout_ms = self.timeout.as_millis() as u64,
            "Submitted records"
        );

        while let Some((input, handle)) = pending.pop_front() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => TaskOutcome::Panicked(e.to_string()),
            };
            if let Err(e) = self.collect(input, outcome, ctx) {
                abort_pending(pending);
                return Err(e);
            }
        }
        Ok(())
    }

    fn spawn(
        &self,
        record: Record,
        semaphore: Arc<Semaphore>,
        attributes: Arc<Attributes>,
    ) -> JoinHandle<TaskOutcome> {
        let processor = self.processor.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            // The semaphore is never closed
            let _permit = semaphore.acquire_owned().await.ok();
            let work = tokio::task::spawn_blocking(move || processor.process(&attributes, record));
            match tokio::time::timeout(timeout, work).await {
                Err(_) => TaskOutcome::TimedOut,
                Ok(Ok(result)) => TaskOutcome::Completed(result),
                Ok(Err(e)) if e.is_panic() => TaskOutcome::Panicked(panic_message(e.into_panic())),
                Ok(Err(e)) => TaskOutcome::Panicked(e.to_string()),
            }
        })
    }

    fn collect(&self, input: Record, outcome: TaskOutcome, ctx: &BatchContext) -> Result<()> {
        match outcome {
            TaskOutcome::Completed(result) => ctx.deliver(result?),
            TaskOutcome::TimedOut => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Handler timed out, routing record to retry"
                );
                ctx.update_stats(|s| s.add_timeout());
                ctx.deliver(Routed::timed_out(input))?;
                ctx.record_error(self.max_error_count, self.policy)
            }
            TaskOutcome::Panicked(message) => {
                tracing::warn!(error = %message, "Handler panicked, routing record to failure");
                ctx.update_stats(|s| s.add_panic());
                ctx.deliver(Routed::failure(input, format!("handler panicked: {message}")))?;
                ctx.record_error(self.max_error_count, self.policy)
            }
        }
    }
}

fn abort_pending(pending: VecDeque<(Record, JoinHandle<TaskOutcome>)>) {
    for (_, handle) in pending {
        handle.abort();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
