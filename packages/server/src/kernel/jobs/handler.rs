//! Job handlers and the registry that dispatches to them by job type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::job::ErrorKind;
use super::queue::ClaimedJob;

/// Result of one handler attempt.
#[derive(Debug)]
pub enum JobOutcome {
    Success,
    /// Transient failure; the queue may deliver the job again
    Retry(anyhow::Error),
    /// Terminal failure; the job goes straight to the dead-letter set
    SkipRetry(anyhow::Error),
}

impl JobOutcome {
    pub fn retry(cause: impl Into<anyhow::Error>) -> Self {
        JobOutcome::Retry(cause.into())
    }

    pub fn skip_retry(cause: impl Into<anyhow::Error>) -> Self {
        JobOutcome::SkipRetry(cause.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }

    /// How the queue should file this outcome, `None` on success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            JobOutcome::Success => None,
            JobOutcome::Retry(_) => Some(ErrorKind::Retryable),
            JobOutcome::SkipRetry(_) => Some(ErrorKind::NonRetryable),
        }
    }

    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            JobOutcome::Success => None,
            JobOutcome::Retry(e) | JobOutcome::SkipRetry(e) => Some(e),
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Success => f.write_str("success"),
            JobOutcome::Retry(e) => write!(f, "retry: {e:#}"),
            JobOutcome::SkipRetry(e) => write!(f, "skip retry: {e:#}"),
        }
    }
}

/// Executes one job type.
///
/// Handlers must be reentrant: many workers call the same handler concurrently.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &ClaimedJob) -> JobOutcome;
}

/// Maps job type tags to their handlers.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `job_type`.
    ///
    /// # Panics
    ///
    /// Panics if `job_type` already has a handler. Registration happens once at
    /// startup, so a duplicate is a wiring bug.
    pub fn register(&mut self, job_type: &'static str, handler: Arc<dyn JobHandler>) {
        if self.handlers.insert(job_type, handler).is_some() {
            panic!("job handler already registered for {job_type}");
        }
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn has(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("job_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
