//! Job worker loop.
//!
//! A `JobWorker` owns at most one job at a time:
//!
//! ```text
//! JobWorker
//!     │
//!     ├─► Claim one job (JobQueue.claim, in class preference order)
//!     ├─► Look up the handler by job type (HandlerRegistry)
//!     ├─► Run it under the per-job timeout, racing shutdown
//!     └─► Report the outcome (mark_succeeded / mark_failed)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::handler::HandlerRegistry;
use super::job::{ErrorKind, QueueName};
use super::queue::{ClaimedJob, JobQueue};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// Worker ID for this instance
    pub worker_id: String,
    /// Classes to claim from, most preferred first
    pub queues: Vec<QueueName>,
    /// How long to park when no jobs are available
    pub poll_interval: Duration,
    /// Upper bound on a single handler invocation
    pub job_timeout: Duration,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", Uuid::new_v4()),
            queues: vec![QueueName::Default],
            poll_interval: Duration::from_millis(500),
            job_timeout: Duration::from_secs(300),
        }
    }
}

impl JobWorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

/// Why an attempt did not succeed.
struct AttemptFailure {
    kind: ErrorKind,
    message: String,
}

pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    handlers: Arc<HandlerRegistry>,
    config: JobWorkerConfig,
}

impl JobWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        handlers: Arc<HandlerRegistry>,
        config: JobWorkerConfig,
    ) -> Self {
        Self {
            queue,
            handlers,
            config,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Claim and process jobs until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        debug!(
            worker_id = %self.config.worker_id,
            queues = ?self.config.queues,
            "job worker starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.run_once(&shutdown).await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = self.queue.wait_for_jobs(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!(worker_id = %self.config.worker_id, error = %e, "failed to claim job");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }

        debug!(worker_id = %self.config.worker_id, "job worker stopped");
    }

    /// Claim and process at most one job. Returns whether a job was claimed.
    pub async fn run_once(&self, shutdown: &CancellationToken) -> anyhow::Result<bool> {
        let Some(job) = self
            .queue
            .claim(&self.config.worker_id, &self.config.queues)
            .await?
        else {
            return Ok(false);
        };

        self.process_job(job, shutdown).await;
        Ok(true)
    }

    /// Process a single claimed job and report its outcome to the queue.
    async fn process_job(&self, job: ClaimedJob, shutdown: &CancellationToken) {
        match self.execute(&job, shutdown).await {
            Ok(()) => {
                debug!(job_id = %job.id, job_type = %job.job_type, attempt = job.attempt, "job succeeded");
                if let Err(e) = self.queue.mark_succeeded(job.id).await {
                    error!(job_id = %job.id, error = %e, "failed to mark job as succeeded");
                }
            }
            Err(failure) => {
                if failure.kind == ErrorKind::Shutdown {
                    info!(job_id = %job.id, job_type = %job.job_type, "job interrupted by shutdown");
                } else {
                    warn!(
                        job_id = %job.id,
                        job_type = %job.job_type,
                        payload_bytes = job.payload.len(),
                        attempt = job.attempt,
                        max_retries = job.max_retries,
                        error_kind = ?failure.kind,
                        error = %failure.message,
                        "process task failed"
                    );
                }

                if let Err(e) = self
                    .queue
                    .mark_failed(job.id, &failure.message, failure.kind)
                    .await
                {
                    error!(job_id = %job.id, error = %e, "failed to mark job as failed");
                }
            }
        }
    }

    async fn execute(
        &self,
        job: &ClaimedJob,
        shutdown: &CancellationToken,
    ) -> Result<(), AttemptFailure> {
        let Some(handler) = self.handlers.get(&job.job_type) else {
            return Err(AttemptFailure {
                kind: ErrorKind::NonRetryable,
                message: format!("unknown job type: {}", job.job_type),
            });
        };

        let job_cancel = shutdown.child_token();
        let timeout = self.config.job_timeout;

        tokio::select! {
            biased;

            result = tokio::time::timeout(timeout, handler.handle(job)) => match result {
                Err(_) => Err(AttemptFailure {
                    kind: ErrorKind::Retryable,
                    message: format!("job timed out after {}s", timeout.as_secs()),
                }),
                Ok(outcome) => match (outcome.error_kind(), outcome.error()) {
                    (Some(kind), Some(cause)) => Err(AttemptFailure {
                        kind,
                        message: format!("{cause:#}"),
                    }),
                    _ => Ok(()),
                },
            },
            _ = job_cancel.cancelled() => Err(AttemptFailure {
                kind: ErrorKind::Shutdown,
                message: "interrupted by shutdown".to_string(),
            }),
        }
    }
}
