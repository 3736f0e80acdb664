//! Job queue abstraction.
//!
//! The queue owns a job from enqueue until a worker reports a terminal outcome.
//! Delivery is at-least-once, and a claimed job belongs to exactly one worker
//! until it is marked succeeded or failed.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use super::job::{ErrorKind, Job, NewJob, QueueName};

/// What the queue reports back after accepting a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueInfo {
    pub job_id: Uuid,
    pub queue: QueueName,
    pub max_retries: i32,
}

/// A claimed job ready for execution.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: Vec<u8>,
    pub queue: QueueName,
    /// 1-based; first retry is attempt 2
    pub attempt: i32,
    pub max_retries: i32,
}

impl ClaimedJob {
    /// Deserialize the JSON command payload.
    pub fn deserialize<C: DeserializeOwned>(&self) -> serde_json::Result<C> {
        serde_json::from_slice(&self.payload)
    }
}

impl From<Job> for ClaimedJob {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            attempt: job.attempt(),
            job_type: job.job_type,
            payload: job.payload,
            queue: job.queue,
            max_retries: job.max_retries,
        }
    }
}

/// Metadata for command serialization.
///
/// Commands implement this to tell the queue how to file them.
pub trait CommandMeta {
    /// The command type name (used as job_type).
    fn command_type(&self) -> &'static str;

    /// Priority class to enqueue on.
    fn queue(&self) -> QueueName {
        QueueName::Default
    }

    /// Maximum retries for this command.
    fn max_retries(&self) -> i32 {
        3
    }
}

impl NewJob {
    /// Serialize `command` to JSON and file it according to its [`CommandMeta`].
    pub fn for_command<C>(command: &C) -> serde_json::Result<Self>
    where
        C: Serialize + CommandMeta,
    {
        Ok(NewJob::builder()
            .job_type(command.command_type())
            .payload(serde_json::to_vec(command)?)
            .queue(command.queue())
            .max_retries(command.max_retries())
            .build())
    }
}

/// Trait for job queue operations.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Durably store a job for immediate execution.
    async fn enqueue(&self, job: NewJob) -> Result<EnqueueInfo>;

    /// Claim the next ready job, trying `queues` in order of preference.
    ///
    /// Returns `None` when none of the listed classes has ready work.
    async fn claim(&self, worker_id: &str, queues: &[QueueName]) -> Result<Option<ClaimedJob>>;

    /// Mark a job as successfully completed.
    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()>;

    /// Mark a job as failed with an error.
    ///
    /// Retryable failures are re-queued with backoff while retries remain;
    /// everything else is dead-lettered.
    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()>;

    /// Park an idle worker until new work may be available or `timeout` passes.
    async fn wait_for_jobs(&self, timeout: Duration) {
        tokio::time::sleep(timeout).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct PingCommand {
        message: String,
    }

    impl CommandMeta for PingCommand {
        fn command_type(&self) -> &'static str {
            "ping"
        }

        fn queue(&self) -> QueueName {
            QueueName::Critical
        }
    }

    #[test]
    fn test_for_command_uses_meta() {
        let job = NewJob::for_command(&PingCommand {
            message: "hello".to_string(),
        })
        .unwrap();

        assert_eq!(job.job_type, "ping");
        assert_eq!(job.queue, QueueName::Critical);
        assert_eq!(job.max_retries, 3);
        assert_eq!(job.payload, br#"{"message":"hello"}"#.to_vec());
    }

    #[test]
    fn test_claimed_job_deserialize() {
        let job = Job::from_new(
            NewJob::for_command(&PingCommand {
                message: "hello".to_string(),
            })
            .unwrap(),
            chrono::Utc::now(),
        );
        let claimed = ClaimedJob::from(job);

        assert_eq!(claimed.attempt, 1);
        let cmd: PingCommand = claimed.deserialize().unwrap();
        assert_eq!(cmd.message, "hello");
    }
}
