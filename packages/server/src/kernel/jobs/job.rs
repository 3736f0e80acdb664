//! Job model for background command execution.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

/// Priority class a job is enqueued on. Each class has its own worker ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_queue", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Critical,
    #[default]
    Default,
}

impl QueueName {
    pub const ALL: [QueueName; 2] = [QueueName::Critical, QueueName::Default];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Critical => "critical",
            QueueName::Default => "default",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    DeadLetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "error_kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient error - will retry if attempts remain
    #[default]
    Retryable,
    /// Permanent error - will not retry
    NonRetryable,
    /// Job was interrupted by graceful shutdown - will retry
    Shutdown,
}

impl ErrorKind {
    /// Whether this error kind should trigger a retry
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable | ErrorKind::Shutdown)
    }

    /// Whether a retry of this kind counts against `max_retries`
    pub fn consumes_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable)
    }
}

// ============================================================================
// Job Model
// ============================================================================

/// What a producer hands to [`JobQueue::enqueue`](super::JobQueue::enqueue).
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewJob {
    pub job_type: String,
    pub payload: Vec<u8>,
    #[builder(default)]
    pub queue: QueueName,
    #[builder(default = 3)]
    pub max_retries: i32,
}

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: Vec<u8>,
    pub queue: QueueName,
    pub status: JobStatus,

    // Retry accounting
    pub retry_count: i32,
    pub max_retries: i32,
    pub run_at: DateTime<Utc>,

    // Lease management
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,

    // Error tracking
    pub error_message: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub dead_lettered_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a failed job goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureTransition {
    /// Back to pending, runnable at `run_at`
    Requeue {
        run_at: DateTime<Utc>,
        retry_count: i32,
    },
    DeadLetter,
}

impl Job {
    /// Create a pending job, runnable immediately.
    pub fn from_new(new: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: new.job_type,
            payload: new.payload,
            queue: new.queue,
            status: JobStatus::Pending,
            retry_count: 0,
            max_retries: new.max_retries,
            run_at: now,
            lease_expires_at: None,
            worker_id: None,
            error_message: None,
            error_kind: None,
            dead_lettered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 1-based attempt number of the current (or next) delivery.
    pub fn attempt(&self) -> i32 {
        self.retry_count + 1
    }

    /// Decide what a failure of `kind` does to this job.
    ///
    /// Retryable failures back off exponentially (`base * 2^retry_count`, max 1 hour)
    /// until `max_retries` is spent. Shutdown interruptions requeue immediately
    /// without spending a retry.
    pub fn failure_transition(
        &self,
        kind: ErrorKind,
        now: DateTime<Utc>,
        backoff_base: Duration,
    ) -> FailureTransition {
        match kind {
            ErrorKind::Shutdown => FailureTransition::Requeue {
                run_at: now,
                retry_count: self.retry_count,
            },
            ErrorKind::Retryable if self.retry_count < self.max_retries => {
                FailureTransition::Requeue {
                    run_at: now + backoff_delay(backoff_base, self.retry_count),
                    retry_count: self.retry_count + 1,
                }
            }
            _ => FailureTransition::DeadLetter,
        }
    }
}

const MAX_BACKOFF: Duration = Duration::from_secs(3600);

fn backoff_delay(base: Duration, retry_count: i32) -> chrono::Duration {
    let exponent = retry_count.clamp(0, 31) as u32;
    let delay = base
        .checked_mul(2u32.saturating_pow(exponent))
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF);
    chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::hours(1))
}
