//! In-process job queue.
//!
//! Used in tests and when no database is configured. Jobs do not survive a
//! restart, otherwise the delivery and retry rules match [`PostgresJobQueue`].
//!
//! Live jobs are dropped as soon as they succeed or dead-letter. Only a bounded
//! history of finished jobs is kept for inspection.
//!
//! [`PostgresJobQueue`]: super::PostgresJobQueue

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tracing::debug;
use uuid::Uuid;

use super::job::{ErrorKind, FailureTransition, Job, JobStatus, NewJob, QueueName};
use super::queue::{ClaimedJob, EnqueueInfo, JobQueue};

/// Finished jobs kept for inspection, oldest evicted first
const DEFAULT_HISTORY_LIMIT: usize = 1_000;

#[derive(Default)]
struct State {
    /// Pending and running jobs
    jobs: HashMap<Uuid, Job>,
    /// Recently succeeded or dead-lettered jobs
    finished: VecDeque<Job>,
    /// Ready job ids per class, oldest first
    ready: HashMap<QueueName, VecDeque<Uuid>>,
    /// Pending jobs waiting for their `run_at`
    delayed: Vec<Uuid>,
}

impl State {
    fn finish(&mut self, job: Job, history_limit: usize) {
        if history_limit == 0 {
            return;
        }
        while self.finished.len() >= history_limit {
            self.finished.pop_front();
        }
        self.finished.push_back(job);
    }

    fn push_ready(&mut self, queue: QueueName, job_id: Uuid) {
        self.ready.entry(queue).or_default().push_back(job_id);
    }

    /// Move delayed jobs whose time has come onto their ready lists.
    fn promote_due(&mut self) {
        let now = Utc::now();
        let jobs = &self.jobs;
        let (due, waiting): (Vec<Uuid>, Vec<Uuid>) = std::mem::take(&mut self.delayed)
            .into_iter()
            .partition(|id| jobs.get(id).map_or(true, |job| job.run_at <= now));
        self.delayed = waiting;

        for id in due {
            if let Some(queue) = self.jobs.get(&id).map(|job| job.queue) {
                self.push_ready(queue, id);
            }
        }
    }
}

pub struct InMemoryJobQueue {
    state: Mutex<State>,
    notify: Notify,
    backoff_base: Duration,
    history_limit: usize,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::with_backoff(Duration::from_secs(1))
    }

    /// Create with a custom retry backoff base (zero retries immediately).
    pub fn with_backoff(backoff_base: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            backoff_base,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Cap the number of finished jobs kept for inspection.
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    /// Snapshot of a live or recently finished job by id.
    pub async fn job(&self, job_id: Uuid) -> Option<Job> {
        let state = self.state.lock().await;
        state.jobs.get(&job_id).cloned().or_else(|| {
            state
                .finished
                .iter()
                .rev()
                .find(|job| job.id == job_id)
                .cloned()
        })
    }

    /// Pending and running jobs, oldest first.
    pub async fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.state.lock().await.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Live and recently finished jobs in `status`, oldest first.
    pub async fn jobs_with_status(&self, status: JobStatus) -> Vec<Job> {
        let state = self.state.lock().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .chain(state.finished.iter())
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    pub async fn dead_letters(&self) -> Vec<Job> {
        self.jobs_with_status(JobStatus::DeadLetter).await
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, new_job: NewJob) -> Result<EnqueueInfo> {
        let job = Job::from_new(new_job, Utc::now());
        let info = EnqueueInfo {
            job_id: job.id,
            queue: job.queue,
            max_retries: job.max_retries,
        };

        {
            let mut state = self.state.lock().await;
            state.push_ready(job.queue, job.id);
            state.jobs.insert(job.id, job);
        }

        self.notify.notify_one();
        Ok(info)
    }

    async fn claim(&self, worker_id: &str, queues: &[QueueName]) -> Result<Option<ClaimedJob>> {
        let mut state = self.state.lock().await;
        state.promote_due();

        for queue in queues {
            let Some(job_id) = state.ready.get_mut(queue).and_then(VecDeque::pop_front) else {
                continue;
            };
            let Some(job) = state.jobs.get_mut(&job_id) else {
                continue;
            };

            job.status = JobStatus::Running;
            job.worker_id = Some(worker_id.to_string());
            job.updated_at = Utc::now();
            return Ok(Some(ClaimedJob::from(job.clone())));
        }

        Ok(None)
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut job = state
            .jobs
            .remove(&job_id)
            .ok_or_else(|| anyhow!("job {} not found", job_id))?;

        job.status = JobStatus::Succeeded;
        job.worker_id = None;
        job.updated_at = Utc::now();
        state.finish(job, self.history_limit);
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| anyhow!("job {} not found", job_id))?;

        job.error_message = Some(error.to_string());
        job.error_kind = Some(kind);
        job.worker_id = None;
        job.updated_at = now;

        match job.failure_transition(kind, now, self.backoff_base) {
            FailureTransition::Requeue {
                run_at,
                retry_count,
            } => {
                job.status = JobStatus::Pending;
                job.run_at = run_at;
                job.retry_count = retry_count;
                let queue = job.queue;

                if kind == ErrorKind::Shutdown {
                    state.ready.entry(queue).or_default().push_front(job_id);
                    drop(state);
                    self.notify.notify_one();
                } else if run_at <= now {
                    state.push_ready(queue, job_id);
                    drop(state);
                    self.notify.notify_one();
                } else {
                    state.delayed.push(job_id);
                }
                debug!(job_id = %job_id, run_at = %run_at, "job requeued");
            }
            FailureTransition::DeadLetter => {
                job.status = JobStatus::DeadLetter;
                job.dead_lettered_at = Some(now);
                if let Some(job) = state.jobs.remove(&job_id) {
                    state.finish(job, self.history_limit);
                }
                debug!(job_id = %job_id, "job dead-lettered");
            }
        }

        Ok(())
    }

    async fn wait_for_jobs(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job(job_type: &str, queue: QueueName, max_retries: i32) -> NewJob {
        NewJob::builder()
            .job_type(job_type)
            .payload(b"{}".to_vec())
            .queue(queue)
            .max_retries(max_retries)
            .build()
    }

    #[tokio::test]
    async fn test_enqueue_then_claim_fifo() {
        let queue = InMemoryJobQueue::with_backoff(Duration::ZERO);
        let first = queue.enqueue(new_job("a", QueueName::Default, 3)).await.unwrap();
        let second = queue.enqueue(new_job("b", QueueName::Default, 3)).await.unwrap();

        let claimed = queue.claim("w1", &[QueueName::Default]).await.unwrap().unwrap();
        assert_eq!(claimed.id, first.job_id);
        let claimed = queue.claim("w1", &[QueueName::Default]).await.unwrap().unwrap();
        assert_eq!(claimed.id, second.job_id);
        assert!(queue.claim("w1", &[QueueName::Default]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claimed_job_is_exclusive() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(new_job("a", QueueName::Default, 3)).await.unwrap();

        assert!(queue.claim("w1", &[QueueName::Default]).await.unwrap().is_some());
        assert!(queue.claim("w2", &[QueueName::Default]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_prefers_listed_order() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(new_job("low", QueueName::Default, 3)).await.unwrap();
        queue.enqueue(new_job("high", QueueName::Critical, 3)).await.unwrap();

        let claimed = queue
            .claim("w1", &[QueueName::Critical, QueueName::Default])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.job_type, "high");

        // A default-only worker never sees critical work
        let queue = InMemoryJobQueue::new();
        queue.enqueue(new_job("high", QueueName::Critical, 3)).await.unwrap();
        assert!(queue.claim("w2", &[QueueName::Default]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retry_increments_attempt_until_dead_letter() {
        let queue = InMemoryJobQueue::with_backoff(Duration::ZERO);
        let info = queue.enqueue(new_job("a", QueueName::Default, 2)).await.unwrap();

        for expected_attempt in 1..=3 {
            let claimed = queue.claim("w1", &[QueueName::Default]).await.unwrap().unwrap();
            assert_eq!(claimed.attempt, expected_attempt);
            queue
                .mark_failed(claimed.id, "smtp down", ErrorKind::Retryable)
                .await
                .unwrap();
        }

        assert!(queue.claim("w1", &[QueueName::Default]).await.unwrap().is_none());
        let job = queue.job(info.job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::DeadLetter);
        assert_eq!(job.error_message.as_deref(), Some("smtp down"));
    }

    #[tokio::test]
    async fn test_non_retryable_is_never_redelivered() {
        let queue = InMemoryJobQueue::with_backoff(Duration::ZERO);
        queue.enqueue(new_job("a", QueueName::Default, 3)).await.unwrap();

        let claimed = queue.claim("w1", &[QueueName::Default]).await.unwrap().unwrap();
        queue
            .mark_failed(claimed.id, "bad payload", ErrorKind::NonRetryable)
            .await
            .unwrap();

        assert!(queue.claim("w1", &[QueueName::Default]).await.unwrap().is_none());
        assert_eq!(queue.dead_letters().await.len(), 1);
    }

    #[tokio::test]
    async fn test_backoff_delays_redelivery() {
        let queue = InMemoryJobQueue::with_backoff(Duration::from_secs(60));
        queue.enqueue(new_job("a", QueueName::Default, 3)).await.unwrap();

        let claimed = queue.claim("w1", &[QueueName::Default]).await.unwrap().unwrap();
        queue
            .mark_failed(claimed.id, "timeout", ErrorKind::Retryable)
            .await
            .unwrap();

        assert!(queue.claim("w1", &[QueueName::Default]).await.unwrap().is_none());
        let job = queue.job(claimed.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 1);
    }

    #[tokio::test]
    async fn test_shutdown_requeues_at_front_of_line() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(new_job("a", QueueName::Default, 0)).await.unwrap();

        let claimed = queue.claim("w1", &[QueueName::Default]).await.unwrap().unwrap();
        queue
            .mark_failed(claimed.id, "shutting down", ErrorKind::Shutdown)
            .await
            .unwrap();

        let again = queue.claim("w2", &[QueueName::Default]).await.unwrap().unwrap();
        assert_eq!(again.id, claimed.id);
        assert_eq!(again.attempt, 1);
    }

    #[tokio::test]
    async fn test_finished_jobs_are_released() {
        let queue = InMemoryJobQueue::with_backoff(Duration::ZERO).with_history_limit(10);

        for _ in 0..1_000 {
            queue.enqueue(new_job("a", QueueName::Default, 0)).await.unwrap();
            let claimed = queue.claim("w1", &[QueueName::Default]).await.unwrap().unwrap();
            queue.mark_succeeded(claimed.id).await.unwrap();
        }
        for _ in 0..20 {
            queue.enqueue(new_job("b", QueueName::Default, 0)).await.unwrap();
            let claimed = queue.claim("w1", &[QueueName::Default]).await.unwrap().unwrap();
            queue
                .mark_failed(claimed.id, "bad payload", ErrorKind::NonRetryable)
                .await
                .unwrap();
        }

        assert!(queue.jobs().await.is_empty());
        assert_eq!(queue.state.lock().await.finished.len(), 10);
        assert_eq!(queue.dead_letters().await.len(), 10);
        assert!(queue.jobs_with_status(JobStatus::Succeeded).await.is_empty());
    }

    #[tokio::test]
    async fn test_mark_unknown_job_errors() {
        let queue = InMemoryJobQueue::new();
        assert!(queue.mark_succeeded(Uuid::new_v4()).await.is_err());
    }
}
