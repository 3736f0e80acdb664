//! PostgreSQL-backed job queue implementation.
//!
//! Jobs survive restarts. Claiming uses `FOR UPDATE SKIP LOCKED` so concurrent
//! workers never receive the same row, and a running job carries a lease: if its
//! worker dies, the job becomes claimable again once the lease expires. Each
//! reclaim spends a retry, and a job whose retries are spent is dead-lettered
//! instead of being handed out again.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use super::job::{ErrorKind, FailureTransition, Job, NewJob, QueueName};
use super::queue::{ClaimedJob, EnqueueInfo, JobQueue};

const JOB_COLUMNS: &str = r#"
    id, job_type, payload, queue, status, retry_count, max_retries, run_at,
    lease_expires_at, worker_id, error_message, error_kind, dead_lettered_at,
    created_at, updated_at
"#;

pub struct PostgresJobQueue {
    pool: PgPool,
    lease_ms: i64,
    backoff_base: Duration,
}

impl PostgresJobQueue {
    /// Create a new PostgreSQL job queue.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lease_ms: 360_000, // 6 minutes, longer than the per-job timeout
            backoff_base: Duration::from_secs(1),
        }
    }

    /// Create with a custom lease duration.
    pub fn with_lease_duration(mut self, lease_ms: i64) -> Self {
        self.lease_ms = lease_ms;
        self
    }

    pub fn with_backoff(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Snapshot of a job by id.
    pub async fn job(&self, job_id: Uuid) -> Result<Job> {
        sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| anyhow!("job {} not found", job_id))
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue(&self, new_job: NewJob) -> Result<EnqueueInfo> {
        let job = Job::from_new(new_job, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, job_type, payload, queue, status, retry_count, max_retries,
                run_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id)
        .bind(&job.job_type)
        .bind(&job.payload)
        .bind(job.queue)
        .bind(job.status)
        .bind(job.retry_count)
        .bind(job.max_retries)
        .bind(job.run_at)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(EnqueueInfo {
            job_id: job.id,
            queue: job.queue,
            max_retries: job.max_retries,
        })
    }

    async fn claim(&self, worker_id: &str, queues: &[QueueName]) -> Result<Option<ClaimedJob>> {
        let preference: Vec<String> = queues.iter().map(|q| q.as_str().to_string()).collect();

        let expired = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'dead_letter',
                error_message = 'lease expired',
                error_kind = 'retryable',
                dead_lettered_at = NOW(),
                lease_expires_at = NULL,
                worker_id = NULL,
                updated_at = NOW()
            WHERE queue::text = ANY($1)
              AND status = 'running'
              AND lease_expires_at < NOW()
              AND retry_count >= max_retries
            "#,
        )
        .bind(&preference)
        .execute(&self.pool)
        .await?;

        if expired.rows_affected() > 0 {
            warn!(
                count = expired.rows_affected(),
                "dead-lettered jobs whose lease expired with no retries left"
            );
        }

        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            WITH next_job AS (
                SELECT id
                FROM jobs
                WHERE queue::text = ANY($1)
                  AND (
                    (status = 'pending' AND run_at <= NOW())
                    OR (
                      status = 'running'
                      AND lease_expires_at < NOW()
                      AND retry_count < max_retries
                    )
                  )
                ORDER BY array_position($1, queue::text), run_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                retry_count = CASE
                    WHEN status = 'running' THEN retry_count + 1
                    ELSE retry_count
                END,
                status = 'running',
                lease_expires_at = NOW() + ($2 || ' milliseconds')::INTERVAL,
                worker_id = $3,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_job)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(&preference)
        .bind(self.lease_ms.to_string())
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job.map(ClaimedJob::from))
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'succeeded',
                lease_expires_at = NULL,
                worker_id = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()> {
        let job = self.job(job_id).await?;

        match job.failure_transition(kind, Utc::now(), self.backoff_base) {
            FailureTransition::Requeue {
                run_at,
                retry_count,
            } => {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET status = 'pending',
                        run_at = $1,
                        retry_count = $2,
                        error_message = $3,
                        error_kind = $4,
                        lease_expires_at = NULL,
                        worker_id = NULL,
                        updated_at = NOW()
                    WHERE id = $5
                    "#,
                )
                .bind(run_at)
                .bind(retry_count)
                .bind(error)
                .bind(kind)
                .bind(job_id)
                .execute(&self.pool)
                .await?;

                debug!(job_id = %job_id, run_at = %run_at, "job requeued");
            }
            FailureTransition::DeadLetter => {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET status = 'dead_letter',
                        error_message = $1,
                        error_kind = $2,
                        dead_lettered_at = NOW(),
                        lease_expires_at = NULL,
                        worker_id = NULL,
                        updated_at = NOW()
                    WHERE id = $3
                    "#,
                )
                .bind(error)
                .bind(kind)
                .bind(job_id)
                .execute(&self.pool)
                .await?;

                debug!(job_id = %job_id, "job dead-lettered");
            }
        }

        Ok(())
    }
}
