//! Producer side of the OTP email pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::jobs::PayloadSendOtpEmail;
use super::token::{TokenError, TokenKind, TokenMaker};
use crate::kernel::jobs::{EnqueueInfo, JobQueue, NewJob};

#[derive(Debug, thiserror::Error)]
pub enum DistributeError {
    #[error("failed to issue otp token")]
    Token(#[from] TokenError),
    #[error("failed to encode job payload")]
    Encode(#[from] serde_json::Error),
    /// The broker's error, unchanged
    #[error("failed to enqueue task")]
    Enqueue(#[source] anyhow::Error),
}

/// Hands background work to the job queue.
#[async_trait]
pub trait TaskDistributor: Send + Sync {
    /// Mint a fresh OTP token for `email` and enqueue the email that carries it.
    async fn distribute_send_otp_email(&self, email: &str) -> Result<EnqueueInfo, DistributeError>;
}

pub struct JobTaskDistributor {
    queue: Arc<dyn JobQueue>,
    tokens: Arc<dyn TokenMaker>,
    otp_ttl: Duration,
}

impl JobTaskDistributor {
    pub fn new(queue: Arc<dyn JobQueue>, tokens: Arc<dyn TokenMaker>, otp_ttl: Duration) -> Self {
        Self {
            queue,
            tokens,
            otp_ttl,
        }
    }
}

#[async_trait]
impl TaskDistributor for JobTaskDistributor {
    async fn distribute_send_otp_email(&self, email: &str) -> Result<EnqueueInfo, DistributeError> {
        let (token, payload) = self.tokens.issue(email, TokenKind::Otp, self.otp_ttl)?;

        let job = NewJob::for_command(&PayloadSendOtpEmail {
            email: payload.email,
            token,
        })?;
        let job_type = job.job_type.clone();

        let info = self
            .queue
            .enqueue(job)
            .await
            .map_err(DistributeError::Enqueue)?;

        info!(
            job_id = %info.job_id,
            job_type = %job_type,
            queue = %info.queue,
            max_retries = info.max_retries,
            "enqueued task"
        );

        Ok(info)
    }
}
