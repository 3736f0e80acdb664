//! Consumer side of the OTP email pipeline.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domains::users::{RegistryError, UserRegistry};
use crate::kernel::jobs::{ClaimedJob, CommandMeta, JobHandler, JobOutcome, QueueName};
use crate::kernel::BaseMailer;

pub const TASK_SEND_OTP_EMAIL: &str = "send-otp-email";

const OTP_EMAIL_SUBJECT: &str = "Welcome to Auth Service";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSendOtpEmail {
    pub email: String,
    pub token: String,
}

impl CommandMeta for PayloadSendOtpEmail {
    fn command_type(&self) -> &'static str {
        TASK_SEND_OTP_EMAIL
    }

    fn queue(&self) -> QueueName {
        QueueName::Critical
    }

    fn max_retries(&self) -> i32 {
        5
    }
}

/// Link the recipient follows to exchange the OTP token for a session.
pub fn otp_link(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/api/v1/otp?code={}",
        public_base_url.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}

fn otp_email_body(email: &str, link: &str) -> String {
    format!(
        "Hello {email},<br/>\n\
         Click the link below to log in to the app.<br/>\n\
         Please <a href=\"{link}\">click here</a> to verify your identity.<br/>"
    )
}

pub struct SendOtpEmailHandler {
    users: Arc<dyn UserRegistry>,
    mailer: Arc<dyn BaseMailer>,
    public_base_url: String,
}

impl SendOtpEmailHandler {
    pub fn new(
        users: Arc<dyn UserRegistry>,
        mailer: Arc<dyn BaseMailer>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            mailer,
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl JobHandler for SendOtpEmailHandler {
    async fn handle(&self, job: &ClaimedJob) -> JobOutcome {
        let payload: PayloadSendOtpEmail = match job.deserialize() {
            Ok(payload) => payload,
            Err(e) => {
                return JobOutcome::skip_retry(
                    anyhow::Error::new(e).context("failed to unmarshal payload"),
                )
            }
        };

        let user = match self.users.get(&payload.email).await {
            Ok(user) => user,
            Err(RegistryError::NotFound) => {
                return JobOutcome::skip_retry(anyhow::anyhow!("user not found"))
            }
            Err(e) => return JobOutcome::retry(anyhow::Error::new(e).context("failed to get user")),
        };

        let link = otp_link(&self.public_base_url, &payload.token);
        let content = otp_email_body(&user.email, &link);
        let to = [user.email.clone()];

        if let Err(e) = self
            .mailer
            .send_email(OTP_EMAIL_SUBJECT, &content, &to, &[], &[], &[])
            .await
            .context("failed to send otp email")
        {
            return JobOutcome::Retry(e);
        }

        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            payload_bytes = job.payload.len(),
            email = %user.email,
            "processed task"
        );
        JobOutcome::Success
    }
}
