//! Server dependencies for actions and job handlers (using traits for testability)
//!
//! This module provides the central dependency container used by the HTTP routes
//! and the background job handlers. All external services use trait abstractions
//! so tests can swap in in-memory stores and mocks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mailer::{Attachment, EmailMessage, MailerOptions, MailerService};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::domains::auth::jobs::register_auth_jobs;
use crate::domains::auth::{JobTaskDistributor, JwtTokenMaker, TaskDistributor, TokenMaker};
use crate::domains::users::{InMemoryUserRegistry, PostgresUserRegistry, UserRegistry};
use crate::kernel::jobs::{HandlerRegistry, InMemoryJobQueue, JobQueue, PostgresJobQueue};
use crate::kernel::BaseMailer;

// =============================================================================
// MailerService Adapter (implements BaseMailer trait)
// =============================================================================

/// Wrapper around MailerService that implements BaseMailer trait
pub struct MailerAdapter(pub Arc<MailerService>);

impl MailerAdapter {
    pub fn new(service: Arc<MailerService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseMailer for MailerAdapter {
    async fn send_email(
        &self,
        subject: &str,
        content: &str,
        to: &[String],
        cc: &[String],
        bcc: &[String],
        attachments: &[Attachment],
    ) -> Result<()> {
        let message = EmailMessage {
            subject: subject.to_string(),
            html: content.to_string(),
            to: to.to_vec(),
            cc: cc.to_vec(),
            bcc: bcc.to_vec(),
            attachments: attachments.to_vec(),
        };

        self.0
            .send(&message)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

/// Writes emails to the log instead of sending them (local development)
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl BaseMailer for LogMailer {
    async fn send_email(
        &self,
        subject: &str,
        content: &str,
        to: &[String],
        cc: &[String],
        bcc: &[String],
        attachments: &[Attachment],
    ) -> Result<()> {
        anyhow::ensure!(!to.is_empty(), "email has no recipients");

        info!(
            subject = %subject,
            to = ?to,
            cc = ?cc,
            bcc = ?bcc,
            attachments = attachments.len(),
            content = %content,
            "email (log mailer, not sent)"
        );
        Ok(())
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to actions and job handlers
#[derive(Clone)]
pub struct ServerDeps {
    pub users: Arc<dyn UserRegistry>,
    pub tokens: Arc<dyn TokenMaker>,
    pub job_queue: Arc<dyn JobQueue>,
    pub distributor: Arc<dyn TaskDistributor>,
    pub mailer: Arc<dyn BaseMailer>,
    /// Base of the link embedded in OTP emails
    pub public_base_url: String,
    pub otp_ttl: Duration,
    pub auth_ttl: Duration,
}

impl ServerDeps {
    /// Create new ServerDeps; the distributor is wired from `job_queue` and `tokens`
    pub fn new(
        users: Arc<dyn UserRegistry>,
        tokens: Arc<dyn TokenMaker>,
        job_queue: Arc<dyn JobQueue>,
        mailer: Arc<dyn BaseMailer>,
        public_base_url: impl Into<String>,
        otp_ttl: Duration,
        auth_ttl: Duration,
    ) -> Self {
        let distributor: Arc<dyn TaskDistributor> = Arc::new(JobTaskDistributor::new(
            job_queue.clone(),
            tokens.clone(),
            otp_ttl,
        ));

        Self {
            users,
            tokens,
            job_queue,
            distributor,
            mailer,
            public_base_url: public_base_url.into(),
            otp_ttl,
            auth_ttl,
        }
    }

    /// Build production dependencies. Postgres stores are used when a pool is given.
    pub fn from_config(config: &Config, pool: Option<PgPool>) -> Result<Self> {
        let tokens = JwtTokenMaker::new(&config.token_secret).context("invalid TOKEN_SECRET")?;

        let (users, job_queue): (Arc<dyn UserRegistry>, Arc<dyn JobQueue>) = match pool {
            Some(pool) => (
                Arc::new(PostgresUserRegistry::new(pool.clone())),
                Arc::new(PostgresJobQueue::new(pool)),
            ),
            None => (
                Arc::new(InMemoryUserRegistry::new()),
                Arc::new(InMemoryJobQueue::new()),
            ),
        };

        let mailer: Arc<dyn BaseMailer> = match &config.mailer_api_url {
            Some(api_url) => Arc::new(MailerAdapter::new(Arc::new(MailerService::new(
                MailerOptions {
                    api_url: api_url.clone(),
                    api_key: config
                        .mailer_api_key
                        .clone()
                        .context("MAILER_API_KEY must be set when MAILER_API_URL is")?,
                    sender_name: config.email_sender_name.clone(),
                    sender_address: config.email_sender_address.clone(),
                },
            )))),
            None => Arc::new(LogMailer),
        };

        Ok(Self::new(
            users,
            Arc::new(tokens),
            job_queue,
            mailer,
            config.public_base_url.clone(),
            config.otp_token_ttl,
            config.auth_token_ttl,
        ))
    }

    /// Handlers for every background job type, bound to these dependencies
    pub fn handler_registry(&self) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        register_auth_jobs(&mut registry, self);
        registry
    }
}
