// TestDependencies - mock implementations for testing
//
// Provides in-memory stores and a recording mailer that can be injected into ServerDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::jobs::{InMemoryJobQueue, ProcessorConfig, TaskProcessor};
use super::{Attachment, BaseMailer, ServerDeps};
use crate::domains::auth::JwtTokenMaker;
use crate::domains::users::InMemoryUserRegistry;

pub const TEST_TOKEN_SECRET: &str = "test_secret_key_that_is_32_bytes!";

// =============================================================================
// Mock Mailer
// =============================================================================

/// An email captured by [`MockMailer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub subject: String,
    pub content: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` sends fail with a transport error
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Emails that were accepted, oldest first
    pub fn sent_emails(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of send attempts, failed ones included
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseMailer for MockMailer {
    async fn send_email(
        &self,
        subject: &str,
        content: &str,
        to: &[String],
        cc: &[String],
        bcc: &[String],
        attachments: &[Attachment],
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            anyhow::bail!("mock mailer: connection refused");
        }

        self.sent.lock().unwrap().push(SentEmail {
            subject: subject.to_string(),
            content: content.to_string(),
            to: to.to_vec(),
            cc: cc.to_vec(),
            bcc: bcc.to_vec(),
            attachments: attachments.to_vec(),
        });
        Ok(())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Builder for an in-memory [`ServerDeps`] with inspectable test doubles
pub struct TestDependencies {
    pub users: Arc<InMemoryUserRegistry>,
    pub job_queue: Arc<InMemoryJobQueue>,
    pub mailer: Arc<MockMailer>,
    pub tokens: Arc<JwtTokenMaker>,
    pub public_base_url: String,
    pub otp_ttl: Duration,
    pub auth_ttl: Duration,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            users: Arc::new(InMemoryUserRegistry::new()),
            job_queue: Arc::new(InMemoryJobQueue::with_backoff(Duration::ZERO)),
            mailer: Arc::new(MockMailer::new()),
            tokens: Arc::new(
                JwtTokenMaker::new(TEST_TOKEN_SECRET).expect("test secret is long enough"),
            ),
            public_base_url: "http://localhost:8080".to_string(),
            otp_ttl: Duration::from_secs(300),
            auth_ttl: Duration::from_secs(86_400),
        }
    }

    /// Set a mock mailer
    pub fn mock_mailer(mut self, mailer: MockMailer) -> Self {
        self.mailer = Arc::new(mailer);
        self
    }

    /// Set the queue (e.g. one with a non-zero retry backoff)
    pub fn job_queue(mut self, queue: InMemoryJobQueue) -> Self {
        self.job_queue = Arc::new(queue);
        self
    }

    pub fn otp_ttl(mut self, ttl: Duration) -> Self {
        self.otp_ttl = ttl;
        self
    }

    /// Convert into ServerDeps for testing
    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.users.clone(),
            self.tokens.clone(),
            self.job_queue.clone(),
            self.mailer.clone(),
            self.public_base_url.clone(),
            self.otp_ttl,
            self.auth_ttl,
        )
    }

    /// A processor over the in-memory queue with all job handlers registered
    pub fn processor(&self, config: ProcessorConfig) -> TaskProcessor {
        let deps = self.server_deps();
        TaskProcessor::new(deps.job_queue.clone(), deps.handler_registry()).with_config(config)
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
