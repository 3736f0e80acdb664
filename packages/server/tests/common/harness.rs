//! In-process test harness.
//!
//! Every test gets fresh in-memory stores, a recording mailer and the full HTTP
//! router, so no external services are needed.

use std::sync::Arc;

use auth_core::kernel::jobs::{
    JobWorker, JobWorkerConfig, ProcessorConfig, ProcessorHandle, QueueName,
};
use auth_core::kernel::{SentEmail, ServerDeps, TestDependencies};
use auth_core::server::build_app;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use test_context::AsyncTestContext;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub struct TestHarness {
    pub deps: TestDependencies,
    pub server_deps: ServerDeps,
    pub app: Router,
}

impl TestHarness {
    pub fn with_deps(deps: TestDependencies) -> Self {
        let server_deps = deps.server_deps();
        let app = build_app(server_deps.clone());
        Self {
            deps,
            server_deps,
            app,
        }
    }

    /// Send a request through the router and decode the response body.
    ///
    /// JSON bodies are parsed; anything else comes back as a JSON string.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        bearer: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body), None).await
    }

    /// Process queued jobs on this task until none are ready.
    ///
    /// Returns the number of attempts made. Retries are immediate because the
    /// test queue has no backoff.
    pub async fn drain_jobs(&self) -> usize {
        let config = JobWorkerConfig {
            queues: vec![QueueName::Critical, QueueName::Default],
            ..JobWorkerConfig::with_worker_id("test-drain")
        };
        let worker = JobWorker::new(
            self.server_deps.job_queue.clone(),
            Arc::new(self.server_deps.handler_registry()),
            config,
        );

        let shutdown = CancellationToken::new();
        let mut attempts = 0;
        while worker.run_once(&shutdown).await.unwrap() {
            attempts += 1;
        }
        attempts
    }

    /// Start the real worker pool against this harness's queue.
    pub fn start_processor(&self, config: ProcessorConfig) -> ProcessorHandle {
        self.deps.processor(config).start(CancellationToken::new())
    }

    pub fn sent_emails(&self) -> Vec<SentEmail> {
        self.deps.mailer.sent_emails()
    }
}

/// Pull the OTP token out of the verification link in an email body.
pub fn otp_token_from_email(email: &SentEmail) -> String {
    let start = email
        .content
        .find("code=")
        .expect("email should contain an otp link")
        + "code=".len();
    let encoded: String = email.content[start..]
        .chars()
        .take_while(|c| *c != '"')
        .collect();
    urlencoding::decode(&encoded).unwrap().into_owned()
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        Self::with_deps(TestDependencies::new())
    }

    async fn teardown(self) {}
}
