//! Worker pool with an explicit start/stop lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{self, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::handler::HandlerRegistry;
use super::job::QueueName;
use super::queue::JobQueue;
use super::worker::{JobWorker, JobWorkerConfig};

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Workers that prefer `critical` and fall back to `default`
    pub critical_concurrency: usize,
    /// Workers that only draw from `default`
    pub default_concurrency: usize,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    /// How long `shutdown` waits for workers before aborting them
    pub shutdown_grace: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            critical_concurrency: 10,
            default_concurrency: 5,
            poll_interval: Duration::from_millis(500),
            job_timeout: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Claim order for a worker bound to `class`.
fn claim_order(class: QueueName) -> Vec<QueueName> {
    match class {
        QueueName::Critical => vec![QueueName::Critical, QueueName::Default],
        QueueName::Default => vec![QueueName::Default],
    }
}

pub struct TaskProcessor {
    queue: Arc<dyn JobQueue>,
    handlers: Arc<HandlerRegistry>,
    config: ProcessorConfig,
}

impl TaskProcessor {
    pub fn new(queue: Arc<dyn JobQueue>, handlers: HandlerRegistry) -> Self {
        Self {
            queue,
            handlers: Arc::new(handlers),
            config: ProcessorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    fn spawn_worker(
        &self,
        workers: &mut JoinSet<()>,
        config: JobWorkerConfig,
        shutdown: &CancellationToken,
    ) -> task::Id {
        let worker = JobWorker::new(self.queue.clone(), self.handlers.clone(), config);
        workers.spawn(worker.run(shutdown.clone())).id()
    }

    /// Spawn the worker pool. Workers run until `shutdown` is cancelled.
    ///
    /// A worker that panics is replaced with a fresh one under the same id.
    pub fn start(self, shutdown: CancellationToken) -> ProcessorHandle {
        let mut workers = JoinSet::new();
        let mut configs = HashMap::new();
        let pools = [
            (QueueName::Critical, self.config.critical_concurrency),
            (QueueName::Default, self.config.default_concurrency),
        ];

        for (class, count) in pools {
            for index in 0..count {
                let config = JobWorkerConfig {
                    worker_id: format!("{class}-{index}"),
                    queues: claim_order(class),
                    poll_interval: self.config.poll_interval,
                    job_timeout: self.config.job_timeout,
                };
                let id = self.spawn_worker(&mut workers, config.clone(), &shutdown);
                configs.insert(id, config);
            }
        }

        info!(
            critical = self.config.critical_concurrency,
            default = self.config.default_concurrency,
            job_types = self.handlers.len(),
            "task processor started"
        );

        let worker_count = configs.len();
        let grace = self.config.shutdown_grace;
        let supervisor = tokio::spawn(self.supervise(workers, configs, shutdown.clone(), grace));

        ProcessorHandle {
            shutdown,
            supervisor,
            worker_count,
        }
    }

    /// Watch the pool until shutdown, then drain it.
    async fn supervise(
        self,
        mut workers: JoinSet<()>,
        mut configs: HashMap<task::Id, JobWorkerConfig>,
        shutdown: CancellationToken,
        grace: Duration,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                joined = workers.join_next_with_id() => match joined {
                    None => return,
                    Some(Ok((id, ()))) => {
                        configs.remove(&id);
                    }
                    Some(Err(e)) => {
                        let Some(config) = configs.remove(&e.id()) else {
                            continue;
                        };
                        if !e.is_panic() || shutdown.is_cancelled() {
                            continue;
                        }
                        error!(worker_id = %config.worker_id, error = %e, "job worker panicked, restarting");
                        let id = self.spawn_worker(&mut workers, config.clone(), &shutdown);
                        configs.insert(id, config);
                    }
                },
            }
        }

        let drain = async {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!(error = %e, "job worker panicked");
                    }
                }
            }
        };

        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(
                remaining = workers.len(),
                "workers did not stop within the grace period, aborting"
            );
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }
    }
}

/// Running worker pool returned by [`TaskProcessor::start`].
pub struct ProcessorHandle {
    shutdown: CancellationToken,
    supervisor: JoinHandle<()>,
    worker_count: usize,
}

impl ProcessorHandle {
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Cancel the workers and wait for them to drain.
    ///
    /// In-flight jobs are handed back to the queue with [`ErrorKind::Shutdown`].
    /// Workers still running after the grace period are aborted.
    ///
    /// [`ErrorKind::Shutdown`]: super::ErrorKind::Shutdown
    pub async fn shutdown(self) {
        info!(workers = self.worker_count, "task processor shutting down");
        self.shutdown.cancel();

        if let Err(e) = self.supervisor.await {
            error!(error = %e, "task processor supervisor failed");
        }

        info!("task processor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::{ClaimedJob, InMemoryJobQueue, JobHandler, JobOutcome, NewJob};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    struct Record(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl JobHandler for Record {
        async fn handle(&self, job: &ClaimedJob) -> JobOutcome {
            let _ = self.0.send(job.job_type.clone());
            JobOutcome::Success
        }
    }

    #[test]
    fn test_claim_order() {
        assert_eq!(
            claim_order(QueueName::Critical),
            vec![QueueName::Critical, QueueName::Default]
        );
        assert_eq!(claim_order(QueueName::Default), vec![QueueName::Default]);
    }

    #[tokio::test]
    async fn test_processes_jobs_and_shuts_down() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut handlers = HandlerRegistry::new();
        handlers.register("ping", Arc::new(Record(tx)));

        let processor = TaskProcessor::new(queue.clone(), handlers).with_config(ProcessorConfig {
            critical_concurrency: 2,
            default_concurrency: 1,
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        });
        let handle = processor.start(CancellationToken::new());
        assert_eq!(handle.worker_count(), 3);

        queue
            .enqueue(
                NewJob::builder()
                    .job_type("ping")
                    .payload(b"{}".to_vec())
                    .build(),
            )
            .await
            .unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(seen.as_deref(), Some("ping"));

        tokio::time::timeout(Duration::from_secs(2), handle.shutdown())
            .await
            .expect("processor should stop");
    }

    struct PanicOnce {
        panicked: AtomicBool,
        seen: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl JobHandler for PanicOnce {
        async fn handle(&self, job: &ClaimedJob) -> JobOutcome {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("handler blew up");
            }
            let _ = self.seen.send(job.job_type.clone());
            JobOutcome::Success
        }
    }

    #[tokio::test]
    async fn test_panicked_worker_is_replaced() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut handlers = HandlerRegistry::new();
        handlers.register(
            "flaky",
            Arc::new(PanicOnce {
                panicked: AtomicBool::new(false),
                seen: tx,
            }),
        );

        let handle = TaskProcessor::new(queue.clone(), handlers)
            .with_config(ProcessorConfig {
                critical_concurrency: 1,
                default_concurrency: 0,
                poll_interval: Duration::from_millis(10),
                ..Default::default()
            })
            .start(CancellationToken::new());

        for _ in 0..2 {
            queue
                .enqueue(
                    NewJob::builder()
                        .job_type("flaky")
                        .payload(b"{}".to_vec())
                        .build(),
                )
                .await
                .unwrap();
        }

        // The only worker dies on the first job; its replacement takes the second
        let seen = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("replacement worker should pick up work");
        assert_eq!(seen.as_deref(), Some("flaky"));
        assert_eq!(handle.worker_count(), 1);

        tokio::time::timeout(Duration::from_secs(2), handle.shutdown())
            .await
            .expect("processor should stop");
    }
}
