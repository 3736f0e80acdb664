//! Job infrastructure for background command execution.
//!
//! This module provides the kernel-level infrastructure for job execution:
//! - [`JobQueue`] - Durable, priority-partitioned delivery channel
//! - [`PostgresJobQueue`] / [`InMemoryJobQueue`] - Its two implementations
//! - [`TaskProcessor`] - Pool of [`JobWorker`]s with a start/stop lifecycle
//! - [`HandlerRegistry`] - Maps job types to [`JobHandler`]s
//!
//! # Architecture
//!
//! ```text
//! Domain code calls TaskDistributor
//!     │
//!     └─► JobQueue.enqueue(NewJob::for_command(&payload))
//!
//! TaskProcessor
//!     │
//!     └─► N x JobWorker
//!             ├─► JobQueue.claim(worker_id, [critical, default])
//!             ├─► HandlerRegistry.get(job_type).handle(&job) -> JobOutcome
//!             └─► mark_succeeded / mark_failed(kind)
//! ```
//!
//! # Domain-Specific Background Commands
//!
//! Handlers live in their respective domains.
//! This module only provides the infrastructure - business logic stays in domains.

mod handler;
mod job;
mod memory;
mod postgres;
mod processor;
mod queue;
mod worker;

pub use handler::{HandlerRegistry, JobHandler, JobOutcome};
pub use job::{ErrorKind, FailureTransition, Job, JobStatus, NewJob, QueueName};
pub use memory::InMemoryJobQueue;
pub use postgres::PostgresJobQueue;
pub use processor::{ProcessorConfig, ProcessorHandle, TaskProcessor};
pub use queue::{ClaimedJob, CommandMeta, EnqueueInfo, JobQueue};
pub use worker::{JobWorker, JobWorkerConfig};
