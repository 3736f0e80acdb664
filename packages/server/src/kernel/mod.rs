//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod jobs;
pub mod test_dependencies;
pub mod traits;

pub use deps::{LogMailer, MailerAdapter, ServerDeps};
pub use test_dependencies::{MockMailer, SentEmail, TestDependencies};
pub use traits::*;
