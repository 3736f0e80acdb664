// Auth Service - API Core
//
// Passwordless sign-up: users register an email, receive a signed one-time
// link through a background job pipeline, and exchange it for a session token.
//
// Domains live in domains/*, job infrastructure in kernel/jobs.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
