//! Users domain - registered identities for passwordless sign-in
//!
//! Responsibilities:
//! - Email validation and normalization
//! - The `UserRegistry` store (in-memory or Postgres)

pub mod models;
pub mod registry;

pub use models::{is_valid_email, normalize_email, User, UserError};
pub use registry::{InMemoryUserRegistry, PostgresUserRegistry, RegistryError, UserRegistry};
