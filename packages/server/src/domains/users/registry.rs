//! User registry - the store of registered identities, keyed by normalized email.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sqlx::PgPool;

use super::models::{normalize_email, User};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("user already exists")]
    AlreadyExists,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserRegistry: Send + Sync {
    /// Insert `user` unless its normalized email is already taken.
    ///
    /// The existence check and the insert are one atomic step: of any number of
    /// concurrent calls for the same email, exactly one succeeds.
    async fn create(&self, user: &User) -> Result<(), RegistryError>;

    async fn get(&self, email: &str) -> Result<User, RegistryError>;
}

/// Process-local registry for tests and single-node development.
#[derive(Debug, Default)]
pub struct InMemoryUserRegistry {
    users: DashMap<String, User>,
}

impl InMemoryUserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserRegistry for InMemoryUserRegistry {
    async fn create(&self, user: &User) -> Result<(), RegistryError> {
        // The entry guard holds the shard lock across the check and the insert
        match self.users.entry(normalize_email(&user.email)) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, email: &str) -> Result<User, RegistryError> {
        self.users
            .get(&normalize_email(email))
            .map(|user| user.value().clone())
            .ok_or(RegistryError::NotFound)
    }
}

/// Postgres-backed registry. Uniqueness is enforced by the `users.email` index.
#[derive(Debug, Clone)]
pub struct PostgresUserRegistry {
    pool: PgPool,
}

impl PostgresUserRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRegistry for PostgresUserRegistry {
    async fn create(&self, user: &User) -> Result<(), RegistryError> {
        let inserted = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            INSERT INTO users (id, email, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user.id)
        .bind(normalize_email(&user.email))
        .bind(user.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RegistryError::Storage(e.into()))?;

        match inserted {
            Some(_) => Ok(()),
            None => Err(RegistryError::AlreadyExists),
        }
    }

    async fn get(&self, email: &str) -> Result<User, RegistryError> {
        sqlx::query_as::<_, User>("SELECT id, email, created_at FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RegistryError::Storage(e.into()))?
            .ok_or(RegistryError::NotFound)
    }
}
