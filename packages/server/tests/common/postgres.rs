//! Postgres test harness backed by testcontainers.
//!
//! One container is started for the whole test binary. Every test gets its own
//! freshly migrated database inside it, so tests can run in parallel without
//! seeing each other's jobs or users.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use auth_core::domains::users::PostgresUserRegistry;
use auth_core::kernel::jobs::PostgresJobQueue;
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

struct SharedPostgres {
    /// Base URL without a database name
    server_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_POSTGRES: OnceCell<SharedPostgres> = OnceCell::const_new();

impl SharedPostgres {
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=200"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let host = postgres.get_host().await?;
        let port = postgres.get_host_port_ipv4(5432).await?;

        Ok(Self {
            server_url: format!("postgresql://postgres:postgres@{}:{}", host, port),
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_POSTGRES
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared Postgres container")
            })
            .await
    }
}

pub struct PostgresHarness {
    pub pool: PgPool,
}

impl PostgresHarness {
    /// Create an isolated database in the shared container and migrate it.
    pub async fn new() -> Result<Self> {
        let shared = SharedPostgres::get().await;

        let admin = PgPool::connect(&format!("{}/postgres", shared.server_url))
            .await
            .context("Failed to connect to Postgres")?;
        let database = format!("test_{}", Uuid::new_v4().simple());
        sqlx::query(&format!("CREATE DATABASE \"{database}\""))
            .execute(&admin)
            .await
            .context("Failed to create test database")?;
        admin.close().await;

        let pool = PgPool::connect(&format!("{}/{}", shared.server_url, database))
            .await
            .context("Failed to connect to test database")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self { pool })
    }

    /// Queue with immediate retries.
    pub fn job_queue(&self) -> PostgresJobQueue {
        PostgresJobQueue::new(self.pool.clone()).with_backoff(Duration::ZERO)
    }

    pub fn users(&self) -> Arc<PostgresUserRegistry> {
        Arc::new(PostgresUserRegistry::new(self.pool.clone()))
    }
}

impl AsyncTestContext for PostgresHarness {
    async fn setup() -> Self {
        Self::new()
            .await
            .expect("Failed to create Postgres test harness")
    }

    async fn teardown(self) {
        self.pool.close().await;
    }
}
