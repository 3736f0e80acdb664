// Main entry point for the auth server

use anyhow::{Context, Result};
use auth_core::kernel::jobs::{ProcessorConfig, TaskProcessor};
use auth_core::kernel::ServerDeps;
use auth_core::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,auth_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting auth server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let pool = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connected");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Migrations complete");

            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory queue and user registry");
            None
        }
    };

    let deps = ServerDeps::from_config(&config, pool).context("Failed to build dependencies")?;

    // Start background job processing
    let processor = TaskProcessor::new(deps.job_queue.clone(), deps.handler_registry())
        .with_config(ProcessorConfig {
            critical_concurrency: config.worker_critical_concurrency,
            default_concurrency: config.worker_default_concurrency,
            ..Default::default()
        })
        .start(CancellationToken::new());

    // Build application
    let app = build_app(deps);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("HTTP server stopped, draining job workers");
    processor.shutdown().await;

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
