use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Postgres backs the job queue and user registry when set; in-memory otherwise
    pub database_url: Option<String>,
    pub token_secret: String,
    /// Base URL used to build the OTP verification link
    pub public_base_url: String,
    pub otp_token_ttl: Duration,
    pub auth_token_ttl: Duration,
    pub worker_critical_concurrency: usize,
    pub worker_default_concurrency: usize,
    pub mailer_api_url: Option<String>,
    pub mailer_api_key: Option<String>,
    pub email_sender_name: String,
    pub email_sender_address: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: parse_or("PORT", 8080)?,
            database_url: env::var("DATABASE_URL").ok(),
            token_secret: env::var("TOKEN_SECRET").context("TOKEN_SECRET must be set")?,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            otp_token_ttl: Duration::from_secs(parse_or("OTP_TOKEN_TTL_SECS", 300)?),
            auth_token_ttl: Duration::from_secs(parse_or("AUTH_TOKEN_TTL_SECS", 86_400)?),
            worker_critical_concurrency: parse_or("WORKER_CRITICAL_CONCURRENCY", 10)?,
            worker_default_concurrency: parse_or("WORKER_DEFAULT_CONCURRENCY", 5)?,
            mailer_api_url: env::var("MAILER_API_URL").ok(),
            mailer_api_key: env::var("MAILER_API_KEY").ok(),
            email_sender_name: env::var("EMAIL_SENDER_NAME")
                .unwrap_or_else(|_| "Auth Service".to_string()),
            email_sender_address: env::var("EMAIL_SENDER_ADDRESS")
                .unwrap_or_else(|_| "no-reply@localhost".to_string()),
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}
