//! Rihlah cleanup worker runtime.
//!
//! Periodically drops attempt counters whose window ended long ago so the
//! `rate_limits` table only holds recent activity.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use rihlah_application::{RateLimitPolicy, RateLimitService};
use rihlah_core::{AppError, AppResult};
use rihlah_infrastructure::PostgresRateLimitRepository;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    cleanup_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let rate_limit_service = RateLimitService::new(
        Arc::new(PostgresRateLimitRepository::new(pool)),
        RateLimitPolicy::default(),
    );

    info!(
        cleanup_interval_secs = config.cleanup_interval_secs,
        "rihlah-worker started"
    );

    loop {
        match rate_limit_service.cleanup().await {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, "removed expired rate limit records");
                }
            }
            Err(error) => {
                warn!(error = %error, "rate limit cleanup failed");
            }
        }

        tokio::time::sleep(Duration::from_secs(config.cleanup_interval_secs)).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let cleanup_interval_secs = parse_env_u64("CLEANUP_INTERVAL_SECS", 3600)?;

        if cleanup_interval_secs == 0 {
            return Err(AppError::Validation(
                "CLEANUP_INTERVAL_SECS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            cleanup_interval_secs,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
