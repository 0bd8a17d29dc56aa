use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::error::ApiError;

/// Creates the Postgres connection pool, retrying a few times so the server
/// survives a database that comes up a moment after it does.
pub async fn create_pool(database_url: &str) -> Result<PgPool, ApiError> {
    log::info!("Creating database connection pool");

    let max_retries = 3;
    let mut last_error = None;

    for attempt in 1..=max_retries {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(60))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                log::info!("Successfully connected to database");
                return Ok(pool);
            }
            Err(e) => {
                log::warn!(
                    "Database connection attempt {} of {} failed: {}",
                    attempt,
                    max_retries,
                    e
                );
                last_error = Some(e);
                if attempt < max_retries {
                    tokio::time::sleep(Duration::from_secs(2 * attempt as u64)).await;
                }
            }
        }
    }

    Err(ApiError::Database(format!(
        "could not connect to database after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}
