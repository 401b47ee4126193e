//! Database connection pool and migration management.

use std::time::Duration;

use sqlx::{Pool, Postgres, postgres::PgPoolOptions};

use crate::config::Config;

/// PostgreSQL connection pool shared by the stores.
pub type DbPool = Pool<Postgres>;

/// Create the connection pool.
///
/// Acquiring a connection is bounded so a saturated pool surfaces as
/// [`StoreError::Unavailable`](crate::store::StoreError::Unavailable) instead of hanging a request.
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the first connection fails.
pub async fn create_pool(config: &Config) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_millis(config.database_acquire_timeout_ms))
        .connect(&config.database_url)
        .await
}

/// Apply pending migrations from `migrations/`.
///
/// Applied migrations are tracked in `_sqlx_migrations`, so each one runs once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
