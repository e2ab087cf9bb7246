//! Postgres pool and schema.
//!
//! SYSTEM CONTEXT
//! ==============
//! Only used when `DATABASE_URL` is configured. The pool is opened once at
//! startup, the embedded migrations under `src/db/migrations` are applied,
//! and the pool is then handed to [`crate::store::Stores::postgres`].

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect and migrate.
///
/// # Errors
///
/// Connection failure or a migration that does not apply cleanly.
pub async fn connect_and_migrate(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    tracing::debug!(max_connections, "database migrations applied");
    Ok(pool)
}
