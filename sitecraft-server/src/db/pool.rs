//! PostgreSQL pool setup.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::migrations;

/// Writes are serialized per conversation, so a small pool is enough.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect and bring the schema up to date.
///
/// ```ignore
/// let pool = create_pool("postgres://localhost/sitecraft").await?;
/// let store = PgVersionStore::new(pool);
/// ```
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;

    migrations::run(&pool).await?;
    Ok(pool)
}
