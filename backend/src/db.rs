use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::Config;

/// Open the bounded connection pool and bring the schema up to date.
pub async fn connect(config: &Config) -> Result<SqlitePool, sqlx::Error> {
    let options = connect_options(SqliteConnectOptions::from_str(&config.database_url)?);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;

    Ok(pool)
}

/// Writers queue on SQLite's lock for up to this long before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

fn connect_options(options: SqliteConnectOptions) -> SqliteConnectOptions {
    options.foreign_keys(true).busy_timeout(BUSY_TIMEOUT)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    // A single connection keeps every query on the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options(SqliteConnectOptions::from_str("sqlite::memory:").unwrap()))
        .await
        .unwrap();

    migrate(&pool).await.unwrap();
    pool
}

/// File-backed pool with several connections, for tests that need real
/// concurrent writers.
#[cfg(test)]
pub async fn test_file_pool(dir: &std::path::Path) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(dir.join("picnic.db"))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(connect_options(options))
        .await
        .unwrap();

    migrate(&pool).await.unwrap();
    pool
}
