//! SQLite persistence: registered accounts and the append-only trade log.

pub mod accounts;
pub mod recorder;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use common::Result;

pub use accounts::{AccountStore, NewAccount};
pub use recorder::SqliteTradeRecorder;

/// Open the database, creating the file if needed, and run migrations.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(sqlx::Error::from)?;

    info!(database_url, "Database ready");
    Ok(pool)
}
