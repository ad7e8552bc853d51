//! # SQLite database methods
//!
//! "Low-level" SQLite interactions, kept as simple functions that accept a `&mut SqliteConnection`. Callers obtain
//! a connection from a pool, or open a transaction and pass `&mut *tx`, without any other changes.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod media;
pub mod orders;
pub mod prices;
pub mod webhook_events;

const SQLITE_DB_URL: &str = "sqlite://data/agrotoken.db";

pub fn db_url() -> String {
    let result = env::var("AGT_DATABASE_URL").unwrap_or_else(|_| {
        info!("AGT_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}

/// Brings the schema up to date. Embedded at compile time, so deployments need no migration files on disk.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./src/sqlite/migrations").run(pool).await
}
