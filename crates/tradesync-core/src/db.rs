//! SQLite bootstrap
//!
//! Opens the shared pool and creates the schema for every store in this
//! crate. Stores receive a clone of the pool; there is no process-wide handle.

use crate::error::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Maximum pooled connections
const MAX_CONNECTIONS: u32 = 5;

/// How long a writer waits for the SQLite write lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if missing) the database at `path` and run migrations
pub async fn connect(path: impl AsRef<Path>) -> Result<SqlitePool> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::Internal(format!("Failed to create database directory: {}", e))
        })?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;

    info!(path = %path.display(), "SQLite store initialized");
    Ok(pool)
}

/// Create all tables and indexes
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS usage_records (
            identity TEXT NOT NULL,
            kind TEXT NOT NULL,
            usage_date TEXT NOT NULL,
            operation_count INTEGER NOT NULL DEFAULT 0,
            tokens_in INTEGER NOT NULL DEFAULT 0,
            tokens_out INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (identity, kind, usage_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS licenses (
            license_key TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            label TEXT,
            created_at TEXT NOT NULL,
            activated_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS oauth_states (
            state TEXT PRIMARY KEY,
            identity TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_oauth_states_expires ON oauth_states(expires_at)")
        .execute(pool)
        .await?;

    debug!("SQLite schema initialized");
    Ok(())
}
