//! One-time OAuth `state` tokens
//!
//! Binds the `state` parameter of an OAuth authorization redirect to the
//! license that started it. A token is valid for ten minutes and can be
//! consumed exactly once.

use crate::auth::mask_key;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, info};

/// Lifetime of an issued state token, in minutes
pub const STATE_TTL_MINUTES: i64 = 10;

/// SQLite-backed store for pending OAuth states
#[derive(Debug, Clone)]
pub struct SqliteOAuthStateStore {
    pool: SqlitePool,
}

impl SqliteOAuthStateStore {
    /// Wrap a pool whose schema has been created by [`crate::db::migrate`]
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issue a fresh state token for `identity`
    pub async fn issue(&self, identity: &str) -> Result<String> {
        self.issue_at(identity, Utc::now()).await
    }

    /// [`issue`](Self::issue) with an explicit clock
    pub async fn issue_at(&self, identity: &str, now: DateTime<Utc>) -> Result<String> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let state = hex::encode(bytes);

        sqlx::query("INSERT INTO oauth_states (state, identity, expires_at) VALUES (?, ?, ?)")
            .bind(&state)
            .bind(identity)
            .bind(now + Duration::minutes(STATE_TTL_MINUTES))
            .execute(&self.pool)
            .await?;

        debug!(identity = %mask_key(identity), "OAuth state issued");
        Ok(state)
    }

    /// Consume a state token, returning the identity it was issued to
    ///
    /// The row is deleted whether or not it has expired, so a second call
    /// with the same token always yields `None`.
    pub async fn consume(&self, state: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let row: Option<(String, DateTime<Utc>)> =
            sqlx::query_as("DELETE FROM oauth_states WHERE state = ? RETURNING identity, expires_at")
                .bind(state)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match row {
            Some((identity, expires_at)) if expires_at > now => Some(identity),
            Some((identity, _)) => {
                info!(identity = %mask_key(&identity), "Expired OAuth state presented");
                None
            }
            None => None,
        })
    }

    /// Delete every state that expired before `now`
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            debug!(count = result.rows_affected(), "Purged expired OAuth states");
        }
        Ok(result.rows_affected())
    }
}
