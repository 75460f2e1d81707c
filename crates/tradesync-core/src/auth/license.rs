//! License keys and their backing store
//!
//! A license key is the rate-limit identity: `XXXX-XXXX-XXXX-XXXX` over an
//! alphabet without visually ambiguous characters (`0 O 1 I`).

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Characters a license key may contain
pub const KEY_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const GROUPS: usize = 4;
const GROUP_LEN: usize = 4;
const KEY_LEN: usize = GROUPS * GROUP_LEN + GROUPS - 1;

/// A well-formed license key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Normalize (trim, upper-case) and validate a raw key
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.len() != KEY_LEN {
            return None;
        }

        let groups: Vec<&str> = normalized.split('-').collect();
        let well_formed = groups.len() == GROUPS
            && groups.iter().all(|g| {
                g.len() == GROUP_LEN && g.bytes().all(|b| KEY_ALPHABET.contains(&b))
            });

        well_formed.then_some(Self(normalized))
    }

    /// Generate a random key
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let groups: Vec<String> = (0..GROUPS)
            .map(|_| {
                (0..GROUP_LEN)
                    .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
                    .collect()
            })
            .collect();
        Self(groups.join("-"))
    }

    /// The normalized key
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mask a key for safe display in logs
///
/// Shows the first and last four characters of anything longer than eight.
#[must_use]
pub fn mask_key(key: &str) -> String {
    if key.len() <= 8 || !key.is_ascii() {
        return "****".to_string();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}

/// Lifecycle state of a license
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    /// Issued but never activated
    Unused,
    /// Activated and usable
    Active,
    /// Permanently disabled
    Revoked,
}

impl LicenseStatus {
    /// Stable storage name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Unused => "unused",
            LicenseStatus::Active => "active",
            LicenseStatus::Revoked => "revoked",
        }
    }
}

impl FromStr for LicenseStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unused" => Ok(LicenseStatus::Unused),
            "active" => Ok(LicenseStatus::Active),
            "revoked" => Ok(LicenseStatus::Revoked),
            other => Err(Error::License(format!("unknown license status: {}", other))),
        }
    }
}

/// A stored license
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    /// Normalized key
    pub key: String,
    /// Current status
    pub status: LicenseStatus,
    /// Free-form label (buyer, order id)
    pub label: Option<String>,
    /// When the key was issued
    pub created_at: DateTime<Utc>,
    /// When the key was first activated
    pub activated_at: Option<DateTime<Utc>>,
}

/// License lookup used by the authenticator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LicenseStore: Send + Sync {
    /// Find a license by its normalized key
    async fn find(&self, key: &str) -> Result<Option<LicenseRecord>>;
}

/// SQLite-backed license store
#[derive(Debug, Clone)]
pub struct SqliteLicenseStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct LicenseRow {
    license_key: String,
    status: String,
    label: Option<String>,
    created_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
}

impl LicenseRow {
    fn into_record(self) -> Result<LicenseRecord> {
        Ok(LicenseRecord {
            key: self.license_key,
            status: self.status.parse()?,
            label: self.label,
            created_at: self.created_at,
            activated_at: self.activated_at,
        })
    }
}

impl SqliteLicenseStore {
    /// Wrap a pool whose schema has been created by [`crate::db::migrate`]
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issue a fresh `unused` license
    pub async fn issue(&self, label: Option<&str>) -> Result<LicenseRecord> {
        let record = LicenseRecord {
            key: LicenseKey::generate().0,
            status: LicenseStatus::Unused,
            label: label.map(str::to_string),
            created_at: Utc::now(),
            activated_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO licenses (license_key, status, label, created_at, activated_at)
            VALUES (?, ?, ?, ?, NULL)
            "#,
        )
        .bind(&record.key)
        .bind(record.status.as_str())
        .bind(&record.label)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        info!(key = %mask_key(&record.key), "License issued");
        Ok(record)
    }

    /// Move an `unused` license to `active`
    ///
    /// Returns `false` when the key is unknown or not `unused`.
    pub async fn activate(&self, key: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE licenses SET status = 'active', activated_at = ?
            WHERE license_key = ? AND status = 'unused'
            "#,
        )
        .bind(Utc::now())
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke a license. Returns `false` when the key is unknown.
    pub async fn revoke(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE licenses SET status = 'revoked' WHERE license_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!(key = %mask_key(key), "License revoked");
        }
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LicenseStore for SqliteLicenseStore {
    async fn find(&self, key: &str) -> Result<Option<LicenseRecord>> {
        let row: Option<LicenseRow> = sqlx::query_as(
            r#"
            SELECT license_key, status, label, created_at, activated_at
            FROM licenses WHERE license_key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LicenseRow::into_record).transpose()
    }
}
