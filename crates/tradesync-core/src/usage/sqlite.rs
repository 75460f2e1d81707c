//! SQLite-backed usage store

use super::{month_start, next_month_start, OperationKind, UsageRecord, UsageStore};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqlitePool;
use tracing::debug;

/// Usage counters in the `usage_records` table
#[derive(Debug, Clone)]
pub struct SqliteUsageStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct UsageRow {
    identity: String,
    kind: String,
    usage_date: NaiveDate,
    operation_count: i64,
    tokens_in: i64,
    tokens_out: i64,
}

impl UsageRow {
    fn into_record(self) -> Result<UsageRecord> {
        Ok(UsageRecord {
            identity: self.identity,
            kind: self.kind.parse()?,
            date: self.usage_date,
            daily_operation_count: self.operation_count.max(0) as u64,
            tokens_in: self.tokens_in.max(0) as u64,
            tokens_out: self.tokens_out.max(0) as u64,
        })
    }
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl SqliteUsageStore {
    /// Wrap a pool whose schema has been created by [`crate::db::migrate`]
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    async fn monthly_total(
        &self,
        identity: &str,
        kind: OperationKind,
        date: NaiveDate,
    ) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(operation_count), 0)
            FROM usage_records
            WHERE identity = ? AND kind = ? AND usage_date >= ? AND usage_date < ?
            "#,
        )
        .bind(identity)
        .bind(kind.as_str())
        .bind(month_start(date))
        .bind(next_month_start(date))
        .fetch_one(&self.pool)
        .await?;

        Ok(total.max(0) as u64)
    }

    async fn try_increment(
        &self,
        identity: &str,
        kind: OperationKind,
        date: NaiveDate,
        daily_limit: u32,
    ) -> Result<bool> {
        // The WHERE clause guards the conflict branch only; a fresh row
        // always starts at 1, so callers must not pass a zero ceiling.
        let result = sqlx::query(
            r#"
            INSERT INTO usage_records (
                identity, kind, usage_date, operation_count, tokens_in, tokens_out, updated_at
            ) VALUES (?, ?, ?, 1, 0, 0, ?)
            ON CONFLICT(identity, kind, usage_date) DO UPDATE SET
                operation_count = usage_records.operation_count + 1,
                updated_at = excluded.updated_at
            WHERE usage_records.operation_count < ?
            "#,
        )
        .bind(identity)
        .bind(kind.as_str())
        .bind(date)
        .bind(Utc::now())
        .bind(i64::from(daily_limit))
        .execute(&self.pool)
        .await?;

        let changed = result.rows_affected() > 0;
        debug!(kind = %kind, %date, changed, "Conditional usage increment");
        Ok(changed)
    }

    async fn add_tokens(
        &self,
        identity: &str,
        kind: OperationKind,
        date: NaiveDate,
        tokens_in: u64,
        tokens_out: u64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_records (
                identity, kind, usage_date, operation_count, tokens_in, tokens_out, updated_at
            ) VALUES (?, ?, ?, 0, ?, ?, ?)
            ON CONFLICT(identity, kind, usage_date) DO UPDATE SET
                tokens_in = usage_records.tokens_in + excluded.tokens_in,
                tokens_out = usage_records.tokens_out + excluded.tokens_out,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(identity)
        .bind(kind.as_str())
        .bind(date)
        .bind(to_sql_int(tokens_in))
        .bind(to_sql_int(tokens_out))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(
        &self,
        identity: &str,
        kind: OperationKind,
        date: NaiveDate,
    ) -> Result<Option<UsageRecord>> {
        let row: Option<UsageRow> = sqlx::query_as(
            r#"
            SELECT identity, kind, usage_date, operation_count, tokens_in, tokens_out
            FROM usage_records
            WHERE identity = ? AND kind = ? AND usage_date = ?
            "#,
        )
        .bind(identity)
        .bind(kind.as_str())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UsageRow::into_record).transpose()
    }
}
