//! `tradesync usage <key>`: counters and ceilings for one license

use super::license::parse_key;
use super::open_pool;
use anyhow::Result;
use std::sync::Arc;
use tradesync_core::{OperationKind, SqliteUsageStore, UsageLimiter};

/// Print usage for both operation kinds.
pub async fn run(raw_key: &str) -> Result<()> {
    let key = parse_key(raw_key)?;
    let (config, pool) = open_pool().await?;
    let limiter = UsageLimiter::new(Arc::new(SqliteUsageStore::new(pool)), config.limits);

    println!("Usage for {}", key);
    for kind in OperationKind::ALL {
        let snapshot = limiter.usage_snapshot(key.as_str(), kind).await?;
        println!(
            "  {:<9} today {:>4}/{:<4} month {:>5}/{:<5} (day resets {}, month resets {})",
            kind.as_str(),
            snapshot.daily_used,
            snapshot.daily_limit,
            snapshot.monthly_used,
            snapshot.monthly_limit,
            snapshot.daily_reset_at.format("%Y-%m-%d %H:%M UTC"),
            snapshot.monthly_reset_at.format("%Y-%m-%d"),
        );
    }
    Ok(())
}
