//! License CLI commands
//!
//! `tradesync license issue [--label]` : create an unused key
//! `tradesync license revoke <key>`    : revoke a key
//! `tradesync license show <key>`      : print a key's record

use super::{open_pool, LicenseCommands};
use anyhow::{bail, Result};
use tradesync_core::{LicenseKey, LicenseRecord, LicenseStore, SqliteLicenseStore};

/// Run a license subcommand.
pub async fn run(cmd: LicenseCommands) -> Result<()> {
    let (_, pool) = open_pool().await?;
    let store = SqliteLicenseStore::new(pool);

    match cmd {
        LicenseCommands::Issue { label } => {
            let record = store.issue(label.as_deref()).await?;
            println!("{}", record.key);
        }
        LicenseCommands::Revoke { key } => {
            let key = parse_key(&key)?;
            if store.revoke(key.as_str()).await? {
                println!("Revoked {}", key);
            } else {
                bail!("License {} not found", key);
            }
        }
        LicenseCommands::Show { key } => {
            let key = parse_key(&key)?;
            match store.find(key.as_str()).await? {
                Some(record) => print_record(&record),
                None => bail!("License {} not found", key),
            }
        }
    }
    Ok(())
}

pub(super) fn parse_key(raw: &str) -> Result<LicenseKey> {
    match LicenseKey::parse(raw) {
        Some(key) => Ok(key),
        None => bail!("'{}' is not a valid license key (XXXX-XXXX-XXXX-XXXX)", raw),
    }
}

fn print_record(record: &LicenseRecord) {
    println!("Key:        {}", record.key);
    println!("Status:     {}", record.status.as_str());
    println!("Label:      {}", record.label.as_deref().unwrap_or("-"));
    println!("Created:    {}", record.created_at.to_rfc3339());
    println!(
        "Activated:  {}",
        record
            .activated_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    );
}
