//! CLI module for TradeSync
//!
//! Provides commands:
//! - `serve`: Start the edge server
//! - `license`: Issue, revoke and inspect license keys
//! - `usage`: Show a license's counters

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;

pub mod license;
pub mod usage;

/// TradeSync edge proxy CLI
#[derive(Parser, Debug)]
#[command(name = "tradesync")]
#[command(about = "Licensing, metering and Notion sync proxy for the TradeSync extension")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server
    Serve,
    /// Manage license keys
    License {
        #[command(subcommand)]
        command: LicenseCommands,
    },
    /// Show today's and this month's usage for a license
    Usage {
        /// License key
        key: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum LicenseCommands {
    /// Issue a new unused license
    Issue {
        /// Free-form note stored with the license
        #[arg(long)]
        label: Option<String>,
    },
    /// Revoke a license
    Revoke {
        /// License key
        key: String,
    },
    /// Show a license
    Show {
        /// License key
        key: String,
    },
}

/// Open the configured database
async fn open_pool() -> Result<(crate::server::config::AppConfig, SqlitePool)> {
    let config = crate::server::load_config()?;
    let path = config.database.resolved_path();
    let pool = tradesync_core::db::connect(&path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok((config, pool))
}

/// Run the CLI command
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Serve) => crate::server::run().await,
        Some(Commands::License { command }) => license::run(command).await,
        Some(Commands::Usage { key }) => usage::run(&key).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_license_issue() {
        let cli = Cli::try_parse_from(["tradesync", "license", "issue", "--label", "beta"]).unwrap();
        match cli.command {
            Some(Commands::License {
                command: LicenseCommands::Issue { label },
            }) => assert_eq!(label.as_deref(), Some("beta")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["tradesync"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_revoke_requires_key() {
        assert!(Cli::try_parse_from(["tradesync", "license", "revoke"]).is_err());
    }
}
