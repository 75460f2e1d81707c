//! Production configuration validation
//!
//! Security checks for production deployments.

use super::config::AppConfig;
use super::loader::environment_name;
use anyhow::{bail, Result};
use tracing::warn;

/// Upper bound on `notion.max_retries`
const MAX_NOTION_RETRIES: u32 = 10;

/// Reject unusable settings; warn about risky ones in production
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.auth.timestamp_tolerance_secs == 0 {
        bail!("auth.timestamp_tolerance_secs must be greater than zero");
    }
    if config.notion.max_batch_size == 0 {
        bail!("notion.max_batch_size must be greater than zero");
    }
    if config.notion.max_retries > MAX_NOTION_RETRIES {
        bail!("notion.max_retries must be at most {}", MAX_NOTION_RETRIES);
    }
    if config.auth.signing_secret.is_some() && config.auth.signing_key().is_none() {
        bail!("auth.signing_secret is set but blank; remove it or set a real secret");
    }

    if environment_name().to_lowercase() != "production" {
        return Ok(());
    }

    if config.server.host == "0.0.0.0" {
        warn!(
            "SECURITY WARNING: Server is binding to all interfaces (0.0.0.0) in production. \
             Consider binding to 127.0.0.1 and using a reverse proxy."
        );
    }

    if config.auth.signing_key().is_none() {
        warn!(
            "SECURITY WARNING: auth.signing_secret is not set. \
             Request signatures will not be verified."
        );
    }

    if config.llm.api_key.is_none() {
        warn!("llm.api_key is not set; /parse and /analyze will return LLM_NOT_CONFIGURED");
    }

    if config.notion.client_id.is_none() || config.notion.client_secret.is_none() {
        warn!("Notion OAuth credentials are not set; token exchange is disabled");
    }

    Ok(())
}
