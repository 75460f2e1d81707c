//! Server configuration types
//!
//! Contains all configuration structures for the TradeSync proxy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tradesync_core::{AuthSettings, RetryPolicy, UsageLimits};
use tradesync_llm::LlmConfig;
use tradesync_notion::NotionConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub limits: UsageLimits,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub notion: NotionSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// SQLite location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; defaults to `<data dir>/tradesync/tradesync.db`
    #[serde(default)]
    pub path: Option<String>,
}

impl DatabaseConfig {
    /// Resolved database file path
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("data"))
                .join("tradesync")
                .join("tradesync.db"),
        }
    }
}

/// LLM provider configuration (exposed to TOML)
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_parse_timeout")]
    pub parse_timeout_secs: u64,
    #[serde(default = "default_analyze_timeout")]
    pub analyze_timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_llm_base_url() -> String {
    tradesync_llm::client::DEFAULT_BASE_URL.to_string()
}
fn default_llm_model() -> String {
    tradesync_llm::client::DEFAULT_MODEL.to_string()
}
fn default_parse_timeout() -> u64 {
    30
}
fn default_analyze_timeout() -> u64 {
    45
}
fn default_temperature() -> f32 {
    0.1
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            parse_timeout_secs: default_parse_timeout(),
            analyze_timeout_secs: default_analyze_timeout(),
            temperature: default_temperature(),
        }
    }
}

// SECURITY: Custom Debug implementation to hide the API key
impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "****"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("parse_timeout_secs", &self.parse_timeout_secs)
            .field("analyze_timeout_secs", &self.analyze_timeout_secs)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl LlmSettings {
    /// Client configuration for [`tradesync_llm::LlmClient`]
    pub fn client_config(&self) -> LlmConfig {
        let mut config = LlmConfig::default()
            .with_base_url(&self.base_url)
            .with_model(&self.model)
            .with_timeouts(
                Duration::from_secs(self.parse_timeout_secs),
                Duration::from_secs(self.analyze_timeout_secs),
            );
        config.api_key = self.api_key.clone().filter(|k| !k.trim().is_empty());
        config.temperature = self.temperature;
        config
    }
}

/// Notion integration configuration (exposed to TOML)
#[derive(Clone, Serialize, Deserialize)]
pub struct NotionSettings {
    #[serde(default = "default_notion_base_url")]
    pub base_url: String,
    #[serde(default = "default_notion_version")]
    pub version: String,
    #[serde(default = "default_notion_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_notion_base_url() -> String {
    tradesync_notion::client::NOTION_API_BASE.to_string()
}
fn default_notion_version() -> String {
    tradesync_notion::NOTION_VERSION.to_string()
}
fn default_notion_timeout() -> u64 {
    10
}
fn default_pacing_ms() -> u64 {
    340
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_jitter_ms() -> u64 {
    200
}
fn default_max_batch_size() -> usize {
    tradesync_notion::MAX_BATCH_SIZE
}

impl Default for NotionSettings {
    fn default() -> Self {
        Self {
            base_url: default_notion_base_url(),
            version: default_notion_version(),
            timeout_secs: default_notion_timeout(),
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            pacing_ms: default_pacing_ms(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

// SECURITY: Custom Debug implementation to hide the OAuth client secret
impl fmt::Debug for NotionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionSettings")
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .field("timeout_secs", &self.timeout_secs)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "****"))
            .field("redirect_uri", &self.redirect_uri)
            .field("pacing_ms", &self.pacing_ms)
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("jitter_ms", &self.jitter_ms)
            .field("max_batch_size", &self.max_batch_size)
            .finish()
    }
}

impl NotionSettings {
    /// Client configuration for [`tradesync_notion::NotionClient`]
    pub fn client_config(&self) -> NotionConfig {
        let mut config = NotionConfig::default()
            .with_base_url(&self.base_url)
            .with_pacing(Duration::from_millis(self.pacing_ms))
            .with_retry(
                RetryPolicy::new()
                    .with_max_retries(self.max_retries)
                    .with_base_delay(Duration::from_millis(self.base_delay_ms))
                    .with_jitter(Duration::from_millis(self.jitter_ms)),
            );
        config.version = self.version.clone();
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.max_batch_size = self.max_batch_size;
        if let (Some(id), Some(secret)) = (&self.client_id, &self.client_secret) {
            config = config.with_oauth(id, secret, self.redirect_uri.clone());
        }
        config
    }
}
