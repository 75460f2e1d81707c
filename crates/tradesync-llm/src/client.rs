//! OpenAI-compatible chat completions client
//!
//! Every call runs in JSON mode with its own timeout: parsing is light,
//! analysis gets more headroom. A timeout surfaces as [`Error::Timeout`] and
//! is never retried here.

use crate::error::{Error, Result};
use crate::reply::{
    decode_reply, AnalysisKind, TradeAnalysis, TradesEnvelope, ANALYZE_SYSTEM_PROMPT,
    PARSE_SYSTEM_PROMPT,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};
use tradesync_core::{mask_key, TradeRecord};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// LLM client configuration
#[derive(Clone)]
pub struct LlmConfig {
    /// API key; calls fail with [`Error::NotConfigured`] when unset
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Timeout for trade parsing
    pub parse_timeout: Duration,
    /// Timeout for trade analysis
    pub analyze_timeout: Duration,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            parse_timeout: Duration::from_secs(30),
            analyze_timeout: Duration::from_secs(45),
            temperature: 0.1,
        }
    }
}

// SECURITY: Custom Debug implementation to mask API key
impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_deref().map(mask_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("parse_timeout", &self.parse_timeout)
            .field("analyze_timeout", &self.analyze_timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl LlmConfig {
    /// Create a configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set both timeouts
    #[must_use]
    pub fn with_timeouts(mut self, parse: Duration, analyze: Duration) -> Self {
        self.parse_timeout = parse;
        self.analyze_timeout = analyze;
        self
    }
}

/// Token counts reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u64,
    /// Completion tokens
    pub completion_tokens: u64,
}

/// Decoded reply plus its token cost
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<T> {
    /// Decoded value
    pub value: T,
    /// Tokens spent
    pub usage: TokenUsage,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Sanitize provider error messages before they reach clients or logs
fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("invalid key")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return "LLM authentication error. Check the configured API key.".to_string();
    }

    if lower.contains("rate limit") || lower.contains("quota") {
        return "LLM rate limit exceeded. Please wait.".to_string();
    }

    if error.len() < 200 && !error.contains("sk-") && !error.contains("key") {
        return error.to_string();
    }

    "An LLM API error occurred. Please try again.".to_string()
}

fn map_transport_error(e: &reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::Timeout(timeout.as_millis() as u64)
    } else {
        Error::Network(sanitize_api_error(&e.to_string()))
    }
}

/// Trade parsing and analysis client
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmClient")
            .field("config", &self.config)
            .finish()
    }
}

impl LlmClient {
    /// Create a client
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Whether an API key is configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Turn free-form or tabular broker text into trade records
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn parse_trades(&self, text: &str) -> Result<Completion<Vec<TradeRecord>>> {
        let reply = self
            .chat(PARSE_SYSTEM_PROMPT, text, self.config.parse_timeout)
            .await?;
        let envelope: TradesEnvelope = decode_reply(&reply.value)?;

        debug!(trades = envelope.trades.len(), "Trades parsed");
        Ok(Completion {
            value: envelope.trades,
            usage: reply.usage,
        })
    }

    /// Review a set of trades
    #[instrument(skip(self, trades), fields(trades = trades.len(), kind = ?kind))]
    pub async fn analyze(
        &self,
        trades: &[TradeRecord],
        kind: AnalysisKind,
    ) -> Result<Completion<TradeAnalysis>> {
        let user = serde_json::json!({
            "analysisKind": kind,
            "focus": kind.focus(),
            "trades": trades,
        })
        .to_string();

        let reply = self
            .chat(ANALYZE_SYSTEM_PROMPT, &user, self.config.analyze_timeout)
            .await?;
        let analysis: TradeAnalysis = decode_reply(&reply.value)?;

        Ok(Completion {
            value: analysis,
            usage: reply.usage,
        })
    }

    async fn chat(&self, system: &str, user: &str, timeout: Duration) -> Result<Completion<String>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::NotConfigured("llm.api_key is not set".to_string()))?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                r#type: "json_object",
            },
        };

        debug!(model = %self.config.model, "Sending request to LLM");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: sanitize_api_error(&error_text),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(timeout.as_millis() as u64)
            } else {
                Error::InvalidResponse(e.to_string())
            }
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::InvalidResponse("No choices in response".to_string()))?;

        let usage = chat_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(Completion {
            value: content,
            usage,
        })
    }
}
