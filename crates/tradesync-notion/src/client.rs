//! Notion REST client
//!
//! Page writes return [`WriteError`] so they can be driven by
//! [`tradesync_core::write_batch_with_retry`]. Every request carries the
//! pinned `Notion-Version` header and a 10 second timeout by default.

use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use tradesync_core::{RetryPolicy, WriteError, DEFAULT_PACING};

/// Notion API base URL
pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";

/// Pinned API version
pub const NOTION_VERSION: &str = "2022-06-28";

/// Largest batch accepted by [`NotionClient::sync_trades`](crate::NotionClient::sync_trades)
pub const MAX_BATCH_SIZE: usize = 100;

/// Notion client configuration
#[derive(Clone)]
pub struct NotionConfig {
    /// API base URL
    pub base_url: String,
    /// `Notion-Version` header value
    pub version: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// OAuth client id
    pub client_id: Option<String>,
    /// OAuth client secret
    pub client_secret: Option<String>,
    /// OAuth redirect URI registered with the integration
    pub redirect_uri: Option<String>,
    /// Gap between page writes in a batch
    pub pacing: Duration,
    /// Retry behavior for a single page write
    pub retry: RetryPolicy,
    /// Largest accepted batch
    pub max_batch_size: usize,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            base_url: NOTION_API_BASE.to_string(),
            version: NOTION_VERSION.to_string(),
            timeout: Duration::from_secs(10),
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            pacing: DEFAULT_PACING,
            retry: RetryPolicy::default(),
            max_batch_size: MAX_BATCH_SIZE,
        }
    }
}

// SECURITY: Custom Debug implementation to hide the OAuth client secret
impl fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionConfig")
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .field("timeout", &self.timeout)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "****"))
            .field("redirect_uri", &self.redirect_uri)
            .field("pacing", &self.pacing)
            .field("retry", &self.retry)
            .field("max_batch_size", &self.max_batch_size)
            .finish()
    }
}

impl NotionConfig {
    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set OAuth client credentials
    #[must_use]
    pub fn with_oauth(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Option<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self.redirect_uri = redirect_uri;
        self
    }

    /// Set pacing between page writes
    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Result of an authorization code exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthToken {
    /// Bearer token for the connected workspace
    #[serde(alias = "access_token")]
    pub access_token: String,
    /// Connected workspace id
    #[serde(default, alias = "workspace_id")]
    pub workspace_id: Option<String>,
    /// Connected workspace name
    #[serde(default, alias = "workspace_name")]
    pub workspace_name: Option<String>,
    /// Integration bot id
    #[serde(default, alias = "bot_id")]
    pub bot_id: Option<String>,
}

#[derive(Deserialize)]
struct PageResponse {
    id: Option<String>,
}

#[derive(Deserialize)]
struct NotionErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<NotionErrorBody>(body) {
        Ok(NotionErrorBody {
            message: Some(message),
            ..
        }) => message,
        Ok(NotionErrorBody {
            code: Some(code), ..
        }) => code,
        _ => format!("Notion returned HTTP {}", status),
    }
}

/// Whether `id` is a Notion page id: 32 hex digits, dashed or not
fn is_notion_id(id: &str) -> bool {
    match id.len() {
        32 => id.bytes().all(|b| b.is_ascii_hexdigit()),
        36 => id.bytes().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b.is_ascii_hexdigit(),
        }),
        _ => false,
    }
}

fn map_transport_error(e: &reqwest::Error) -> WriteError {
    if e.is_timeout() {
        WriteError::Timeout
    } else {
        WriteError::Network(e.to_string())
    }
}

/// Notion API client
#[derive(Clone)]
pub struct NotionClient {
    client: Client,
    config: NotionConfig,
}

impl fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionClient")
            .field("config", &self.config)
            .finish()
    }
}

impl NotionClient {
    /// Create a client
    pub fn new(config: NotionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Client configuration
    #[must_use]
    pub fn config(&self) -> &NotionConfig {
        &self.config
    }

    fn request(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .bearer_auth(token)
            .header("Notion-Version", &self.config.version)
    }

    /// Create a page in `database_id`, returning the new page id
    #[instrument(skip(self, token, properties))]
    pub async fn create_page(
        &self,
        token: &str,
        database_id: &str,
        properties: &Value,
    ) -> std::result::Result<String, WriteError> {
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        let builder = self.client.post(format!("{}/pages", self.config.base_url));
        self.send_write(self.request(builder, token).json(&body)).await
    }

    /// Replace properties of an existing page, returning its id
    #[instrument(skip(self, token, properties))]
    pub async fn update_page(
        &self,
        token: &str,
        page_id: &str,
        properties: &Value,
    ) -> std::result::Result<String, WriteError> {
        if !is_notion_id(page_id) {
            return Err(WriteError::InvalidRequest(format!(
                "'{}' is not a Notion page id",
                page_id
            )));
        }

        let body = json!({ "properties": properties });
        let builder = self
            .client
            .patch(format!("{}/pages/{}", self.config.base_url, page_id));
        self.send_write(self.request(builder, token).json(&body)).await
    }

    async fn send_write(&self, request: RequestBuilder) -> std::result::Result<String, WriteError> {
        let response = request.send().await.map_err(|e| map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status.as_u16(), &body);
            debug!(status = status.as_u16(), message = %message, "Notion write rejected");
            return Err(WriteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let page: PageResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                WriteError::Timeout
            } else {
                WriteError::MalformedResponse(e.to_string())
            }
        })?;

        page.id
            .ok_or_else(|| WriteError::MalformedResponse("page id missing".to_string()))
    }

    /// Consent page URL carrying `state`
    pub fn authorize_url(&self, state: &str) -> Result<String> {
        let Some(client_id) = &self.config.client_id else {
            return Err(Error::NotConfigured("notion.client_id is required".to_string()));
        };

        let mut params = vec![
            ("client_id", client_id.as_str()),
            ("response_type", "code"),
            ("owner", "user"),
            ("state", state),
        ];
        if let Some(redirect_uri) = &self.config.redirect_uri {
            params.push(("redirect_uri", redirect_uri.as_str()));
        }

        reqwest::Url::parse_with_params(&format!("{}/oauth/authorize", self.config.base_url), &params)
            .map(String::from)
            .map_err(|e| Error::Http(e.to_string()))
    }

    /// Exchange an OAuth authorization code for an access token
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken> {
        let (Some(client_id), Some(client_secret)) =
            (&self.config.client_id, &self.config.client_secret)
        else {
            return Err(Error::NotConfigured(
                "notion.client_id and notion.client_secret are required".to_string(),
            ));
        };

        let mut body = json!({
            "grant_type": "authorization_code",
            "code": code,
        });
        if let Some(redirect_uri) = &self.config.redirect_uri {
            body["redirect_uri"] = json!(redirect_uri);
        }

        let response = self
            .client
            .post(format!("{}/oauth/token", self.config.base_url))
            .basic_auth(client_id, Some(client_secret))
            .header("Notion-Version", &self.config.version)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Write(map_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status.as_u16(), &body);
            warn!(status = status.as_u16(), message = %message, "Notion OAuth exchange failed");
            return Err(Error::OAuth {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<OAuthToken>()
            .await
            .map_err(|e| Error::Write(WriteError::MalformedResponse(e.to_string())))
    }
}
