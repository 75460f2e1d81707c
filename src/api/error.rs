//! API response envelopes and error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use tradesync_core::{LimitScope, UsageDecision};

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Error body: `{success:false, error, code}` plus limit details on 429
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: String,
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope_exceeded: Option<LimitScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_at: Option<DateTime<Utc>>,
}

/// Handler error
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
    limit: Option<(LimitScope, DateTime<Utc>)>,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            limit: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
    }

    pub fn not_activated() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "LICENSE_NOT_ACTIVATED",
            "License must be activated before use",
        )
    }

    /// 429 for a denied usage decision
    pub fn limit_exceeded(scope: LimitScope, reset_at: DateTime<Utc>) -> Self {
        let window = match scope {
            LimitScope::Daily => "Daily",
            LimitScope::Monthly => "Monthly",
        };
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            code: scope.code().to_string(),
            message: format!("{} usage limit reached", window),
            limit: Some((scope, reset_at)),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

/// Turn a limiter decision into `Ok(())` or a 429
pub fn ensure_allowed(decision: UsageDecision) -> ApiResult<()> {
    match decision {
        UsageDecision::Allowed => Ok(()),
        UsageDecision::Denied { scope, reset_at } => Err(ApiError::limit_exceeded(scope, reset_at)),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (scope_exceeded, reset_at) = match self.limit {
            Some((scope, reset_at)) => (Some(scope), Some(reset_at)),
            None => (None, None),
        };
        let body = ErrorBody {
            success: false,
            error: self.message,
            code: self.code,
            scope_exceeded,
            reset_at,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<tradesync_llm::Error> for ApiError {
    fn from(err: tradesync_llm::Error) -> Self {
        use tradesync_llm::Error;

        let status = match &err {
            Error::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Api { status: 429, .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Api { .. } | Error::Network(_) | Error::InvalidResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        let message = match &err {
            Error::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            warn!(code = err.code(), error = %err, "LLM call failed");
        }
        Self::new(status, err.code(), message)
    }
}

impl From<tradesync_notion::Error> for ApiError {
    fn from(err: tradesync_notion::Error) -> Self {
        use tradesync_notion::Error;

        let status = match &err {
            Error::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::BatchTooLarge { .. } => StatusCode::BAD_REQUEST,
            Error::OAuth { status, .. } if *status < 500 => StatusCode::BAD_REQUEST,
            Error::OAuth { .. } | Error::Write(_) => StatusCode::BAD_GATEWAY,
            Error::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(code = %err.code(), error = %err, "Notion call failed");
        }
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<tradesync_core::Error> for ApiError {
    fn from(err: tradesync_core::Error) -> Self {
        warn!(error = %err, "Store operation failed");
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "STORE_UNAVAILABLE",
            "Storage temporarily unavailable",
        )
    }
}
