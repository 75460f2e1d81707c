//! Notion endpoints
//!
//! - POST /api/v1/notion/pages/batch: write trades into a journal database
//! - POST /api/v1/notion/oauth/state: start the OAuth consent flow
//! - POST /api/v1/notion/oauth/token: finish it with the returned code

use super::error::{ApiError, ApiResponse, ApiResult};
use super::Services;
use crate::middleware::auth::LicenseContext;
use axum::{http::HeaderMap, http::StatusCode, routing::post, Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tradesync_core::{mask_key, TradeRecord, WriteBatchResult};
use tradesync_notion::OAuthToken;

/// Header carrying the workspace access token
pub const NOTION_TOKEN_HEADER: &str = "x-notion-token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub database_id: String,
    pub trades: Vec<TradeRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthStateResponse {
    pub state: String,
    pub authorize_url: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub code: String,
    pub state: String,
}

async fn write_pages(
    Extension(services): Extension<Services>,
    _ctx: LicenseContext,
    headers: HeaderMap,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<ApiResponse<WriteBatchResult>>> {
    let token = headers
        .get(NOTION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                "MISSING_NOTION_TOKEN",
                "X-Notion-Token header is required",
            )
        })?;

    let database_id = request.database_id.trim();
    if database_id.is_empty() {
        return Err(ApiError::bad_request("databaseId is required"));
    }
    if request.trades.is_empty() {
        return Err(ApiError::bad_request("trades must not be empty"));
    }

    let result = services
        .notion
        .sync_trades(token, database_id, &request.trades)
        .await?;
    Ok(ApiResponse::success(result))
}

async fn issue_state(
    Extension(services): Extension<Services>,
    ctx: LicenseContext,
) -> ApiResult<Json<ApiResponse<OAuthStateResponse>>> {
    let state = services.oauth_states.issue(ctx.key.as_str()).await?;
    let authorize_url = services.notion.authorize_url(&state)?;

    Ok(ApiResponse::success(OAuthStateResponse {
        state,
        authorize_url,
    }))
}

async fn exchange_token(
    Extension(services): Extension<Services>,
    ctx: LicenseContext,
    Json(request): Json<TokenRequest>,
) -> ApiResult<Json<ApiResponse<OAuthToken>>> {
    if request.code.trim().is_empty() {
        return Err(ApiError::bad_request("code is required"));
    }

    let owner = services
        .oauth_states
        .consume(request.state.trim(), Utc::now())
        .await?;
    if owner.as_deref() != Some(ctx.key.as_str()) {
        warn!(identity = %mask_key(ctx.key.as_str()), "Unknown, expired or foreign OAuth state");
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_OAUTH_STATE",
            "OAuth state is invalid or expired",
        ));
    }

    let token = services.notion.exchange_code(request.code.trim()).await?;
    info!(
        identity = %mask_key(ctx.key.as_str()),
        workspace = ?token.workspace_name,
        "Notion workspace connected"
    );
    Ok(ApiResponse::success(token))
}

/// Create Notion routes
pub fn notion_routes() -> Router {
    Router::new()
        .route("/notion/pages/batch", post(write_pages))
        .route("/notion/oauth/state", post(issue_state))
        .route("/notion/oauth/token", post(exchange_token))
}
