//! Trade text parsing endpoint
//!
//! POST /api/v1/parse: metered `parse` operation.

use super::error::{ensure_allowed, ApiError, ApiResponse, ApiResult};
use super::{spawn_token_accounting, Services};
use crate::middleware::auth::LicenseContext;
use axum::{routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tradesync_core::{OperationKind, TradeRecord};
use tradesync_llm::TokenUsage;

/// Longest accepted input text, in characters
pub const MAX_TEXT_CHARS: usize = 20_000;

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub trades: Vec<TradeRecord>,
    pub usage: TokenUsage,
}

async fn parse_trades(
    Extension(services): Extension<Services>,
    ctx: LicenseContext,
    Json(request): Json<ParseRequest>,
) -> ApiResult<Json<ApiResponse<ParseResponse>>> {
    if !ctx.is_active() {
        return Err(ApiError::not_activated());
    }

    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("text is required"));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(ApiError::bad_request(format!(
            "text exceeds {} characters",
            MAX_TEXT_CHARS
        )));
    }
    if !services.llm.is_configured() {
        return Err(tradesync_llm::Error::NotConfigured("llm.api_key is not set".to_string()).into());
    }

    ensure_allowed(
        services
            .limiter
            .check_and_consume(ctx.key.as_str(), OperationKind::Parse)
            .await,
    )?;

    let completion = services.llm.parse_trades(text).await?;
    spawn_token_accounting(&services, &ctx, OperationKind::Parse, completion.usage);

    Ok(ApiResponse::success(ParseResponse {
        trades: completion.value,
        usage: completion.usage,
    }))
}

/// Create parse routes
pub fn parse_routes() -> Router {
    Router::new().route("/parse", post(parse_trades))
}
