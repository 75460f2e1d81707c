//! Trade analysis endpoint
//!
//! POST /api/v1/analyze: metered `analysis` operation.

use super::error::{ensure_allowed, ApiError, ApiResponse, ApiResult};
use super::{spawn_token_accounting, Services};
use crate::middleware::auth::LicenseContext;
use axum::{routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tradesync_core::{OperationKind, TradeRecord};
use tradesync_llm::{AnalysisKind, TokenUsage, TradeAnalysis};

/// Most trades reviewed in one request
pub const MAX_ANALYZE_TRADES: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub trades: Vec<TradeRecord>,
    #[serde(default = "default_kind")]
    pub analysis_kind: AnalysisKind,
}

fn default_kind() -> AnalysisKind {
    AnalysisKind::Session
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub analysis: TradeAnalysis,
    pub usage: TokenUsage,
}

async fn analyze_trades(
    Extension(services): Extension<Services>,
    ctx: LicenseContext,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<ApiResponse<AnalyzeResponse>>> {
    if !ctx.is_active() {
        return Err(ApiError::not_activated());
    }
    if request.trades.is_empty() {
        return Err(ApiError::bad_request("trades must not be empty"));
    }
    if request.trades.len() > MAX_ANALYZE_TRADES {
        return Err(ApiError::bad_request(format!(
            "at most {} trades per analysis",
            MAX_ANALYZE_TRADES
        )));
    }
    if !services.llm.is_configured() {
        return Err(tradesync_llm::Error::NotConfigured("llm.api_key is not set".to_string()).into());
    }

    ensure_allowed(
        services
            .limiter
            .check_and_consume(ctx.key.as_str(), OperationKind::Analysis)
            .await,
    )?;

    let completion = services
        .llm
        .analyze(&request.trades, request.analysis_kind)
        .await?;
    spawn_token_accounting(&services, &ctx, OperationKind::Analysis, completion.usage);

    Ok(ApiResponse::success(AnalyzeResponse {
        analysis: completion.value,
        usage: completion.usage,
    }))
}

/// Create analysis routes
pub fn analyze_routes() -> Router {
    Router::new().route("/analyze", post(analyze_trades))
}
