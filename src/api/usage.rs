//! Usage endpoint
//!
//! GET /api/v1/usage: counters, ceilings and reset instants per kind.

use super::error::{ApiResponse, ApiResult};
use super::Services;
use crate::middleware::auth::LicenseContext;
use axum::{routing::get, Extension, Json, Router};
use serde::Serialize;
use tradesync_core::{LicenseStatus, OperationKind, UsageSnapshot};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    /// `None` when the license store was unreachable
    pub status: Option<LicenseStatus>,
    pub usage: Vec<UsageSnapshot>,
}

async fn get_usage(
    Extension(services): Extension<Services>,
    ctx: LicenseContext,
) -> ApiResult<Json<ApiResponse<UsageResponse>>> {
    let mut usage = Vec::with_capacity(OperationKind::ALL.len());
    for kind in OperationKind::ALL {
        usage.push(
            services
                .limiter
                .usage_snapshot(ctx.key.as_str(), kind)
                .await?,
        );
    }

    Ok(ApiResponse::success(UsageResponse {
        status: ctx.license.as_ref().map(|l| l.status),
        usage,
    }))
}

/// Create usage routes
pub fn usage_routes() -> Router {
    Router::new().route("/usage", get(get_usage))
}
