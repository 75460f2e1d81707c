//! License activation endpoint
//!
//! POST /api/v1/license/activate: moves an `unused` license to `active`.
//! Activating an already active license is a no-op.

use super::error::{ApiError, ApiResponse, ApiResult};
use super::Services;
use crate::middleware::auth::LicenseContext;
use axum::{http::StatusCode, routing::post, Extension, Json, Router};
use serde::Serialize;
use tracing::info;
use tradesync_core::{mask_key, LicenseStatus, LicenseStore};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationResponse {
    pub status: LicenseStatus,
    /// `false` when the license was already active
    pub activated: bool,
}

async fn activate(
    Extension(services): Extension<Services>,
    ctx: LicenseContext,
) -> ApiResult<Json<ApiResponse<ActivationResponse>>> {
    let key = ctx.key.as_str();

    if services.licenses.activate(key).await? {
        info!(key = %mask_key(key), "License activated");
        return Ok(ApiResponse::success(ActivationResponse {
            status: LicenseStatus::Active,
            activated: true,
        }));
    }

    match services.licenses.find(key).await? {
        Some(record) if record.status == LicenseStatus::Active => {
            Ok(ApiResponse::success(ActivationResponse {
                status: LicenseStatus::Active,
                activated: false,
            }))
        }
        Some(record) => Err(ApiError::new(
            StatusCode::CONFLICT,
            "LICENSE_NOT_ACTIVATABLE",
            format!("License is {}", record.status.as_str()),
        )),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "IDENTITY_NOT_FOUND",
            "License key not found",
        )),
    }
}

/// Create license routes
pub fn license_routes() -> Router {
    Router::new().route("/license/activate", post(activate))
}
