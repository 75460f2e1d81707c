//! Authentication middleware for Axum
//!
//! Buffers the request body, runs the [`Authenticator`] over the license
//! headers and the exact body bytes, then hands the accepted identity to
//! handlers through a [`LicenseContext`] request extension.

use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use tradesync_core::{
    AuthOutcome, AuthRequest, Authenticator, LicenseKey, LicenseRecord, LicenseStatus,
    RejectReason,
};

/// Header carrying the license key
pub const LICENSE_KEY_HEADER: &str = "x-license-key";
/// Header carrying the epoch-millisecond request timestamp
pub const TIMESTAMP_HEADER: &str = "x-request-timestamp";
/// Header carrying the hex HMAC signature
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Largest request body accepted on authenticated routes
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// JSON error response for auth failures
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl AuthErrorResponse {
    fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Auth rejection type
pub struct AuthRejection {
    status: StatusCode,
    body: AuthErrorResponse,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<RejectReason> for AuthRejection {
    fn from(reason: RejectReason) -> Self {
        let status = match reason {
            RejectReason::IdentityRevoked => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        };
        AuthRejection {
            status,
            body: AuthErrorResponse::new(reason.to_string(), reason.code()),
        }
    }
}

impl AuthRejection {
    fn payload_too_large() -> Self {
        AuthRejection {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            body: AuthErrorResponse::new(
                format!("Request body exceeds {} bytes", MAX_BODY_BYTES),
                "PAYLOAD_TOO_LARGE",
            ),
        }
    }

    fn not_configured() -> Self {
        AuthRejection {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: AuthErrorResponse::new("Authenticator not configured", "INTERNAL_ERROR"),
        }
    }
}

// ============================================================================
// License context
// ============================================================================

/// Identity accepted by [`require_license`]
#[derive(Debug, Clone)]
pub struct LicenseContext {
    /// Normalized license key
    pub key: LicenseKey,
    /// Stored license, `None` when the license store was unreachable
    pub license: Option<LicenseRecord>,
}

impl LicenseContext {
    /// Whether metered operations are allowed
    ///
    /// An unknown status (store unreachable) counts as active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.license
            .as_ref()
            .map_or(true, |l| l.status == LicenseStatus::Active)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for LicenseContext
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<LicenseContext>()
            .cloned()
            .ok_or_else(|| AuthRejection::from(RejectReason::MissingIdentity))
    }
}

// ============================================================================
// Middleware
// ============================================================================

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Reject the request unless it carries a valid license
///
/// Use with `axum::middleware::from_fn`; the [`Authenticator`] must be
/// installed as an `Extension` layer outside this one.
pub async fn require_license(
    authenticator: Option<Extension<Authenticator>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(Extension(authenticator)) = authenticator else {
        return AuthRejection::not_configured().into_response();
    };

    let (mut parts, body) = request.into_parts();
    let Ok(bytes) = to_bytes(body, MAX_BODY_BYTES).await else {
        return AuthRejection::payload_too_large().into_response();
    };

    let outcome = authenticator
        .authenticate(AuthRequest {
            identity: header(&parts.headers, LICENSE_KEY_HEADER),
            timestamp: header(&parts.headers, TIMESTAMP_HEADER),
            signature: header(&parts.headers, SIGNATURE_HEADER),
            raw_body: &bytes,
        })
        .await;

    match outcome {
        AuthOutcome::Accepted { identity, license } => {
            parts.extensions.insert(LicenseContext {
                key: identity,
                license,
            });
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        AuthOutcome::Rejected(reason) => AuthRejection::from(reason).into_response(),
    }
}
