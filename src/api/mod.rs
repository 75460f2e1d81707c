//! Web API module for TradeSync
//!
//! Provides REST API endpoints for:
//! - Trade text parsing and analysis (metered)
//! - Notion page sync and OAuth
//! - Usage and license activation
//!
//! Everything under `/api/v1` sits behind the license middleware;
//! `/health` does not.

pub mod analyze;
pub mod error;
pub mod health;
pub mod license;
pub mod notion;
pub mod parse;
pub mod usage;

use crate::middleware::auth::{require_license, LicenseContext};
use axum::{middleware::from_fn, Extension, Router};
use tradesync_core::{
    Authenticator, OperationKind, SqliteLicenseStore, SqliteOAuthStateStore, UsageLimiter,
};
use tradesync_llm::{LlmClient, TokenUsage};
use tradesync_notion::NotionClient;

pub use analyze::analyze_routes;
pub use health::health_routes;
pub use license::license_routes;
pub use notion::notion_routes;
pub use parse::parse_routes;
pub use usage::usage_routes;

/// Handles shared by every handler
#[derive(Clone)]
pub struct Services {
    pub authenticator: Authenticator,
    pub limiter: UsageLimiter,
    pub licenses: SqliteLicenseStore,
    pub oauth_states: SqliteOAuthStateStore,
    pub llm: LlmClient,
    pub notion: NotionClient,
}

/// Record token telemetry without holding up the response
pub(crate) fn spawn_token_accounting(
    services: &Services,
    ctx: &LicenseContext,
    kind: OperationKind,
    usage: TokenUsage,
) {
    let limiter = services.limiter.clone();
    let identity = ctx.key.as_str().to_string();
    tokio::spawn(async move {
        limiter
            .record_token_usage(
                &identity,
                kind,
                usage.prompt_tokens,
                usage.completion_tokens,
            )
            .await;
    });
}

/// Create the API router with all endpoints
pub fn app_router(services: Services) -> Router {
    let protected = Router::new()
        .merge(parse_routes())
        .merge(analyze_routes())
        .merge(notion_routes())
        .merge(usage_routes())
        .merge(license_routes())
        .route_layer(from_fn(require_license));

    Router::new()
        .merge(health_routes())
        .nest("/api/v1", protected)
        .layer(Extension(services.authenticator.clone()))
        .layer(Extension(services))
}
