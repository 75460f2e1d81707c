//! Server initialization
//!
//! Contains the main `run()` function that wires stores and clients and
//! serves HTTP until a shutdown signal arrives.

use super::config::AppConfig;
use super::loader::load_config;
use super::validation::validate_config;
use crate::api::{app_router, Services};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tradesync_core::{
    db, Authenticator, SqliteLicenseStore, SqliteOAuthStateStore, SqliteUsageStore, UsageLimiter,
};
use tradesync_llm::LlmClient;
use tradesync_notion::NotionClient;

/// How often expired OAuth states are swept
const STATE_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Build every request-path service over one pool
pub fn build_services(config: &AppConfig, pool: SqlitePool) -> Result<Services> {
    let licenses = SqliteLicenseStore::new(pool.clone());
    let authenticator = Authenticator::new(Arc::new(licenses.clone()), config.auth.clone());
    let limiter = UsageLimiter::new(
        Arc::new(SqliteUsageStore::new(pool.clone())),
        config.limits.clone(),
    );

    let llm = LlmClient::new(config.llm.client_config()).context("Failed to build LLM client")?;
    if !llm.is_configured() {
        warn!("LLM API key not configured; parse and analyze requests will fail");
    }

    let notion = NotionClient::new(config.notion.client_config())
        .context("Failed to build Notion client")?;

    Ok(Services {
        authenticator,
        limiter,
        licenses,
        oauth_states: SqliteOAuthStateStore::new(pool),
        llm,
        notion,
    })
}

fn spawn_state_purge(states: SqliteOAuthStateStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match states.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(n) => debug!(purged = n, "Expired OAuth states removed"),
                Err(e) => warn!(error = %e, "Failed to purge OAuth states"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

/// Run the server
pub async fn run() -> Result<()> {
    let config = load_config()?;
    validate_config(&config)?;
    debug!(?config, "Configuration loaded");

    let db_path = config.database.resolved_path();
    let pool = db::connect(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let services = build_services(&config, pool)?;
    spawn_state_purge(services.oauth_states.clone());

    let app = app_router(services)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("TradeSync shutdown complete");
    Ok(())
}
