//! Gateway HTTP server: session create/status/reset triggers plus a health probe.

use crate::channels::ChannelPort;
use crate::config::Config;
use crate::data::DataProvider;
use crate::dispatch::Dispatcher;
use crate::session::{CreateOutcome, SessionRegistry};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Shared state for the gateway (config and the session registry).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
}

/// Build the gateway router over the given state.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/api/assistant/:tenant_id", get(assistant_trigger))
        .route("/api/status/:tenant_id", get(session_status))
        .route("/api/reset/:tenant_id", get(session_reset))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// The channel transport and data provider are supplied by the caller.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(
    config: Config,
    channel: Arc<dyn ChannelPort>,
    data: Arc<dyn DataProvider>,
) -> Result<()> {
    let dispatcher = Arc::new(Dispatcher::new(
        data,
        Duration::from_secs(config.assistant.context_ttl_mins * 60),
        Duration::from_secs(config.assistant.query_timeout_secs),
    ));
    let registry = Arc::new(SessionRegistry::new(
        channel,
        dispatcher,
        Duration::from_secs(config.sessions.qr_wait_secs),
        Duration::from_secs(config.sessions.qr_timeout_secs),
    ));
    let bind_addr = format!("{}:{}", config.gateway.bind, config.gateway.port);
    let state = GatewayState {
        config: Arc::new(config),
        registry,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}

/// GET /api/assistant/:tenant_id — idempotently create the tenant's session.
async fn assistant_trigger(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
) -> Json<serde_json::Value> {
    log::info!("[{}] assistant trigger", tenant_id);
    let body = match state.registry.get_or_create(&tenant_id).await {
        CreateOutcome::Qr(qr) => json!({ "status": "qr", "qr": qr }),
        CreateOutcome::AlreadyAuthenticated => json!({ "status": "already-authenticated" }),
        CreateOutcome::AlreadyLoggingIn => json!({ "status": "already-logging-in" }),
        CreateOutcome::Error(detail) => json!({ "status": "error", "detail": detail }),
    };
    Json(body)
}

/// GET /api/status/:tenant_id — session snapshot, 404 when the tenant has none.
async fn session_status(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.registry.status(&tenant_id).await {
        Some(session) => (
            StatusCode::OK,
            Json(json!({
                "tenantId": session.tenant_id,
                "state": session.state.as_str(),
                "createdAt": session.created_at.to_rfc3339(),
                "lastStatusMessage": session.last_status_message,
                "ownIdentity": session.own_identity,
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "not-found" })),
        ),
    }
}

/// GET /api/reset/:tenant_id — destroy the session and its channel artifacts.
async fn session_reset(
    State(state): State<GatewayState>,
    Path(tenant_id): Path<String>,
) -> Json<serde_json::Value> {
    log::info!("[{}] reset trigger", tenant_id);
    state.registry.destroy(&tenant_id).await;
    Json(json!({ "status": "reset" }))
}
