//! Notification bridge — link to the display side.
//!
//! Outbound results and errors go through the [`notifier::Notifier`];
//! the Axum server pushes them as server-sent events, keeps a pollable
//! log, and accepts the inbound `GET_AUTH_TICKET` message. CORS enabled
//! for the display front-end.

pub mod notifier;
pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use routes::AppState;

/// Start the bridge web server.
///
/// Binds before returning so a taken port fails startup; serving runs in a
/// background task.
pub async fn spawn_bridge(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind bridge port {port}"))?;
    info!(port, "Bridge server listening on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Bridge server error");
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/auth-ticket", post(routes::post_auth_ticket))
        .route("/api/notifications", get(routes::get_notifications))
        .route("/api/notifications/stream", get(routes::stream_notifications))
        .route("/api/status", get(routes::get_status))
        .route("/api/balance-history", get(routes::get_balance_history))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
