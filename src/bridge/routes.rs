//! Bridge API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<BridgeState>`.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::notifier::Notifier;
use crate::storage;
use crate::types::{
    AuthTicketRequest, Credentials, DailyBalanceRecord, NotificationEntry, SessionContext, SessionStatus,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct BridgeState {
    pub notifier: Notifier,
    pub session: Arc<SessionContext>,
    /// Begin events for the scheduler.
    pub begin_tx: mpsc::Sender<Credentials>,
    pub history_path: PathBuf,
}

pub type AppState = Arc<BridgeState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/auth-ticket
///
/// The `GET_AUTH_TICKET` message: stores the credentials and runs one
/// cycle. The outcome arrives later as notifications.
pub async fn post_auth_ticket(
    State(state): State<AppState>,
    Json(request): Json<AuthTicketRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), (StatusCode, Json<ErrorResponse>)> {
    info!(username = %request.username, api_url = %request.api_url, "Received GET_AUTH_TICKET");

    state
        .begin_tx
        .send(Credentials::from(request))
        .await
        .map_err(|_| {
            warn!("Scheduler is not accepting begin events");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "scheduler not running".into(),
                }),
            )
        })?;

    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { accepted: true })))
}

/// GET /api/notifications
pub async fn get_notifications(State(state): State<AppState>) -> Json<Vec<NotificationEntry>> {
    Json(state.notifier.recent().await)
}

/// GET /api/notifications/stream
///
/// Server-sent events: one event per relayed notification, named after its
/// wire name, with the stamped entry as JSON data.
pub async fn stream_notifications(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.notifier.subscribe();
    debug!("Display subscribed to notification stream");

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(entry) => {
                    let event = Event::default()
                        .event(entry.notification.name())
                        .json_data(&entry);
                    return Some((event, rx));
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Notification stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(state.session.status().await)
}

/// GET /api/balance-history
pub async fn get_balance_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<DailyBalanceRecord>>, (StatusCode, Json<ErrorResponse>)> {
    storage::read_history(&state.history_path)
        .await
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: e.message() }),
            )
        })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
