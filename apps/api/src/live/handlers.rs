//! Axum route handlers for the live-update endpoint.

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::notifications::{NotificationKind, PushEnvelope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub notification_type: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    pub delivered: usize,
}

/// POST /api/v1/notifications/push
pub async fn handle_publish(
    State(state): State<AppState>,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublishResponse>), AppError> {
    let Json(req) = payload?;
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    if req.message.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }

    let envelope =
        PushEnvelope::notification(req.notification_type, req.title, req.message, req.metadata);
    let delivered = state.hub.publish(envelope);
    info!(delivered, kind = %req.notification_type, "Published live-update notification");

    Ok((StatusCode::ACCEPTED, Json(PublishResponse { delivered })))
}

/// GET /ws/notifications
pub async fn handle_socket_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let pushes = state.hub.subscribe();
    ws.on_upgrade(move |socket| stream_pushes(socket, pushes))
}

/// Forwards pushes to one client until either side goes away. The client is
/// receive-only; anything it sends other than a close is ignored.
async fn stream_pushes(mut socket: WebSocket, mut pushes: broadcast::Receiver<PushEnvelope>) {
    debug!("Live-update client connected");
    loop {
        tokio::select! {
            push = pushes.recv() => match push {
                Ok(envelope) => {
                    let text = match serde_json::to_string(&envelope) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode push envelope");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Live-update client lagged; skipping missed pushes");
                }
                Err(RecvError::Closed) => break,
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "Live-update socket error");
                    break;
                }
            },
        }
    }
    debug!("Live-update client disconnected");
}
