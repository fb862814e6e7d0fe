//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use tokio::sync::mpsc;

use crate::{
    domain::{EventId, UpgradeRejected},
    infrastructure::{ConnectionHandle, Outbound},
    ui::state::AppState,
    usecase::ConnectError,
};

/// `GET /api/v1/events/{event_id}/ws`
///
/// Admission is decided before the upgrade: unknown or draft events get 404,
/// official events 410 and a full room 503.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Response {
    let event_id = match EventId::try_from(event_id) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Rejected upgrade for invalid event id: {}", e);
            return rejection_response(UpgradeRejected::NotFound);
        }
    };

    match state.connect_viewer_usecase.admit(&event_id).await {
        Ok(()) => ws
            .on_upgrade(move |socket| handle_socket(socket, state, event_id))
            .into_response(),
        Err(ConnectError::Rejected(rejection)) => {
            tracing::info!("Rejected upgrade for event '{}': {}", event_id, rejection);
            rejection_response(rejection)
        }
        Err(e) => {
            tracing::error!("Failed to admit viewer for event '{}': {}", event_id, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn rejection_response(rejection: UpgradeRejected) -> Response {
    let message = rejection.to_string();
    match rejection {
        UpgradeRejected::NotFound => {
            (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": message}))).into_response()
        }
        UpgradeRejected::Gone => {
            (StatusCode::GONE, Json(serde_json::json!({"error": message}))).into_response()
        }
        UpgradeRejected::OverCapacity { capacity } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": message, "capacity": capacity})),
        )
            .into_response(),
    }
}

/// Spawns the writer task that drains the connection's outbound channel into the socket.
///
/// The task ends on `Close` (after sending the close frame), on `Terminate`
/// (without a close handshake), on a send error, or when every sender is gone.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            let result = match command {
                Outbound::Text(text) => sender.send(Message::Text(text.to_string().into())).await,
                Outbound::Ping => sender.send(Message::Ping(Bytes::new())).await,
                Outbound::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    if let Err(e) = sender.send(Message::Close(Some(frame))).await {
                        tracing::debug!("Failed to send close frame: {}", e);
                    }
                    break;
                }
                Outbound::Terminate => break,
            };
            if let Err(e) = result {
                tracing::debug!("WebSocket send failed: {}", e);
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, event_id: EventId) {
    let (sender, mut receiver) = socket.split();
    let (handle, rx) = ConnectionHandle::channel();
    let connection_id = handle.id().clone();

    // full is queued before the connection becomes reachable by broadcasts
    if let Err(e) = state
        .connect_viewer_usecase
        .open_session(&event_id, handle)
        .await
    {
        tracing::warn!("Failed to open session for event '{}': {}", event_id, e);
        return;
    }

    let usecase = state.connect_viewer_usecase.clone();
    let reader_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", reader_id, e);
                    break;
                }
            };

            match msg {
                Message::Pong(_) => usecase.record_pong(&reader_id).await,
                Message::Text(text) => {
                    // the channel is server → client only
                    tracing::debug!("Ignoring {} bytes of text from '{}'", text.len(), reader_id);
                }
                Message::Close(_) => {
                    tracing::debug!("Viewer '{}' requested close", reader_id);
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.connect_viewer_usecase.disconnect(&connection_id).await;
}
