//! WebSocket endpoint for download requests.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::server::protocol::OutboundEvent;
use crate::server::registry::ConnectionRegistry;
use crate::server::routes::AppState;

/// Size of the per-connection outbound buffer.
const CONNECTION_BUFFER_SIZE: usize = 64;

/// WebSocket upgrade handler.
///
/// GET /ws/download
pub async fn ws_download_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let connection_id = Uuid::new_v4().to_string();
    let registry = state.registry.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, registry, connection_id))
}

async fn handle_connection(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    connection_id: String,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (event_tx, mut event_rx) = mpsc::channel::<OutboundEvent>(CONNECTION_BUFFER_SIZE);
    registry.register(&connection_id, event_tx);

    // Outbound pump: serialize registry events onto the socket.
    let send_connection_id = connection_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(
                        "Failed to serialize event for {}: {}",
                        send_connection_id,
                        e
                    );
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound loop: one control message per text frame.
    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => {
                registry.handle_inbound(&connection_id, text.as_str()).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    registry.unregister(&connection_id);
    send_task.abort();
}
