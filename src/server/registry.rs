//! Connection registry: maps connection ids to live transports and relays
//! scheduler events back to the submitting client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::media::url::validate_media_url;
use crate::server::protocol::{parse_inbound, InboundMessage, OutboundEvent};
use crate::session::{DownloadManager, EventSink, ProgressUpdate};

/// Routes messages between WebSocket connections and the download manager.
///
/// Sessions are keyed by the submitting connection's id, so each connection
/// has at most one job in flight; a finished session gives way to the next
/// request from the same connection.
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, mpsc::Sender<OutboundEvent>>>,
    manager: Arc<DownloadManager>,
}

impl ConnectionRegistry {
    pub fn new(manager: Arc<DownloadManager>) -> Arc<Self> {
        Arc::new(Self {
            connections: Mutex::new(HashMap::new()),
            manager,
        })
    }

    fn connections(&self) -> MutexGuard<'_, HashMap<String, mpsc::Sender<OutboundEvent>>> {
        self.connections.lock().expect("connection map lock poisoned")
    }

    /// Record a new connection's transport sender.
    pub fn register(&self, connection_id: &str, sender: mpsc::Sender<OutboundEvent>) {
        self.connections()
            .insert(connection_id.to_string(), sender);
        tracing::info!("WebSocket client connected: {}", connection_id);
    }

    /// Remove a connection. Safe to call for ids that are already gone.
    pub fn unregister(&self, connection_id: &str) {
        if self.connections().remove(connection_id).is_some() {
            tracing::info!("WebSocket client disconnected: {}", connection_id);
        }
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections().len()
    }

    /// Best-effort send. A broken transport unregisters the connection
    /// instead of surfacing an error.
    pub async fn push(&self, connection_id: &str, event: OutboundEvent) {
        let sender = self.connections().get(connection_id).cloned();
        let Some(sender) = sender else {
            return;
        };
        if sender.send(event).await.is_err() {
            tracing::info!("Dropping dead connection {}", connection_id);
            self.unregister(connection_id);
        }
    }

    /// Handle one inbound text frame from a client.
    pub async fn handle_inbound(&self, connection_id: &str, raw: &str) {
        match parse_inbound(raw) {
            InboundMessage::Download { url, format_id } => {
                self.start_download(connection_id, &url, format_id).await;
            }
            InboundMessage::Cancel { session_id } => {
                self.manager.remove_session(&session_id);
                // Acked regardless of whatever state the job was in
                self.push(connection_id, OutboundEvent::Cancelled).await;
            }
            InboundMessage::Invalid { message } => {
                self.push(connection_id, OutboundEvent::Error { message })
                    .await;
            }
        }
    }

    async fn start_download(&self, connection_id: &str, url: &str, format_id: Option<String>) {
        if let Err(e) = validate_media_url(url) {
            self.push(
                connection_id,
                OutboundEvent::Error {
                    message: e.client_message(),
                },
            )
            .await;
            return;
        }

        // A terminal session from an earlier request on this connection is
        // replaced; only a genuinely in-flight job blocks a new one.
        if let Some(existing) = self.manager.get_session(connection_id) {
            if !existing.is_active() {
                self.manager.remove_session(connection_id);
            }
        }

        match self.manager.create_session(url, connection_id, format_id) {
            Ok(_) => {
                tracing::info!("Connection {} queued download of {}", connection_id, url);
            }
            Err(e) => {
                if !e.is_user_error() {
                    tracing::error!(
                        "Failed to create session for connection {}: {}",
                        connection_id,
                        e
                    );
                }
                self.push(
                    connection_id,
                    OutboundEvent::Error {
                        message: e.client_message(),
                    },
                )
                .await;
            }
        }
    }
}

#[async_trait]
impl EventSink for ConnectionRegistry {
    async fn deliver(&self, session_id: &str, update: &ProgressUpdate) {
        // Sessions are keyed by connection id, so the session id routes the
        // event straight to its transport.
        self.push(session_id, OutboundEvent::from(update)).await;
    }
}
