//! Progress event plumbing between execution tasks and the scheduler.
//!
//! Execution tasks never touch the session map directly: they send tagged
//! events into one bounded channel, and a single consumer inside the
//! `DownloadManager` applies them and forwards them to the `EventSink`.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Progress event emitted by the extraction engine during one download.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// Bytes are flowing.
    Downloading {
        downloaded_bytes: u64,
        total_bytes: u64,
        /// Bytes per second; 0 when unknown.
        speed: f64,
        /// Estimated seconds remaining; 0 when unknown.
        eta: u64,
    },
    /// Download finished, post-processing (merge/transcode) in progress.
    Processing,
    /// Artifact is ready.
    Complete { file_path: PathBuf },
    /// The download failed.
    Error { message: String },
}

impl ProgressUpdate {
    /// Whether this update ends the session's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressUpdate::Complete { .. } | ProgressUpdate::Error { .. }
        )
    }
}

/// A progress event tagged with the session it belongs to.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub session_id: String,
    pub update: ProgressUpdate,
}

/// Sender handed to one execution task. Tags every update with the session
/// id before it enters the scheduler's shared event channel.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    session_id: String,
    tx: mpsc::Sender<SessionEvent>,
}

impl ProgressSink {
    pub(crate) fn new(session_id: String, tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { session_id, tx }
    }

    /// The session this sink reports for.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Deliver one update. A closed channel means the scheduler is shutting
    /// down; the update is dropped.
    pub async fn send(&self, update: ProgressUpdate) {
        let event = SessionEvent {
            session_id: self.session_id.clone(),
            update,
        };
        if self.tx.send(event).await.is_err() {
            tracing::debug!(
                "Dropping progress update for {}: scheduler is gone",
                self.session_id
            );
        }
    }
}

/// Receives session events after the scheduler has applied them.
///
/// Implemented by the connection registry, which relays each event to the
/// transport of the submitting client.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, session_id: &str, update: &ProgressUpdate);
}
