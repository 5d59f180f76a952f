//! Media extraction boundary.
//!
//! The scheduler drives any engine implementing `MediaExtractor`; the
//! production engine shells out to yt-dlp.

pub mod progress;
pub mod ytdlp;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::media::MediaInfo;
use crate::session::ProgressSink;

pub use ytdlp::YtDlpExtractor;

/// One download order handed to the extraction engine.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Source URL.
    pub url: String,

    /// Optional extractor-specific format selector.
    pub format_id: Option<String>,

    /// Set when the session was removed. The engine should stop when it
    /// notices; this is cooperative and best-effort only.
    pub cancelled: Arc<AtomicBool>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, format_id: Option<String>) -> Self {
        Self {
            url: url.into(),
            format_id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the submitting session has been removed.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Result of a finished download.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// Final artifact location under the downloads directory.
    pub file_path: PathBuf,

    /// Video title.
    pub title: String,

    /// Duration in seconds, when known.
    pub duration: Option<u64>,

    /// Uploader or channel name, when known.
    pub uploader: Option<String>,

    /// Artifact size in bytes.
    pub file_size: u64,

    /// Guessed MIME type of the artifact.
    pub mime_type: Option<String>,
}

/// The media extraction engine the scheduler drives.
///
/// `download` is expected to be slow; it runs inside a dedicated execution
/// task and must emit progress through the sink as it goes. On failure the
/// engine removes its partial artifacts before returning.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Probe metadata without downloading.
    async fn fetch_info(&self, url: &str) -> Result<MediaInfo>;

    /// Download the media described by `request`, reporting progress
    /// through `progress`. Returns the final artifact on success.
    async fn download(
        &self,
        request: &DownloadRequest,
        progress: &ProgressSink,
    ) -> Result<DownloadOutcome>;
}
