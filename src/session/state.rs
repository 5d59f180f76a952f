//! Session state tracking.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Lifecycle state of a download session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Queued, waiting for a concurrency slot.
    Pending,
    /// Admitted and running.
    Downloading,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled by the client.
    Cancelled,
}

impl DownloadStatus {
    /// Whether no further transition is possible from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled
        )
    }
}

/// The record of one requested download job.
///
/// Owned exclusively by the `DownloadManager`; everything handed out is a
/// snapshot clone.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session identifier, chosen by the caller.
    pub session_id: String,

    /// Source URL, immutable after creation.
    pub url: String,

    /// Optional format selector captured at submission.
    pub format_id: Option<String>,

    /// Current lifecycle state.
    pub status: DownloadStatus,

    /// Download progress in percent, 0..=100.
    pub progress: f64,

    /// Last reported throughput in bytes per second. Advisory.
    pub speed: f64,

    /// Last reported estimated seconds remaining. Advisory.
    pub eta: u64,

    /// Failure cause, present only when `status` is `Failed`.
    pub error: Option<String>,

    /// Artifact location, present only when `status` is `Completed`.
    pub file_path: Option<PathBuf>,

    /// Creation timestamp, used for expiry.
    pub start_time: DateTime<Utc>,
}

impl Session {
    /// Create a new pending session.
    pub fn new(url: &str, session_id: &str, format_id: Option<String>) -> Self {
        Self {
            session_id: session_id.to_string(),
            url: url.to_string(),
            format_id,
            status: DownloadStatus::Pending,
            progress: 0.0,
            speed: 0.0,
            eta: 0,
            error: None,
            file_path: None,
            start_time: Utc::now(),
        }
    }

    /// Whether the session still occupies (or may come to occupy) a slot.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            DownloadStatus::Pending | DownloadStatus::Downloading
        )
    }

    /// Transition from pending to downloading on admission.
    pub fn admit(&mut self) {
        self.status = DownloadStatus::Downloading;
    }

    /// Apply a progress report. Progress never moves backwards; an unknown
    /// total yields 0 rather than a division by zero.
    pub fn update_progress(&mut self, downloaded: u64, total: u64, speed: f64, eta: u64) {
        let percent = if total == 0 {
            0.0
        } else {
            (downloaded as f64 / total as f64 * 100.0).min(100.0)
        };
        if percent > self.progress {
            self.progress = percent;
        }
        self.speed = speed;
        self.eta = eta;
    }

    /// Mark the download as finished with its artifact.
    pub fn complete(&mut self, file_path: PathBuf) {
        self.status = DownloadStatus::Completed;
        self.file_path = Some(file_path);
        self.progress = 100.0;
    }

    /// Mark the download as failed.
    pub fn fail(&mut self, error: String) {
        self.status = DownloadStatus::Failed;
        self.error = Some(error);
    }

    /// Mark the session as cancelled by the client.
    pub fn cancel(&mut self) {
        self.status = DownloadStatus::Cancelled;
    }

    /// Age of this session relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_pending() {
        let session = Session::new("https://example.com/v", "s1", None);
        assert_eq!(session.status, DownloadStatus::Pending);
        assert!(session.is_active());
        assert_eq!(session.progress, 0.0);
        assert!(session.error.is_none());
        assert!(session.file_path.is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!DownloadStatus::Pending.is_terminal());
        assert!(!DownloadStatus::Downloading.is_terminal());
        assert!(DownloadStatus::Completed.is_terminal());
        assert!(DownloadStatus::Failed.is_terminal());
        assert!(DownloadStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_progress_zero_total_does_not_divide() {
        let mut session = Session::new("u", "s1", None);
        session.admit();
        session.update_progress(1024, 0, 100.0, 5);
        assert_eq!(session.progress, 0.0);
        assert_eq!(session.speed, 100.0);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut session = Session::new("u", "s1", None);
        session.admit();
        session.update_progress(50, 100, 0.0, 0);
        assert_eq!(session.progress, 50.0);
        // A stale lower report does not move progress backwards
        session.update_progress(30, 100, 0.0, 0);
        assert_eq!(session.progress, 50.0);
        session.update_progress(80, 100, 0.0, 0);
        assert_eq!(session.progress, 80.0);
    }

    #[test]
    fn test_progress_capped_at_100() {
        let mut session = Session::new("u", "s1", None);
        session.admit();
        session.update_progress(150, 100, 0.0, 0);
        assert_eq!(session.progress, 100.0);
    }

    #[test]
    fn test_complete_forces_full_progress() {
        let mut session = Session::new("u", "s1", None);
        session.admit();
        session.update_progress(50, 100, 0.0, 0);
        session.complete(PathBuf::from("/tmp/a.mp4"));
        assert_eq!(session.status, DownloadStatus::Completed);
        assert_eq!(session.progress, 100.0);
        assert_eq!(session.file_path, Some(PathBuf::from("/tmp/a.mp4")));
        assert!(!session.is_active());
    }

    #[test]
    fn test_fail_records_error() {
        let mut session = Session::new("u", "s1", None);
        session.admit();
        session.fail("quota exceeded".to_string());
        assert_eq!(session.status, DownloadStatus::Failed);
        assert_eq!(session.error.as_deref(), Some("quota exceeded"));
        assert!(!session.is_active());
    }
}
