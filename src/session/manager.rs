//! The download manager: session bookkeeping, FIFO queueing, and the
//! admission loop that enforces the global concurrency cap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extractor::{DownloadRequest, MediaExtractor};
use crate::session::events::{EventSink, ProgressSink, ProgressUpdate, SessionEvent};
use crate::session::state::Session;

/// How long the admission loop waits between capacity checks while all
/// slots are taken.
const ADMISSION_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Progress events buffered before execution tasks block on the channel.
const EVENT_BUFFER_SIZE: usize = 256;

/// How often expired sessions are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Shared scheduler state. Every mutation happens under one lock so each
/// operation is atomic with respect to concurrent callers.
#[derive(Default)]
struct SchedulerState {
    /// Authoritative session records, keyed by session id.
    sessions: HashMap<String, Session>,

    /// Sessions currently occupying a concurrency slot, with the flag an
    /// execution task polls for cooperative cancellation.
    active: HashMap<String, Arc<AtomicBool>>,

    /// Entries enqueued but not yet taken by the admission loop.
    queued: usize,
}

/// Receiver halves parked between construction and `start`.
struct Channels {
    queue_rx: mpsc::UnboundedReceiver<String>,
    events_rx: mpsc::Receiver<SessionEvent>,
}

/// Schedules download sessions: accepts jobs, admits at most
/// `max_concurrent_downloads` at a time in FIFO order, supervises execution
/// tasks, and applies their progress events to the session records.
///
/// Constructed by the composition root and started exactly once with
/// `start`; `create_session` only enqueues.
pub struct DownloadManager {
    state: Mutex<SchedulerState>,
    queue_tx: mpsc::UnboundedSender<String>,
    events_tx: mpsc::Sender<SessionEvent>,
    extractor: Arc<dyn MediaExtractor>,
    max_concurrent: usize,
    session_expiry: chrono::Duration,
    channels: Mutex<Option<Channels>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DownloadManager {
    /// Create a manager with the given extraction engine and configuration.
    pub fn new(extractor: Arc<dyn MediaExtractor>, config: &Config) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER_SIZE);

        Arc::new(Self {
            state: Mutex::new(SchedulerState::default()),
            queue_tx,
            events_tx,
            extractor,
            max_concurrent: config.downloads.max_concurrent_downloads,
            session_expiry: config.session_expiry(),
            channels: Mutex::new(Some(Channels {
                queue_rx,
                events_rx,
            })),
            workers: Mutex::new(Vec::new()),
        })
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().expect("scheduler state lock poisoned")
    }

    /// Start the admission loop, event pump, and expiry sweeper.
    ///
    /// Must be called exactly once; a second call is rejected.
    pub fn start(self: &Arc<Self>, sink: Arc<dyn EventSink>) -> Result<()> {
        let channels = self
            .channels
            .lock()
            .expect("scheduler channels lock poisoned")
            .take()
            .ok_or_else(|| Error::Internal("download manager already started".to_string()))?;

        let mut workers = self.workers.lock().expect("scheduler workers lock poisoned");
        workers.push(tokio::spawn(
            self.clone().run_admission_loop(channels.queue_rx),
        ));
        workers.push(tokio::spawn(
            self.clone().run_event_pump(channels.events_rx, sink),
        ));
        workers.push(tokio::spawn(self.clone().run_expiry_sweeper()));

        tracing::info!(
            "Download manager started (max {} concurrent downloads)",
            self.max_concurrent
        );
        Ok(())
    }

    /// Stop the background workers. In-flight extractor processes are left
    /// to their own cooperative cancellation.
    pub fn shutdown(&self) {
        let mut workers = self.workers.lock().expect("scheduler workers lock poisoned");
        for handle in workers.drain(..) {
            handle.abort();
        }
        tracing::info!("Download manager stopped");
    }

    /// Create a pending session and enqueue it for admission.
    ///
    /// Fails with `DuplicateSession` when the id is already present; the
    /// existing session is left untouched.
    pub fn create_session(
        &self,
        url: &str,
        session_id: &str,
        format_id: Option<String>,
    ) -> Result<Session> {
        let mut state = self.state();
        if state.sessions.contains_key(session_id) {
            return Err(Error::DuplicateSession(session_id.to_string()));
        }

        let session = Session::new(url, session_id, format_id);
        state
            .sessions
            .insert(session_id.to_string(), session.clone());

        if self.queue_tx.send(session_id.to_string()).is_err() {
            state.sessions.remove(session_id);
            return Err(Error::Internal(
                "download queue is no longer accepting jobs".to_string(),
            ));
        }
        state.queued += 1;

        tracing::info!("Queued download session {} for {}", session_id, url);
        Ok(session)
    }

    /// Look up a session snapshot. Pure read, no mutation.
    pub fn get_session(&self, session_id: &str) -> Option<Session> {
        self.state().sessions.get(session_id).cloned()
    }

    /// Remove a session regardless of state, releasing its concurrency slot
    /// if it held one. The extraction engine is signalled to stop through
    /// the session's cancel flag; whether it halts promptly is up to it.
    ///
    /// Returns the removed record, marked cancelled when it was still live.
    pub fn remove_session(&self, session_id: &str) -> Option<Session> {
        let mut state = self.state();
        let mut session = state.sessions.remove(session_id)?;
        if let Some(cancel_flag) = state.active.remove(session_id) {
            cancel_flag.store(true, Ordering::Relaxed);
        }
        if session.is_active() {
            session.cancel();
        }
        tracing::info!("Removed download session {}", session_id);
        Some(session)
    }

    /// Number of downloads currently occupying a concurrency slot.
    pub fn active_count(&self) -> usize {
        self.state().active.len()
    }

    /// Number of sessions enqueued but not yet admitted.
    pub fn queue_depth(&self) -> usize {
        self.state().queued
    }

    /// Remove every session older than `max_age` that is not active.
    /// Active sessions are never swept regardless of age.
    ///
    /// Returns the number of sessions removed.
    pub fn sweep_expired(&self, max_age: chrono::Duration) -> usize {
        let now = Utc::now();
        let mut state = self.state();

        let expired: Vec<String> = state
            .sessions
            .iter()
            .filter(|(_, session)| !session.is_active() && session.age(now) > max_age)
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &expired {
            state.sessions.remove(session_id);
            tracing::debug!("Swept expired session {}", session_id);
        }
        expired.len()
    }

    /// The admission loop: waits for a free slot, then admits queued
    /// sessions in FIFO order. Entries whose session was cancelled or
    /// removed while queued are discarded without starting execution.
    async fn run_admission_loop(
        self: Arc<Self>,
        mut queue_rx: mpsc::UnboundedReceiver<String>,
    ) {
        loop {
            // Deliberate backpressure, not a busy spin.
            while self.active_count() >= self.max_concurrent {
                tokio::time::sleep(ADMISSION_POLL_INTERVAL).await;
            }

            let Some(session_id) = queue_rx.recv().await else {
                break;
            };

            let admitted = {
                let mut state = self.state();
                let state = &mut *state;
                state.queued = state.queued.saturating_sub(1);
                match state.sessions.get_mut(&session_id) {
                    Some(session) if session.is_active() => {
                        session.admit();
                        let cancel_flag = Arc::new(AtomicBool::new(false));
                        state
                            .active
                            .insert(session_id.clone(), cancel_flag.clone());
                        Some((session.url.clone(), session.format_id.clone(), cancel_flag))
                    }
                    _ => None,
                }
            };

            let Some((url, format_id, cancel_flag)) = admitted else {
                tracing::debug!(
                    "Discarding queue entry for inactive session {}",
                    session_id
                );
                continue;
            };

            tracing::info!("Admitted download session {}", session_id);
            tokio::spawn(
                self.clone()
                    .run_execution(session_id, url, format_id, cancel_flag),
            );
        }
    }

    /// Drive one admitted download to a terminal event. The slot guard
    /// releases the concurrency slot on every exit path, including panics
    /// inside the extraction engine.
    async fn run_execution(
        self: Arc<Self>,
        session_id: String,
        url: String,
        format_id: Option<String>,
        cancel_flag: Arc<AtomicBool>,
    ) {
        let _slot = SlotGuard {
            manager: self.as_ref(),
            session_id: &session_id,
        };

        let sink = ProgressSink::new(session_id.clone(), self.events_tx.clone());
        let request = DownloadRequest {
            url,
            format_id,
            cancelled: cancel_flag,
        };

        match self.extractor.download(&request, &sink).await {
            Ok(outcome) => {
                sink.send(ProgressUpdate::Complete {
                    file_path: outcome.file_path,
                })
                .await;
            }
            Err(e) => {
                tracing::warn!("Download session {} failed: {}", session_id, e);
                sink.send(ProgressUpdate::Error {
                    message: e.client_message(),
                })
                .await;
            }
        }
    }

    /// The event pump: the single consumer of the progress channel. Applies
    /// each event to its session and forwards it to the sink for delivery.
    async fn run_event_pump(
        self: Arc<Self>,
        mut events_rx: mpsc::Receiver<SessionEvent>,
        sink: Arc<dyn EventSink>,
    ) {
        while let Some(SessionEvent { session_id, update }) = events_rx.recv().await {
            // Mutation happens under the state lock; delivery does not.
            if self.apply_update(&session_id, &update) {
                sink.deliver(&session_id, &update).await;
            }
        }
    }

    /// Apply one progress event to its session. Returns false when the
    /// event must be dropped: the session was removed, or it already
    /// reached a terminal state.
    fn apply_update(&self, session_id: &str, update: &ProgressUpdate) -> bool {
        let mut state = self.state();
        let Some(session) = state.sessions.get_mut(session_id) else {
            tracing::debug!(
                "Dropping progress event for unknown session {}",
                session_id
            );
            return false;
        };
        if session.status.is_terminal() {
            return false;
        }

        match update {
            ProgressUpdate::Downloading {
                downloaded_bytes,
                total_bytes,
                speed,
                eta,
            } => {
                session.update_progress(*downloaded_bytes, *total_bytes, *speed, *eta);
            }
            ProgressUpdate::Processing => {}
            ProgressUpdate::Complete { file_path } => {
                session.complete(file_path.clone());
                tracing::info!(
                    "Download session {} completed: {}",
                    session_id,
                    file_path.display()
                );
            }
            ProgressUpdate::Error { message } => {
                session.fail(message.clone());
            }
        }

        if update.is_terminal() {
            state.active.remove(session_id);
        }
        true
    }

    /// Periodically sweep sessions past the configured expiry age.
    async fn run_expiry_sweeper(self: Arc<Self>) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let swept = self.sweep_expired(self.session_expiry);
            if swept > 0 {
                tracing::info!("Swept {} expired download sessions", swept);
            }
        }
    }
}

/// Releases a concurrency slot when dropped. Removing the map entry twice
/// is harmless, so the guard and the event pump can both release.
struct SlotGuard<'a> {
    manager: &'a DownloadManager,
    session_id: &'a str,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.manager.state().active.remove(self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::DownloadOutcome;
    use crate::session::state::DownloadStatus;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct UnusedExtractor;

    #[async_trait]
    impl MediaExtractor for UnusedExtractor {
        async fn fetch_info(&self, _url: &str) -> crate::error::Result<crate::media::MediaInfo> {
            Err(Error::MediaSource("not available in tests".to_string()))
        }

        async fn download(
            &self,
            _request: &DownloadRequest,
            _progress: &ProgressSink,
        ) -> crate::error::Result<DownloadOutcome> {
            Err(Error::Execution("not available in tests".to_string()))
        }
    }

    struct NoopSink;

    #[async_trait]
    impl EventSink for NoopSink {
        async fn deliver(&self, _session_id: &str, _update: &ProgressUpdate) {}
    }

    fn test_manager() -> Arc<DownloadManager> {
        DownloadManager::new(Arc::new(UnusedExtractor), &Config::default())
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let manager = test_manager();
        let session = manager
            .create_session("https://youtu.be/abc", "conn-1", None)
            .unwrap();
        assert_eq!(session.status, DownloadStatus::Pending);
        assert_eq!(manager.queue_depth(), 1);
        assert_eq!(manager.active_count(), 0);

        let looked_up = manager.get_session("conn-1").unwrap();
        assert_eq!(looked_up.url, "https://youtu.be/abc");
    }

    #[tokio::test]
    async fn test_duplicate_session_rejected() {
        let manager = test_manager();
        manager
            .create_session("https://youtu.be/abc", "conn-1", None)
            .unwrap();
        let err = manager
            .create_session("https://youtu.be/other", "conn-1", None)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateSession(_)));

        // The original session is untouched
        let original = manager.get_session("conn-1").unwrap();
        assert_eq!(original.url, "https://youtu.be/abc");
    }

    #[tokio::test]
    async fn test_remove_session_marks_cancelled() {
        let manager = test_manager();
        manager
            .create_session("https://youtu.be/abc", "conn-1", None)
            .unwrap();

        let removed = manager.remove_session("conn-1").unwrap();
        assert_eq!(removed.status, DownloadStatus::Cancelled);
        assert!(manager.get_session("conn-1").is_none());

        // Idempotent for unknown ids
        assert!(manager.remove_session("conn-1").is_none());
    }

    #[tokio::test]
    async fn test_apply_update_zero_total() {
        let manager = test_manager();
        manager
            .create_session("https://youtu.be/abc", "s1", None)
            .unwrap();

        let applied = manager.apply_update(
            "s1",
            &ProgressUpdate::Downloading {
                downloaded_bytes: 4096,
                total_bytes: 0,
                speed: 0.0,
                eta: 0,
            },
        );
        assert!(applied);
        assert_eq!(manager.get_session("s1").unwrap().progress, 0.0);
    }

    #[tokio::test]
    async fn test_apply_update_for_unknown_session_is_dropped() {
        let manager = test_manager();
        let applied = manager.apply_update(
            "ghost",
            &ProgressUpdate::Error {
                message: "boom".to_string(),
            },
        );
        assert!(!applied);
    }

    #[tokio::test]
    async fn test_no_transition_out_of_terminal_state() {
        let manager = test_manager();
        manager
            .create_session("https://youtu.be/abc", "s1", None)
            .unwrap();

        manager.apply_update(
            "s1",
            &ProgressUpdate::Complete {
                file_path: PathBuf::from("/tmp/a.mp4"),
            },
        );
        let applied = manager.apply_update(
            "s1",
            &ProgressUpdate::Error {
                message: "late error".to_string(),
            },
        );
        assert!(!applied);
        let session = manager.get_session("s1").unwrap();
        assert_eq!(session.status, DownloadStatus::Completed);
    }

    #[tokio::test]
    async fn test_sweep_removes_terminal_but_not_active() {
        let manager = test_manager();
        manager
            .create_session("https://youtu.be/done", "done", None)
            .unwrap();
        manager
            .create_session("https://youtu.be/live", "live", None)
            .unwrap();

        manager.apply_update(
            "done",
            &ProgressUpdate::Complete {
                file_path: PathBuf::from("/tmp/done.mp4"),
            },
        );

        let swept = manager.sweep_expired(chrono::Duration::zero());
        assert_eq!(swept, 1);
        assert!(manager.get_session("done").is_none());
        assert!(manager.get_session("live").is_some());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let manager = test_manager();
        manager.start(Arc::new(NoopSink)).unwrap();
        assert!(manager.start(Arc::new(NoopSink)).is_err());
        manager.shutdown();
    }
}
