//! Download session scheduling.
//!
//! This module provides:
//! - Session lifecycle state tracking
//! - The download manager (queueing, concurrency cap, supervision)
//! - Progress event plumbing between execution tasks and the scheduler

pub mod events;
pub mod manager;
pub mod state;

pub use events::{EventSink, ProgressSink, ProgressUpdate, SessionEvent};
pub use manager::DownloadManager;
pub use state::{DownloadStatus, Session};
