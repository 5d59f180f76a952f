//! vidfetch - a media download service powered by yt-dlp.
//!
//! Clients submit download jobs over a WebSocket and receive live progress
//! updates; jobs are queued and admitted under a global concurrency cap.
//!
//! # Features
//!
//! - FIFO download queue with a configurable concurrency cap
//! - Per-session lifecycle tracking (pending/downloading/completed/failed/cancelled)
//! - Live progress streaming over WebSockets
//! - Metadata probing and format selection via yt-dlp
//! - Size-limit enforcement with artifact cleanup
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vidfetch::config::Config;
//! use vidfetch::extractor::YtDlpExtractor;
//! use vidfetch::server::ConnectionRegistry;
//! use vidfetch::session::DownloadManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let rt = tokio::runtime::Runtime::new()?;
//! # rt.block_on(async {
//! let config = Config::default();
//! let extractor = Arc::new(YtDlpExtractor::new(&config));
//! let manager = DownloadManager::new(extractor, &config);
//! let registry = ConnectionRegistry::new(manager.clone());
//! manager.start(registry.clone())?;
//! // ... build the router and serve
//! # Ok::<(), vidfetch::error::Error>(())
//! # })?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fs;
pub mod media;
pub mod output;
pub mod server;
pub mod session;

// Re-exports for convenience
pub use config::Config;
pub use error::{Error, Result};
pub use extractor::{DownloadOutcome, DownloadRequest, MediaExtractor, YtDlpExtractor};
pub use media::{MediaFormat, MediaInfo};
pub use server::{ConnectionRegistry, OutboundEvent};
pub use session::{DownloadManager, DownloadStatus, Session};
