//! Shared test harness: a scripted extraction engine and a recording sink.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use vidfetch::error::{Error, Result};
use vidfetch::extractor::{DownloadOutcome, DownloadRequest, MediaExtractor};
use vidfetch::media::MediaInfo;
use vidfetch::session::{EventSink, ProgressSink, ProgressUpdate};

/// What a scripted download should do for one URL.
#[derive(Debug, Clone)]
pub enum Script {
    /// Report 50% progress, then succeed with this artifact path.
    Succeed(PathBuf),
    /// Fail with this message.
    Fail(String),
    /// Park until `release` is called for the URL, then succeed.
    BlockThenSucceed(PathBuf),
}

/// Extraction engine driven by per-URL scripts.
#[derive(Default)]
pub struct ScriptedExtractor {
    scripts: Mutex<HashMap<String, Script>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    started: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, url: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), script);
    }

    /// Unblock a `BlockThenSucceed` download. Safe to call early; the
    /// permit is stored.
    pub fn release(&self, url: &str) {
        self.gate(url).notify_one();
    }

    /// URLs whose download actually started, in order.
    pub fn started_urls(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    fn gate(&self, url: &str) -> Arc<Notify> {
        self.gates
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl MediaExtractor for ScriptedExtractor {
    async fn fetch_info(&self, _url: &str) -> Result<MediaInfo> {
        Err(Error::MediaSource("not scripted".to_string()))
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: &ProgressSink,
    ) -> Result<DownloadOutcome> {
        self.started.lock().unwrap().push(request.url.clone());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Script::Fail(format!("no script for {}", request.url)));

        let file_path = match script {
            Script::Fail(message) => return Err(Error::Execution(message)),
            Script::BlockThenSucceed(path) => {
                let gate = self.gate(&request.url);
                gate.notified().await;
                path
            }
            Script::Succeed(path) => {
                progress
                    .send(ProgressUpdate::Downloading {
                        downloaded_bytes: 50,
                        total_bytes: 100,
                        speed: 1024.0,
                        eta: 1,
                    })
                    .await;
                path
            }
        };

        Ok(DownloadOutcome {
            file_path,
            title: "scripted".to_string(),
            duration: Some(60),
            uploader: None,
            file_size: 100,
            mime_type: Some("video/mp4".to_string()),
        })
    }
}

/// Event sink that records everything it is asked to deliver.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, ProgressUpdate)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(String, ProgressUpdate)> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, session_id: &str) -> Vec<ProgressUpdate> {
        self.events()
            .into_iter()
            .filter(|(id, _)| id == session_id)
            .map(|(_, update)| update)
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&self, session_id: &str, update: &ProgressUpdate) {
        self.events
            .lock()
            .unwrap()
            .push((session_id.to_string(), update.clone()));
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}
