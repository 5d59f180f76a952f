//! Extraction engine backed by the yt-dlp binary.
//!
//! Metadata probes use `-J`; downloads run with `--newline` so progress can
//! be parsed line by line from stdout. The final info JSON (`--print-json`)
//! supplies title and metadata for naming the artifact.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extractor::progress::{is_postprocessing_line, ProgressParser};
use crate::extractor::{DownloadOutcome, DownloadRequest, MediaExtractor};
use crate::fs::paths::{cleanup_temp_files, move_to_downloads};
use crate::media::url::validate_media_url;
use crate::media::{MediaFormat, MediaInfo};
use crate::session::{ProgressSink, ProgressUpdate};

/// How often the cancel flag is polled while waiting for output.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How many stderr lines are kept for error reporting.
const STDERR_TAIL_LINES: usize = 50;

/// Download engine that shells out to yt-dlp.
pub struct YtDlpExtractor {
    binary: String,
    temp_dir: PathBuf,
    downloads_dir: PathBuf,
    max_file_size: u64,
}

impl YtDlpExtractor {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.downloads.ytdlp_path.clone(),
            temp_dir: config.temp_directory(),
            downloads_dir: config.download_directory(),
            max_file_size: config.downloads.max_file_size_bytes,
        }
    }

    async fn run_download(
        &self,
        request: &DownloadRequest,
        progress: &ProgressSink,
    ) -> Result<DownloadOutcome> {
        std::fs::create_dir_all(&self.temp_dir)?;

        // yt-dlp picks the extension; find the artifact by its stem later.
        let stem = format!("dl_{}", Uuid::new_v4().simple());
        let template = self.temp_dir.join(format!("{}.%(ext)s", stem));
        let format_selector = request.format_id.clone().unwrap_or_else(|| "best".to_string());

        let mut child = Command::new(&self.binary)
            .arg("--newline")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--no-colors")
            .arg("--print-json")
            .args(["-f", format_selector.as_str()])
            .arg("-o")
            .arg(&template)
            .arg(&request.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::MediaSource(format!("could not run {}: {}", self.binary, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("child stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("child stderr was not captured".to_string()))?;

        // Collect a stderr tail for error classification without blocking
        // the progress loop.
        let stderr_task = tokio::spawn(async move {
            let mut tail = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("yt-dlp stderr: {}", line);
                if tail.len() >= STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail
        });

        let parser = ProgressParser::new();
        let mut info_json: Option<serde_json::Value> = None;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            // Cooperative cancellation: poll the flag while waiting for
            // the next output line.
            let line = match tokio::time::timeout(CANCEL_POLL_INTERVAL, lines.next_line()).await {
                Err(_) => {
                    if request.is_cancelled() {
                        tracing::info!("Killing yt-dlp for cancelled download of {}", request.url);
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        cleanup_artifacts(&self.temp_dir, &stem);
                        return Err(Error::Execution("download cancelled".to_string()));
                    }
                    continue;
                }
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    tracing::warn!("Error reading yt-dlp output: {}", e);
                    break;
                }
            };

            if line.starts_with('{') {
                info_json = serde_json::from_str(&line).ok();
            } else if let Some(p) = parser.parse(&line) {
                progress
                    .send(ProgressUpdate::Downloading {
                        downloaded_bytes: p.downloaded_bytes,
                        total_bytes: p.total_bytes,
                        speed: p.speed,
                        eta: p.eta,
                    })
                    .await;
            } else if is_postprocessing_line(&line) {
                progress.send(ProgressUpdate::Processing).await;
            }
        }

        let status = child.wait().await?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            cleanup_artifacts(&self.temp_dir, &stem);
            return Err(classify_engine_error(&stderr_tail.join("\n")));
        }

        let artifact = find_artifact(&self.temp_dir, &stem)?;

        let file_size = std::fs::metadata(&artifact)?.len();
        if file_size > self.max_file_size {
            let _ = std::fs::remove_file(&artifact);
            return Err(Error::Execution(format!(
                "video exceeds the size limit of {} bytes",
                self.max_file_size
            )));
        }

        let title = info_json
            .as_ref()
            .and_then(|v| v.get("title"))
            .and_then(|v| v.as_str())
            .unwrap_or("video")
            .to_string();
        let duration = info_json
            .as_ref()
            .and_then(|v| v.get("duration"))
            .and_then(|v| v.as_f64())
            .map(|d| d as u64);
        let uploader = info_json
            .as_ref()
            .and_then(|v| v.get("uploader"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let extension = artifact
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4")
            .to_string();
        let final_name = format!("{}.{}", title, extension);
        let final_path = move_to_downloads(&artifact, &final_name, &self.downloads_dir)?;
        let mime_type = mime_guess::from_path(&final_path)
            .first()
            .map(|m| m.to_string());

        cleanup_temp_files(&self.temp_dir);

        Ok(DownloadOutcome {
            file_path: final_path,
            title,
            duration,
            uploader,
            file_size,
            mime_type,
        })
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn fetch_info(&self, url: &str) -> Result<MediaInfo> {
        validate_media_url(url)?;

        let output = Command::new(&self.binary)
            .arg("-J")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::MediaSource(format!("could not run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_engine_error(&stderr));
        }

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::MediaSource(format!("unreadable metadata from yt-dlp: {}", e)))?;
        parse_info_json(&value)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: &ProgressSink,
    ) -> Result<DownloadOutcome> {
        validate_media_url(&request.url)?;
        self.run_download(request, progress).await
    }
}

/// Build a `MediaInfo` from a yt-dlp `-J` info dict.
fn parse_info_json(value: &serde_json::Value) -> Result<MediaInfo> {
    let as_str = |key: &str| value.get(key).and_then(|v| v.as_str()).map(String::from);

    let formats = value
        .get("formats")
        .and_then(|v| v.as_array())
        .map(|entries| entries.iter().map(parse_format_json).collect::<Vec<_>>())
        .unwrap_or_default();

    if formats.is_empty() {
        return Err(Error::MediaSource(
            "no downloadable formats were found".to_string(),
        ));
    }

    Ok(MediaInfo {
        id: as_str("id").unwrap_or_default(),
        title: as_str("title").unwrap_or_else(|| "video".to_string()),
        description: as_str("description"),
        duration: value
            .get("duration")
            .and_then(|v| v.as_f64())
            .map(|d| d as u64),
        thumbnail: as_str("thumbnail"),
        uploader: as_str("uploader"),
        formats,
    })
}

fn parse_format_json(entry: &serde_json::Value) -> MediaFormat {
    let as_str = |key: &str| entry.get(key).and_then(|v| v.as_str()).map(String::from);

    let vcodec = as_str("vcodec").unwrap_or_else(|| "none".to_string());
    let acodec = as_str("acodec").unwrap_or_else(|| "none".to_string());

    // Fall back to explicit dimensions when no resolution string is given
    let resolution = as_str("resolution").or_else(|| {
        let width = entry.get("width").and_then(|v| v.as_u64())?;
        let height = entry.get("height").and_then(|v| v.as_u64())?;
        Some(format!("{}x{}", width, height))
    });

    let format_note = if vcodec == "none" && acodec != "none" {
        "audio only".to_string()
    } else if acodec == "none" && vcodec != "none" {
        "video only".to_string()
    } else {
        as_str("format_note").unwrap_or_default()
    };

    MediaFormat {
        format_id: as_str("format_id").unwrap_or_default(),
        ext: as_str("ext").unwrap_or_default(),
        resolution,
        filesize: entry.get("filesize").and_then(|v| v.as_u64()),
        vcodec,
        acodec,
        format_note,
        fps: entry.get("fps").and_then(|v| v.as_f64()),
        tbr: entry.get("tbr").and_then(|v| v.as_f64()),
    }
}

/// Map yt-dlp stderr output onto the error taxonomy with a message that is
/// safe and useful for the client.
fn classify_engine_error(stderr: &str) -> Error {
    let lowered = stderr.to_lowercase();

    if lowered.contains("unsupported url") || lowered.contains("is not a valid url") {
        return Error::Validation("this URL is not supported".to_string());
    }
    if lowered.contains("video unavailable") {
        return Error::MediaSource("the video is unavailable or has been removed".to_string());
    }
    if lowered.contains("private video") {
        return Error::MediaSource("this video is private".to_string());
    }
    if lowered.contains("sign in") || lowered.contains("login required") {
        return Error::MediaSource("this video requires signing in".to_string());
    }
    if lowered.contains("unable to download") {
        return Error::MediaSource("unable to download video data".to_string());
    }

    let last_line = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("yt-dlp exited with an error");
    Error::Execution(last_line.trim().to_string())
}

/// Locate the artifact yt-dlp produced for the given filename stem.
/// Partial `.part`/`.ytdl` files are ignored.
fn find_artifact(temp_dir: &Path, stem: &str) -> Result<PathBuf> {
    let entries = std::fs::read_dir(temp_dir)?;

    let mut best: Option<(u64, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if !name.starts_with(stem) || name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if best.as_ref().is_none_or(|(s, _)| size > *s) {
            best = Some((size, path));
        }
    }

    best.map(|(_, path)| path).ok_or_else(|| {
        Error::Execution("download finished but no artifact was produced".to_string())
    })
}

/// Remove everything the download left behind, including partial files.
fn cleanup_artifacts(temp_dir: &Path, stem: &str) {
    let entries = match std::fs::read_dir(temp_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(stem));
        if is_ours {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove partial file {}: {}", path.display(), e);
            }
        }
    }
}
