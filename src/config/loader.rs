//! Configuration structures and loading logic.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub downloads: DownloadsConfig,
}

/// HTTP/WebSocket server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by the CORS layer. Empty means same-origin only.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Directory with the static frontend assets, if any.
    #[serde(default)]
    pub static_directory: Option<PathBuf>,
}

/// Download scheduling and artifact handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Base directory for finished downloads.
    #[serde(default)]
    pub download_directory: Option<PathBuf>,

    /// Maximum number of downloads running at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Maximum artifact size in bytes; oversized downloads are deleted.
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    /// Hours after which finished sessions are swept.
    #[serde(default = "default_session_expiry")]
    pub session_expiry_hours: u64,

    /// Preferred quality used when no explicit format is requested.
    #[serde(default = "default_preferred_quality")]
    pub preferred_quality: String,

    /// Path to the yt-dlp binary.
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            static_directory: None,
        }
    }
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            download_directory: None,
            max_concurrent_downloads: default_max_concurrent(),
            max_file_size_bytes: default_max_file_size(),
            session_expiry_hours: default_session_expiry(),
            preferred_quality: default_preferred_quality(),
            ytdlp_path: default_ytdlp_path(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:8000".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_file_size() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_session_expiry() -> u64 {
    24
}

fn default_preferred_quality() -> String {
    "720p".to_string()
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one from config.example.toml",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the socket address to bind to.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| {
                Error::Config(format!(
                    "Invalid listen address {}:{}: {}",
                    self.server.host, self.server.port, e
                ))
            })
    }

    /// Get the effective download directory.
    pub fn download_directory(&self) -> PathBuf {
        self.downloads
            .download_directory
            .clone()
            .unwrap_or_else(|| {
                directories::UserDirs::new()
                    .and_then(|dirs| dirs.download_dir().map(|d| d.join("vidfetch")))
                    .unwrap_or_else(|| PathBuf::from("downloads"))
            })
    }

    /// Directory for in-progress download artifacts.
    pub fn temp_directory(&self) -> PathBuf {
        self.download_directory().join("temp")
    }

    /// Session expiry age as a chrono duration.
    pub fn session_expiry(&self) -> chrono::Duration {
        chrono::Duration::hours(self.downloads.session_expiry_hours as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.downloads.max_concurrent_downloads, 3);
        assert_eq!(config.downloads.session_expiry_hours, 24);
        assert_eq!(config.downloads.preferred_quality, "720p");
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(
            parsed.downloads.max_concurrent_downloads,
            config.downloads.max_concurrent_downloads
        );
    }

    #[test]
    fn test_config_toml_partial() {
        let toml = r#"
            [downloads]
            max_concurrent_downloads = 5
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.downloads.max_concurrent_downloads, 5);
        // Everything else falls back to defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.downloads.ytdlp_path, "yt-dlp");
    }

    #[test]
    fn test_temp_directory_under_download_directory() {
        let toml = r#"
            [downloads]
            download_directory = "/data/media"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.temp_directory(), PathBuf::from("/data/media/temp"));
    }

    #[test]
    fn test_bind_addr() {
        let config = Config::default();
        let addr = config.bind_addr().unwrap();
        assert_eq!(addr.port(), 8000);
    }
}
