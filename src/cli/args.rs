//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// vidfetch server CLI.
#[derive(Parser, Debug)]
#[command(
    name = "vidfetch",
    version,
    about = "Media download service powered by yt-dlp",
    long_about = "A web service that downloads videos from supported platforms.\n\n\
                  Clients submit jobs over a WebSocket and receive live progress updates;\n\
                  downloads are queued and run under a global concurrency cap."
)]
pub struct Args {
    /// Address to bind the server to.
    #[arg(long, env = "VIDFETCH_HOST")]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "VIDFETCH_PORT")]
    pub port: Option<u16>,

    /// Base directory for downloads.
    #[arg(short = 'd', long = "directory")]
    pub download_directory: Option<PathBuf>,

    /// Maximum number of downloads running at the same time.
    #[arg(long = "max-concurrent")]
    pub max_concurrent_downloads: Option<usize>,

    /// Path to the yt-dlp binary.
    #[arg(long = "ytdlp", env = "VIDFETCH_YTDLP")]
    pub ytdlp_path: Option<String>,

    /// Directory with static frontend assets to serve.
    #[arg(long = "static-dir")]
    pub static_directory: Option<PathBuf>,

    /// Path to configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }

        if let Some(port) = self.port {
            config.server.port = port;
        }

        if let Some(dir) = self.download_directory {
            config.downloads.download_directory = Some(dir);
        }

        if let Some(max) = self.max_concurrent_downloads {
            config.downloads.max_concurrent_downloads = max;
        }

        if let Some(ytdlp) = self.ytdlp_path {
            config.downloads.ytdlp_path = ytdlp;
        }

        if let Some(static_dir) = self.static_directory {
            config.server.static_directory = Some(static_dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overrides_only_provided_values() {
        let args = Args {
            host: None,
            port: Some(9000),
            download_directory: None,
            max_concurrent_downloads: Some(5),
            ytdlp_path: None,
            static_directory: None,
            config: PathBuf::from("config.toml"),
            debug: false,
        };

        let mut config = Config::default();
        args.merge_into_config(&mut config);

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.downloads.max_concurrent_downloads, 5);
        // Untouched values keep their defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.downloads.ytdlp_path, "yt-dlp");
    }
}
