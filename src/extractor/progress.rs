//! Parsing of yt-dlp progress output.
//!
//! With `--newline`, yt-dlp prints one progress line per update:
//!
//! ```text
//! [download]  42.5% of 10.00MiB at 512.00KiB/s ETA 00:12
//! [download]  42.5% of ~10.00MiB at Unknown B/s ETA Unknown
//! [download] 100% of 10.00MiB in 00:00:20 at 523.23KiB/s
//! ```

use regex::Regex;

/// One parsed `[download]` progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    /// Bytes per second; 0 when yt-dlp reports "Unknown".
    pub speed: f64,
    /// Seconds remaining; 0 when unknown.
    pub eta: u64,
}

/// Compiled matchers for yt-dlp output lines. Build once per download.
pub struct ProgressParser {
    progress: Regex,
}

impl ProgressParser {
    pub fn new() -> Self {
        let progress = Regex::new(
            r"^\[download\]\s+(?P<percent>\d+(?:\.\d+)?)%\s+of\s+~?\s*(?P<total>\d+(?:\.\d+)?)(?P<unit>[KMGT]?i?B)(?:\s+at\s+(?P<speed>\d+(?:\.\d+)?)(?P<speed_unit>[KMGT]?i?B)/s)?(?:.*?ETA\s+(?P<eta>[\d:]+))?",
        )
        .unwrap();
        Self { progress }
    }

    /// Parse one stdout line; returns None for non-progress lines.
    pub fn parse(&self, line: &str) -> Option<DownloadProgress> {
        let caps = self.progress.captures(line)?;

        let percent: f64 = caps.name("percent")?.as_str().parse().ok()?;
        let total_value: f64 = caps.name("total")?.as_str().parse().ok()?;
        let total_bytes = (total_value * unit_multiplier(caps.name("unit")?.as_str())) as u64;
        let downloaded_bytes = (total_bytes as f64 * percent / 100.0) as u64;

        let speed = match (caps.name("speed"), caps.name("speed_unit")) {
            (Some(value), Some(unit)) => value
                .as_str()
                .parse::<f64>()
                .map(|v| v * unit_multiplier(unit.as_str()))
                .unwrap_or(0.0),
            _ => 0.0,
        };

        let eta = caps
            .name("eta")
            .and_then(|m| parse_clock(m.as_str()))
            .unwrap_or(0);

        Some(DownloadProgress {
            downloaded_bytes,
            total_bytes,
            speed,
            eta,
        })
    }
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a line announces a post-processing step (merge, remux, ...).
pub fn is_postprocessing_line(line: &str) -> bool {
    line.starts_with("[Merger]")
        || line.starts_with("[ExtractAudio]")
        || line.starts_with("[VideoConvertor]")
        || line.starts_with("[VideoRemuxer]")
        || line.starts_with("[FixupM4a]")
        || line.starts_with("[FixupM3u8]")
}

fn unit_multiplier(unit: &str) -> f64 {
    match unit {
        "B" => 1.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    }
}

/// Parse a clock string like "12", "01:23" or "1:02:03" into seconds.
fn parse_clock(raw: &str) -> Option<u64> {
    let mut seconds: u64 = 0;
    for part in raw.split(':') {
        seconds = seconds.checked_mul(60)?.checked_add(part.parse().ok()?)?;
    }
    Some(seconds)
}
