//! Media URL validation and platform detection.

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};

/// Video platform recognized by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    Bilibili,
}

impl Platform {
    /// Platform name as used in logs and API responses.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Bilibili => "bilibili",
        }
    }

    fn from_host(host: &str) -> Option<Self> {
        let host = host.strip_prefix("www.").unwrap_or(host);
        if host == "youtube.com" || host == "youtu.be" || host.ends_with(".youtube.com") {
            Some(Platform::YouTube)
        } else if host == "bilibili.com" || host.ends_with(".bilibili.com") {
            Some(Platform::Bilibili)
        } else {
            None
        }
    }

    fn url_pattern(&self) -> Regex {
        match self {
            Platform::YouTube => Regex::new(
                r"^https?://(?:www\.)?(?:youtube\.com/(?:watch\?v=|shorts/)|youtu\.be/)[a-zA-Z0-9_-]+",
            )
            .unwrap(),
            Platform::Bilibili => {
                Regex::new(r"^https?://(?:www\.)?bilibili\.com/video/[a-zA-Z0-9]+").unwrap()
            }
        }
    }
}

/// Validate a media URL and detect its platform.
pub fn validate_media_url(raw: &str) -> Result<Platform> {
    if raw.trim().is_empty() {
        return Err(Error::Validation("URL must not be empty".to_string()));
    }

    let parsed = Url::parse(raw).map_err(|_| {
        Error::Validation(format!("'{}' is not a valid URL", truncate(raw, 120)))
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::Validation(format!(
            "unsupported URL scheme '{}'",
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Validation("URL has no host".to_string()))?;

    let platform = Platform::from_host(host)
        .ok_or_else(|| Error::Validation("unsupported video platform".to_string()))?;

    if !platform.url_pattern().is_match(raw) {
        return Err(Error::Validation(format!(
            "URL does not look like a {} video page",
            platform.name()
        )));
    }

    Ok(platform)
}

/// Extract the platform-specific video ID from a validated URL.
pub fn extract_video_id(raw: &str) -> Result<(String, Platform)> {
    let platform = validate_media_url(raw)?;

    let id = match platform {
        Platform::YouTube => {
            let shorts = Regex::new(r"shorts/([a-zA-Z0-9_-]+)").unwrap();
            let watch = Regex::new(r"[?&]v=([a-zA-Z0-9_-]+)").unwrap();
            let short_link = Regex::new(r"youtu\.be/([a-zA-Z0-9_-]+)").unwrap();
            shorts
                .captures(raw)
                .or_else(|| watch.captures(raw))
                .or_else(|| short_link.captures(raw))
                .map(|c| c[1].to_string())
        }
        Platform::Bilibili => Regex::new(r"video/([a-zA-Z0-9]+)")
            .unwrap()
            .captures(raw)
            .map(|c| c[1].to_string()),
    };

    id.map(|id| (id, platform))
        .ok_or_else(|| Error::Validation("could not extract a video ID from URL".to_string()))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
