//! Media metadata returned by the extractor.

use serde::{Deserialize, Serialize};

/// A single downloadable format of a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFormat {
    /// Extractor-specific format identifier.
    pub format_id: String,

    /// File extension (without dot).
    pub ext: String,

    /// Resolution, either "WIDTHxHEIGHT" or "HEIGHTp" when known.
    pub resolution: Option<String>,

    /// File size in bytes, when reported.
    pub filesize: Option<u64>,

    /// Video codec ("none" for audio-only streams).
    pub vcodec: String,

    /// Audio codec ("none" for video-only streams).
    pub acodec: String,

    /// Human-readable format note.
    pub format_note: String,

    /// Frames per second.
    pub fps: Option<f64>,

    /// Total bitrate in kbit/s.
    pub tbr: Option<f64>,
}

impl MediaFormat {
    /// Whether this format carries only a video stream.
    pub fn is_video_only(&self) -> bool {
        self.acodec == "none" && self.vcodec != "none"
    }

    /// Whether this format carries only an audio stream.
    pub fn is_audio_only(&self) -> bool {
        self.vcodec == "none" && self.acodec != "none"
    }

    /// Whether this format carries both audio and video.
    pub fn is_combined(&self) -> bool {
        self.vcodec != "none" && self.acodec != "none"
    }

    /// Vertical resolution in pixels, parsed from the resolution string.
    pub fn height(&self) -> Option<u32> {
        let resolution = self.resolution.as_deref()?;
        if let Some((_, height)) = resolution.split_once('x') {
            return height.parse().ok();
        }
        resolution.strip_suffix('p').and_then(|h| h.parse().ok())
    }
}

/// Metadata of a single video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Platform video ID.
    pub id: String,

    /// Video title.
    pub title: String,

    /// Description text, when available.
    pub description: Option<String>,

    /// Duration in seconds.
    pub duration: Option<u64>,

    /// Thumbnail URL.
    pub thumbnail: Option<String>,

    /// Channel or uploader name.
    pub uploader: Option<String>,

    /// All formats reported by the extractor.
    pub formats: Vec<MediaFormat>,
}

/// Pick the best format for a preferred quality like "720p".
///
/// Formats whose resolution mentions the preferred quality win outright,
/// combined streams first, highest bitrate breaking ties. Otherwise the
/// highest resolution not above the target is chosen, falling back to the
/// lowest available one.
pub fn select_best_format<'a>(
    formats: &'a [MediaFormat],
    prefer_quality: &str,
) -> Option<&'a MediaFormat> {
    if formats.is_empty() {
        return None;
    }

    let by_tbr = |f: &&MediaFormat| (f.tbr.unwrap_or(0.0) * 1000.0) as u64;

    let matching: Vec<&MediaFormat> = formats
        .iter()
        .filter(|f| {
            f.resolution
                .as_deref()
                .is_some_and(|r| r.contains(prefer_quality))
        })
        .collect();

    if !matching.is_empty() {
        let combined: Vec<&MediaFormat> =
            matching.iter().copied().filter(|f| f.is_combined()).collect();
        if !combined.is_empty() {
            return combined.into_iter().max_by_key(by_tbr);
        }
        return matching.into_iter().max_by_key(by_tbr);
    }

    let target_height: u32 = prefer_quality
        .strip_suffix('p')
        .and_then(|h| h.parse().ok())
        .unwrap_or(720);

    let mut sized: Vec<&MediaFormat> = formats.iter().filter(|f| f.height().is_some()).collect();
    if sized.is_empty() {
        return None;
    }
    sized.sort_by(|a, b| b.height().cmp(&a.height()));

    sized
        .iter()
        .find(|f| f.height().is_some_and(|h| h <= target_height))
        .copied()
        .or_else(|| sized.last().copied())
}
