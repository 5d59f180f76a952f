//! Media URL handling and metadata types.

pub mod info;
pub mod url;

pub use info::{select_best_format, MediaFormat, MediaInfo};
pub use url::{extract_video_id, validate_media_url, Platform};
