//! Configuration validation logic.

use regex::Regex;

use crate::config::Config;
use crate::error::{Error, Result};

/// Validate the full configuration before the server starts.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.downloads.max_concurrent_downloads == 0 {
        return Err(Error::ConfigValidation {
            field: "downloads.max_concurrent_downloads".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    if config.downloads.max_file_size_bytes == 0 {
        return Err(Error::ConfigValidation {
            field: "downloads.max_file_size_bytes".to_string(),
            message: "must be at least 1 byte".to_string(),
        });
    }

    if config.downloads.session_expiry_hours == 0 {
        return Err(Error::ConfigValidation {
            field: "downloads.session_expiry_hours".to_string(),
            message: "must be at least 1 hour".to_string(),
        });
    }

    validate_quality(&config.downloads.preferred_quality)?;

    if config.downloads.ytdlp_path.trim().is_empty() {
        return Err(Error::ConfigValidation {
            field: "downloads.ytdlp_path".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    for origin in &config.server.cors_origins {
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(Error::ConfigValidation {
                field: "server.cors_origins".to_string(),
                message: format!("'{}' is not an http(s) origin", origin),
            });
        }
    }

    config.bind_addr()?;

    Ok(())
}

/// Validate a preferred-quality string like "720p" or "1080p".
fn validate_quality(quality: &str) -> Result<()> {
    let quality_pattern = Regex::new(r"^\d{3,4}p$").unwrap();
    if !quality_pattern.is_match(quality) {
        return Err(Error::ConfigValidation {
            field: "downloads.preferred_quality".to_string(),
            message: format!("'{}' is not a quality like '720p'", quality),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.downloads.max_concurrent_downloads = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_concurrent_downloads"));
    }

    #[test]
    fn test_quality_format() {
        assert!(validate_quality("720p").is_ok());
        assert!(validate_quality("1080p").is_ok());
        assert!(validate_quality("best").is_err());
        assert!(validate_quality("720").is_err());
    }

    #[test]
    fn test_cors_origin_must_be_http() {
        let mut config = Config::default();
        config.server.cors_origins = vec!["ftp://example.com".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_bad_host_rejected() {
        let mut config = Config::default();
        config.server.host = "not a host".to_string();
        assert!(validate_config(&config).is_err());
    }
}
