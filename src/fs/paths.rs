//! Artifact path management: temp files and the downloads directory.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{Error, Result};
use crate::fs::naming::{make_unique_filename, sanitize_filename};

/// Temp files older than this are considered stale.
const TEMP_FILE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Move a finished artifact from the temp dir into the downloads directory
/// under a sanitized, collision-free name.
pub fn move_to_downloads(
    temp_file: &Path,
    final_name: &str,
    downloads_dir: &Path,
) -> Result<PathBuf> {
    if !temp_file.exists() {
        return Err(Error::Execution(format!(
            "downloaded file missing: {}",
            temp_file.display()
        )));
    }

    std::fs::create_dir_all(downloads_dir)?;
    let safe_name = sanitize_filename(final_name)?;
    let final_path = make_unique_filename(&downloads_dir.join(safe_name));

    // rename fails across filesystems; fall back to copy + remove
    if std::fs::rename(temp_file, &final_path).is_err() {
        std::fs::copy(temp_file, &final_path)?;
        std::fs::remove_file(temp_file)?;
    }

    Ok(final_path)
}

/// Remove stale files from the temp directory. Errors on individual files
/// are logged and skipped; a missing directory is not an error.
pub fn cleanup_temp_files(temp_dir: &Path) {
    let entries = match std::fs::read_dir(temp_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    let now = SystemTime::now();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let modified = entry.metadata().and_then(|m| m.modified());
        let age = modified
            .ok()
            .and_then(|t| now.duration_since(t).ok())
            .unwrap_or(Duration::ZERO);

        if age > TEMP_FILE_MAX_AGE {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove stale temp file {}: {}", path.display(), e);
            } else {
                tracing::debug!("Removed stale temp file {}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_to_downloads() {
        let temp = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();

        let artifact = temp.path().join("dl_abc.mp4");
        std::fs::write(&artifact, b"data").unwrap();

        let final_path =
            move_to_downloads(&artifact, "My Video: Part 1.mp4", downloads.path()).unwrap();

        assert!(final_path.exists());
        assert!(!artifact.exists());
        assert_eq!(
            final_path.file_name().unwrap().to_str().unwrap(),
            "My Video_ Part 1.mp4"
        );
    }

    #[test]
    fn test_move_to_downloads_collision_gets_suffix() {
        let temp = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();

        std::fs::write(downloads.path().join("video.mp4"), b"existing").unwrap();

        let artifact = temp.path().join("dl_xyz.mp4");
        std::fs::write(&artifact, b"new").unwrap();

        let final_path = move_to_downloads(&artifact, "video.mp4", downloads.path()).unwrap();
        assert_eq!(
            final_path.file_name().unwrap().to_str().unwrap(),
            "video_1.mp4"
        );
    }

    #[test]
    fn test_move_to_downloads_missing_source() {
        let downloads = tempfile::tempdir().unwrap();
        let missing = downloads.path().join("nope.mp4");
        assert!(move_to_downloads(&missing, "out.mp4", downloads.path()).is_err());
    }

    #[test]
    fn test_cleanup_ignores_fresh_files() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("dl_fresh.mp4");
        std::fs::write(&fresh, b"data").unwrap();

        cleanup_temp_files(dir.path());
        assert!(fresh.exists());
    }

    #[test]
    fn test_cleanup_missing_dir_is_ok() {
        cleanup_temp_files(Path::new("/nonexistent/vidfetch-temp"));
    }
}
