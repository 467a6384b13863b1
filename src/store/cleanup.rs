use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Extensions of temp media artifacts the downloader tools leave behind,
/// including partial-download droppings.
const TEMP_MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "opus", "webm", "wav", "mp4", "ogg", "flac", "part", "ytdl",
];

/// Unmatched temp files older than this are fair game for deletion.
const STALE_AGE: Duration = Duration::from_secs(60 * 60);

/// What a cleanup pass accomplished.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deleted_files: usize,
    pub freed_bytes: u64,
}

/// Best-effort removal of temp media after a pipeline run.
///
/// Deletes files in `work_dir` whose name contains `token` (the request's
/// video id) and carries a temp-media extension, plus any file older than
/// an hour regardless of name. Younger unmatched files are someone else's
/// in-flight work and are left alone. Filesystem errors are logged and
/// swallowed; cleanup never blocks or fails the main flow.
pub fn cleanup_request(work_dir: &Path, token: &str) -> CleanupReport {
    let mut report = CleanupReport::default();

    let entries = match std::fs::read_dir(work_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cleanup could not read {}: {}", work_dir.display(), e);
            return report;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = entry.file_name();
        let name = name.to_string_lossy().to_string();
        let has_temp_ext = path
            .extension()
            .map(|ext| TEMP_MEDIA_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()))
            .unwrap_or(false);

        let matches_token = !token.is_empty() && name.contains(token) && has_temp_ext;
        let is_stale = file_age(&path)
            .map(|age| age >= STALE_AGE)
            .unwrap_or(false);

        if !matches_token && !is_stale {
            continue;
        }

        let size = path.metadata().map(|m| m.len()).unwrap_or(0);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Cleanup removed {}", path.display());
                report.deleted_files += 1;
                report.freed_bytes += size;
            }
            Err(e) => {
                tracing::warn!("Cleanup failed to remove {}: {}", path.display(), e);
            }
        }
    }

    tracing::info!(
        "Cleanup for '{}': {} files, {} bytes",
        token,
        report.deleted_files,
        report.freed_bytes
    );
    report
}

fn file_age(path: &Path) -> Option<Duration> {
    path.metadata()
        .ok()?
        .modified()
        .ok()?
        .elapsed()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backdate(path: &Path, secs_ago: u64) {
        let mtime = std::time::SystemTime::now() - Duration::from_secs(secs_ago);
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(mtime).unwrap();
    }

    #[test]
    fn test_deletes_media_matching_token() {
        let dir = tempfile::tempdir().unwrap();
        let matching = dir.path().join("vid42.mp3");
        fs_err::write(&matching, b"0123456789").unwrap();

        let report = cleanup_request(dir.path(), "vid42");
        assert_eq!(report.deleted_files, 1);
        assert_eq!(report.freed_bytes, 10);
        assert!(!matching.exists());
    }

    #[test]
    fn test_preserves_young_unmatched_files() {
        let dir = tempfile::tempdir().unwrap();
        let unrelated = dir.path().join("other.mp3");
        fs_err::write(&unrelated, b"x").unwrap();

        let report = cleanup_request(dir.path(), "vid42");
        assert_eq!(report.deleted_files, 0);
        assert!(unrelated.exists());
    }

    #[test]
    fn test_deletes_stale_files_without_token_match() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("ancient.txt");
        fs_err::write(&stale, b"x").unwrap();
        backdate(&stale, 2 * 60 * 60);

        let report = cleanup_request(dir.path(), "vid42");
        assert_eq!(report.deleted_files, 1);
        assert!(!stale.exists());
    }

    #[test]
    fn test_token_match_requires_media_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("vid42.json");
        fs_err::write(&json, b"{}").unwrap();

        cleanup_request(dir.path(), "vid42");
        assert!(json.exists(), "non-media files are not swept by token match");
    }

    #[test]
    fn test_missing_directory_is_harmless() {
        let report = cleanup_request(Path::new("/definitely/not/here"), "vid42");
        assert_eq!(report.deleted_files, 0);
        assert_eq!(report.freed_bytes, 0);
    }
}
