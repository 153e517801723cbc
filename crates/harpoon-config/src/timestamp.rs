//! Build timestamps for configuration documents and context files.
//!
//! A timestamp is the commit time of the last commit touching a path when
//! version control is requested and knows about the path, and the
//! filesystem modification time otherwise.

use crate::git;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use thiserror::Error;

/// The path asked about does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Can't determine a timestamp for {}: no such file or directory", path.display())]
pub struct TimestampUnavailable {
    pub path: PathBuf,
}

/// Resolve the timestamp of `path` in seconds since the epoch.
///
/// With `use_version_control`, a path outside any repository, or one that
/// has never been committed, silently falls back to its modification time.
pub fn resolve(path: &Path, use_version_control: bool) -> Result<i64, TimestampUnavailable> {
    let metadata = fs::metadata(path).map_err(|_| TimestampUnavailable {
        path: path.to_path_buf(),
    })?;

    if use_version_control {
        if let Some(committed) = git::commit_time(path) {
            return Ok(committed);
        }
        tracing::debug!(path = %path.display(), "No commit time available, using mtime");
    }

    Ok(modified_time(&metadata))
}

/// Modification time of already-fetched metadata, in seconds since the epoch.
pub fn modified_time(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs() as i64)
}

/// A timestamp bound to a document and evaluated on demand.
///
/// The collector injects one of these as the `mtime` key of every document
/// it folds. Reading it later yields a fresh answer instead of whatever the
/// file looked like at collection time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtimeAccessor {
    path: Arc<PathBuf>,
}

impl MtimeAccessor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn resolve(&self, use_version_control: bool) -> Result<i64, TimestampUnavailable> {
        resolve(&self.path, use_version_control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::process::Command;
    use std::time::{Duration, SystemTime};

    fn set_mtime(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run_git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(["-c", "user.name=harpoon", "-c", "user.email=harpoon@example.com"])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap()
            .status;
        assert!(status.success(), "git {:?} failed", args);
    }

    #[test]
    fn test_missing_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yml");
        let err = resolve(&missing, false).unwrap_err();
        assert_eq!(err.path, missing);
        assert!(resolve(&missing, true).is_err());
    }

    #[test]
    fn test_mtime_without_version_control() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blah");
        fs::write(&path, "").unwrap();
        set_mtime(&path, 13456789);

        assert_eq!(resolve(&path, false).unwrap(), 13456789);
    }

    #[test]
    fn test_non_repository_falls_back_to_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blah");
        fs::write(&path, "").unwrap();
        set_mtime(&path, 13456789);

        assert_eq!(resolve(&path, true).unwrap(), 13456789);
    }

    #[test]
    fn test_commit_time_with_version_control() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blah");
        fs::write(&path, "").unwrap();

        run_git(dir.path(), &["init", "-q", "."]);
        run_git(dir.path(), &["add", "blah"]);
        set_mtime(&path, 13456789);
        run_git(dir.path(), &["commit", "-q", "-m", "stuff"]);

        let committed = resolve(&path, true).unwrap();
        assert_ne!(committed, 13456789);
        assert!(committed > 1_000_000_000);

        assert_eq!(resolve(&path, false).unwrap(), 13456789);
    }

    #[test]
    fn test_accessor_is_lazy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.yml");
        let accessor = MtimeAccessor::new(&path);
        assert!(accessor.resolve(false).is_err());

        fs::write(&path, "").unwrap();
        set_mtime(&path, 42);
        assert_eq!(accessor.resolve(false).unwrap(), 42);
    }
}
