//! Thin wrappers around the `git` command line.
//!
//! Every helper treats "git is not installed" and "not a repository" the
//! same way: there is no version control information.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Commit time (seconds since the epoch) of the last commit touching `path`.
///
/// Returns `None` when the path is untracked, has no commits, or is not
/// inside a repository.
pub fn commit_time(path: &Path) -> Option<i64> {
    let (dir, target) = split_for_git(path);
    let output = git(&dir, &["log", "-1", "--format=%at", "--"], Some(&target))?;
    let text = String::from_utf8(output).ok()?;
    text.trim().parse().ok()
}

/// Files under `dir` that git ignores, relative to `dir`.
pub fn ignored_files(dir: &Path) -> Option<BTreeSet<PathBuf>> {
    let output = git(
        dir,
        &["ls-files", "-z", "--others", "--ignored", "--exclude-standard"],
        None,
    )?;
    Some(split_nul(&output))
}

/// Tracked files under `dir` whose content differs from `HEAD`, relative to `dir`.
pub fn modified_files(dir: &Path) -> Option<BTreeSet<PathBuf>> {
    let output = git(dir, &["diff", "-z", "--name-only", "--relative", "HEAD"], None)?;
    Some(split_nul(&output))
}

fn git(dir: &Path, args: &[&str], target: Option<&Path>) -> Option<Vec<u8>> {
    let mut command = Command::new("git");
    command
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stderr(Stdio::null());
    if let Some(target) = target {
        command.arg(target);
    }

    let output = command.output().ok()?;
    if !output.status.success() {
        tracing::trace!(dir = %dir.display(), ?args, status = ?output.status.code(), "git query failed");
        return None;
    }
    Some(output.stdout)
}

/// Split a path into the directory to run git in and the name to ask about.
fn split_for_git(path: &Path) -> (PathBuf, PathBuf) {
    if path.is_dir() {
        return (path.to_path_buf(), PathBuf::from("."));
    }
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    (dir, name)
}

fn split_nul(output: &[u8]) -> BTreeSet<PathBuf> {
    output
        .split(|b| *b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| PathBuf::from(String::from_utf8_lossy(chunk).into_owned()))
        .collect()
}
