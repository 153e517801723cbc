//! Reproducible build context archives.
//!
//! A build context is a tar stream holding the files of an image's context
//! directory, a `Dockerfile` synthesized from its instructions, and any
//! generated entries. Every header is normalized, so the same inputs and the
//! same timestamp always produce the same bytes.

use crate::error::ContextError;
use crate::image::{ContextOptions, ImageSpec};
use crate::instruction::DockerFile;
use globset::{GlobBuilder, GlobMatcher};
use harpoon_config::{git, timestamp};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};
use walkdir::WalkDir;

/// Archive path of the instruction file. Written exactly once per archive.
pub const DOCKERFILE_PATH: &str = "Dockerfile";

/// Directory name never walked into a context.
const GIT_DIR: &str = ".git";

/// A file that exists only in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub path: String,
    pub content: Vec<u8>,
    pub mode: u32,
    /// Defaults to the image's timestamp
    pub mtime: Option<i64>,
}

impl ContextEntry {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            mode: 0o644,
            mtime: None,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_mtime(mut self, mtime: i64) -> Self {
        self.mtime = Some(mtime);
        self
    }
}

/// Where an archive entry came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    /// A file or symlink in the context directory
    File(PathBuf),
    /// A context file with the same content as an earlier entry, stored as a
    /// hard link to `target`
    HardLink { source: PathBuf, target: String },
    /// The instruction file
    DockerFile,
    /// Inline content declared by the image
    Generated,
    /// An entry supplied by the caller
    Extra,
}

/// One entry written to the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub path: String,
    pub size: u64,
    pub mtime: i64,
    pub mode: u32,
    pub origin: EntryOrigin,
}

/// Manifest of a written archive, in archive order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextArchive {
    pub entries: Vec<ArchiveEntry>,
}

impl ContextArchive {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    pub fn get(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn docker_file(&self) -> Option<&ArchiveEntry> {
        self.get(DOCKERFILE_PATH)
    }
}

/// Caller choices for one archive.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Timestamp for the Dockerfile and generated entries, instead of the image's
    pub mtime: Option<i64>,
    /// Used verbatim instead of the synthesized Dockerfile
    pub docker_file: Option<DockerFile>,
}

/// Writes build context archives.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    options: BuildOptions,
}

impl ContextBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Stream the build context of `spec` into `writer`.
    ///
    /// Entries are written in this order: context directory files sorted by
    /// path, the `Dockerfile`, the image's generated entries, then `extra`.
    /// A context file whose path is taken by the `Dockerfile` or by a later
    /// entry is left out.
    /// `.git` directories are never walked. Context files sharing an inode
    /// are stored once, later paths as hard links to the first.
    pub fn build<W: Write>(
        &self,
        spec: &ImageSpec,
        extra: &[ContextEntry],
        writer: W,
    ) -> Result<ContextArchive, ContextError> {
        let later: Vec<(&ContextEntry, EntryOrigin)> = spec
            .extra_context
            .iter()
            .map(|e| (e, EntryOrigin::Generated))
            .chain(extra.iter().map(|e| (e, EntryOrigin::Extra)))
            .collect();
        let mut taken: HashSet<String> = HashSet::new();
        for (entry, _) in &later {
            if archive_path(&entry.path) == DOCKERFILE_PATH {
                return Err(ContextError::ReservedPath {
                    path: entry.path.clone(),
                });
            }
        }

        let mtime = match self.options.mtime {
            Some(mtime) => mtime,
            None => spec.mtime.resolve(spec.context.use_git)?,
        };

        let mut tar = Builder::new(writer);
        let mut archive = ContextArchive::default();

        if spec.context.enabled {
            let reserved: HashSet<&str> = later
                .iter()
                .map(|(e, _)| archive_path(&e.path))
                .chain([DOCKERFILE_PATH])
                .collect();
            for file in collect_files(&spec.context, &reserved)? {
                append_file(&mut tar, &file)?;
                taken.insert(file.path.clone());
                archive.entries.push(file.into_entry());
            }
        }

        let docker_file = self
            .options
            .docker_file
            .clone()
            .unwrap_or_else(|| spec.docker_file());
        let contents = docker_file.contents();
        let docker_entry = ArchiveEntry {
            path: DOCKERFILE_PATH.to_string(),
            size: contents.len() as u64,
            mtime: docker_file.mtime.unwrap_or(mtime),
            mode: 0o644,
            origin: EntryOrigin::DockerFile,
        };
        append_bytes(&mut tar, &docker_entry, contents.as_bytes())?;
        archive.entries.push(docker_entry);

        for (entry, origin) in later {
            let path = archive_path(&entry.path).to_string();
            if !taken.insert(path.clone()) {
                tracing::warn!(path = %path, "Duplicate context entry, keeping the first");
                continue;
            }
            let written = ArchiveEntry {
                path,
                size: entry.content.len() as u64,
                mtime: entry.mtime.unwrap_or(mtime),
                mode: entry.mode,
                origin,
            };
            append_bytes(&mut tar, &written, &entry.content)?;
            archive.entries.push(written);
        }

        tar.into_inner()?;
        tracing::debug!(
            image = %spec.name,
            entries = archive.len(),
            mtime,
            "Wrote build context"
        );
        Ok(archive)
    }
}

/// A context directory entry selected for the archive.
struct ContextFile {
    path: String,
    source: PathBuf,
    size: u64,
    mtime: i64,
    mode: u32,
    kind: FileKind,
}

enum FileKind {
    Regular,
    Symlink(PathBuf),
    /// Same inode as the earlier entry at this archive path
    HardLink(String),
}

impl ContextFile {
    fn into_entry(self) -> ArchiveEntry {
        let origin = match self.kind {
            FileKind::HardLink(target) => EntryOrigin::HardLink {
                source: self.source,
                target,
            },
            FileKind::Regular | FileKind::Symlink(_) => EntryOrigin::File(self.source),
        };
        ArchiveEntry {
            path: self.path,
            size: self.size,
            mtime: self.mtime,
            mode: self.mode,
            origin,
        }
    }
}

fn collect_files(
    options: &ContextOptions,
    reserved: &HashSet<&str>,
) -> Result<Vec<ContextFile>, ContextError> {
    let root = &options.parent_dir;
    if !root.is_dir() {
        return Err(ContextError::MissingParentDir { path: root.clone() });
    }

    let rules = ContextRules::new(&options.include, &options.exclude)?;
    let ignored: BTreeSet<PathBuf> = if options.use_gitignore {
        git::ignored_files(root).unwrap_or_default()
    } else {
        BTreeSet::new()
    };
    let modified: BTreeSet<PathBuf> = if options.use_git_timestamps {
        git::modified_files(root).unwrap_or_default()
    } else {
        BTreeSet::new()
    };

    let mut files = Vec::new();
    let mut written: HashMap<(u64, u64), String> = HashMap::new();
    let walk = WalkDir::new(root)
        .follow_links(false)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != GIT_DIR);
    for entry in walk {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if path == DOCKERFILE_PATH {
            tracing::warn!(
                path = %entry.path().display(),
                "Skipping Dockerfile in the context directory, the generated one takes its place"
            );
            continue;
        }
        if reserved.contains(path.as_str()) {
            tracing::debug!(path = %path, "Context file replaced by a generated entry");
            continue;
        }
        if ignored.contains(relative) || !rules.allows(&path) {
            continue;
        }

        let metadata = entry.metadata()?;
        let mut mtime = timestamp::modified_time(&metadata);
        if options.use_git_timestamps && !modified.contains(relative) {
            if let Some(committed) = git::commit_time(entry.path()) {
                mtime = committed;
            }
        }

        let (size, mode, kind) = if file_type.is_symlink() {
            (0, 0o777, FileKind::Symlink(fs::read_link(entry.path())?))
        } else {
            let mode = if is_executable(&metadata) { 0o755 } else { 0o644 };
            match file_identity(&metadata) {
                Some(identity) => match written.get(&identity) {
                    Some(first) => (0, mode, FileKind::HardLink(first.clone())),
                    None => {
                        written.insert(identity, path.clone());
                        (metadata.len(), mode, FileKind::Regular)
                    }
                },
                None => (metadata.len(), mode, FileKind::Regular),
            }
        };

        files.push(ContextFile {
            path,
            source: entry.path().to_path_buf(),
            size,
            mtime,
            mode,
            kind,
        });
    }
    Ok(files)
}

fn archive_path(path: &str) -> &str {
    path.trim_start_matches("./")
}

fn header_for(entry_type: EntryType, size: u64, mtime: i64, mode: u32) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mtime(mtime.max(0) as u64);
    header.set_mode(mode);
    header.set_uid(0);
    header.set_gid(0);
    header
}

fn append_bytes<W: Write>(
    tar: &mut Builder<W>,
    entry: &ArchiveEntry,
    content: &[u8],
) -> io::Result<()> {
    let mut header = header_for(EntryType::Regular, content.len() as u64, entry.mtime, entry.mode);
    tar.append_data(&mut header, &entry.path, content)
}

fn append_file<W: Write>(tar: &mut Builder<W>, file: &ContextFile) -> io::Result<()> {
    let (entry_type, target) = match &file.kind {
        FileKind::Regular => {
            let source = File::open(&file.source)?;
            let mut header = header_for(EntryType::Regular, file.size, file.mtime, file.mode);
            return tar.append_data(&mut header, &file.path, source);
        }
        FileKind::Symlink(target) => (EntryType::Symlink, target.as_path()),
        FileKind::HardLink(target) => (EntryType::Link, Path::new(target)),
    };
    let mut header = header_for(entry_type, 0, file.mtime, file.mode);
    header.set_link_name(target)?;
    tar.append_data(&mut header, &file.path, io::empty())
}

/// Device and inode of a file with more than one link.
fn file_identity(metadata: &fs::Metadata) -> Option<(u64, u64)> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        (metadata.nlink() > 1).then(|| (metadata.dev(), metadata.ino()))
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        None
    }
}

fn is_executable(metadata: &fs::Metadata) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        false
    }
}

/// Include and exclude patterns of a context.
///
/// A pattern matches a path, or anything beneath a matching directory.
/// When both lists match, the more specific pattern wins, and exclusion wins
/// a tie. Specificity is the number of literal characters in the pattern.
struct ContextRules {
    include: Vec<Rule>,
    exclude: Vec<Rule>,
}

struct Rule {
    exact: GlobMatcher,
    beneath: GlobMatcher,
    specificity: usize,
}

impl Rule {
    fn new(pattern: &str) -> Result<Self, globset::Error> {
        let pattern = pattern.trim_start_matches("./").trim_end_matches('/');
        let compile = |p: &str| {
            GlobBuilder::new(p)
                .literal_separator(true)
                .build()
                .map(|g| g.compile_matcher())
        };
        Ok(Self {
            exact: compile(pattern)?,
            beneath: compile(&format!("{}/**", pattern))?,
            specificity: pattern
                .chars()
                .filter(|c| !matches!(c, '*' | '?' | '[' | ']' | '{' | '}' | ','))
                .count(),
        })
    }

    fn matches(&self, path: &str) -> bool {
        self.exact.is_match(path) || self.beneath.is_match(path)
    }
}

impl ContextRules {
    fn new(include: &[String], exclude: &[String]) -> Result<Self, globset::Error> {
        let compile = |patterns: &[String]| -> Result<Vec<Rule>, globset::Error> {
            patterns.iter().map(|p| Rule::new(p)).collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    fn best(rules: &[Rule], path: &str) -> Option<usize> {
        rules
            .iter()
            .filter(|r| r.matches(path))
            .map(|r| r.specificity)
            .max()
    }

    fn allows(&self, path: &str) -> bool {
        let included = if self.include.is_empty() {
            Some(0)
        } else {
            Self::best(&self.include, path)
        };
        match (included, Self::best(&self.exclude, path)) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(include), Some(exclude)) => include > exclude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(include: &[&str], exclude: &[&str]) -> ContextRules {
        let owned = |p: &[&str]| p.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        ContextRules::new(&owned(include), &owned(exclude)).unwrap()
    }

    #[test]
    fn test_everything_allowed_without_rules() {
        let rules = rules(&[], &[]);
        assert!(rules.allows("a.txt"));
        assert!(rules.allows("deep/nested/file"));
    }

    #[test]
    fn test_exclude_matches_beneath_directories() {
        let rules = rules(&[], &["target", "*.log"]);
        assert!(!rules.allows("target/debug/app"));
        assert!(!rules.allows("build.log"));
        assert!(rules.allows("src/build.log"));
        assert!(rules.allows("src/main.rs"));
    }

    #[test]
    fn test_include_limits_the_context() {
        let rules = rules(&["src", "Cargo.toml"], &[]);
        assert!(rules.allows("src/main.rs"));
        assert!(rules.allows("Cargo.toml"));
        assert!(!rules.allows("README.md"));
    }

    #[test]
    fn test_exclude_wins_ties() {
        let rules = rules(&["src"], &["src"]);
        assert!(!rules.allows("src/main.rs"));
    }

    #[test]
    fn test_more_specific_include_wins() {
        let rules = rules(&["logs/keep.log"], &["logs"]);
        assert!(rules.allows("logs/keep.log"));
        assert!(!rules.allows("logs/other.log"));

        let rules = super::tests::rules(&["src"], &["src/generated"]);
        assert!(rules.allows("src/lib.rs"));
        assert!(!rules.allows("src/generated/out.rs"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(ContextRules::new(&["a[".to_string()], &[]).is_err());
    }

    #[test]
    fn test_archive_path() {
        assert_eq!(archive_path("./Dockerfile"), "Dockerfile");
        assert_eq!(archive_path("etc/motd"), "etc/motd");
    }
}
