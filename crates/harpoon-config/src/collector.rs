//! Discovery and folding of configuration documents.
//!
//! The collector reads a root document, follows `__images_from__`
//! inclusion directories, and folds every document it finds into one
//! [`MergeTree`]. Documents found in inclusion directories land under
//! `images.<file stem>`.

use crate::convert::load;
use crate::timestamp::MtimeAccessor;
use crate::tree::MergeTree;
use crate::types::{
    CollectorHandle, ConfigError, ConfigValue, ConfigValueKind, Deferred, SecretPrompt, Source,
};
use harpoon_yaml::SourceInfo;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

/// Key that marks inclusion directories.
pub const IMAGES_FROM: &str = "__images_from__";

/// Top-level keys written by [`Collector::prepare`] rather than by documents.
pub const RESERVED_KEYS: &[&str] = &[
    "collector",
    "getpass",
    "env",
    "cli_args",
    "harpoon",
    "bash",
    "command",
    "$@",
];

const DOCUMENT_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// Collects configuration documents into a merged tree.
///
/// ```rust,no_run
/// use harpoon_config::{Collector, ConfigValue};
///
/// let collector = Collector::new()
///     .prepare("harpoon.yml", &ConfigValue::empty_map())
///     .unwrap();
/// let images = collector.configuration().keys(&["images"]);
/// ```
pub struct Collector {
    configuration: MergeTree,
    root_document: Option<PathBuf>,
    secret_prompt: Arc<dyn SecretPrompt>,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("root_document", &self.root_document)
            .field("records", &self.configuration.len())
            .finish()
    }
}

impl Collector {
    pub fn new() -> Self {
        Self {
            configuration: MergeTree::new(),
            root_document: None,
            secret_prompt: Arc::new(StdinPrompt),
        }
    }

    /// Use `prompt` for the `getpass` accessor instead of the terminal.
    pub fn with_secret_prompt(mut self, prompt: Arc<dyn SecretPrompt>) -> Self {
        self.secret_prompt = prompt;
        self
    }

    /// Collect `path` and everything it includes, then seed the reserved keys.
    ///
    /// `cli_args` is a mapping of command line overrides. Its `harpoon`
    /// mapping is merged over the documents' `harpoon` section, and
    /// `harpoon.extra` is exposed as `$@`.
    ///
    /// # Errors
    ///
    /// Fails if any document cannot be read or parsed, on inclusion cycles,
    /// and when the merged configuration declares no images.
    pub fn prepare(
        mut self,
        path: impl AsRef<Path>,
        cli_args: &ConfigValue,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut configuration = self.collect_configuration(path)?;

        let has_images = configuration
            .get(&["images"])
            .is_some_and(|images| images.is_map() && !images.is_empty());
        if !has_images {
            return Err(ConfigError::NoImages {
                path: path.to_path_buf(),
            });
        }

        let config_root = document_dir(path);
        let handle = CollectorHandle {
            root_document: path.to_path_buf(),
            config_root: config_root.clone(),
        };
        let runtime = |deferred| ConfigValue::new_deferred(deferred, SourceInfo::default());

        configuration.set(
            &["config_root"],
            ConfigValue::string(config_root.to_string_lossy()),
            Source::Runtime,
        );
        configuration.set(
            &["collector"],
            runtime(Deferred::Collector(Arc::new(handle))),
            Source::Runtime,
        );
        configuration.set(
            &["getpass"],
            runtime(Deferred::SecretPrompt(self.secret_prompt.clone())),
            Source::Runtime,
        );
        configuration.set(&["env"], runtime(Deferred::Environment), Source::Runtime);
        configuration.set(&["cli_args"], cli_args.clone(), Source::CommandLine);

        let harpoon = cli_harpoon(cli_args);
        let extra = harpoon
            .get("extra")
            .cloned()
            .unwrap_or_else(|| ConfigValue::string(""));
        configuration.set(&["harpoon"], harpoon, Source::CommandLine);
        configuration.set(&["$@"], extra, Source::CommandLine);
        for key in ["bash", "command"] {
            let value = cli_args
                .get(key)
                .cloned()
                .unwrap_or_else(|| ConfigValue::null(SourceInfo::default()));
            configuration.set(&[key], value, Source::CommandLine);
        }

        tracing::debug!(
            path = %path.display(),
            records = configuration.len(),
            "Prepared configuration"
        );

        self.root_document = Some(path.to_path_buf());
        self.configuration = configuration;
        Ok(self)
    }

    /// Collect `path` and its inclusions without any reserved keys.
    pub fn collect_configuration(&self, path: impl AsRef<Path>) -> Result<MergeTree, ConfigError> {
        let mut walk = CollectionWalk::default();
        walk.fold_document(path.as_ref(), &[])?;
        Ok(walk.tree)
    }

    /// A collector whose `harpoon` section is overlaid with `overrides`.
    ///
    /// The original collector's configuration is left untouched.
    pub fn clone_with(&self, overrides: ConfigValue) -> Collector {
        Collector {
            configuration: self
                .configuration
                .clone_with(&["harpoon"], overrides, Source::Named("clone".into())),
            root_document: self.root_document.clone(),
            secret_prompt: self.secret_prompt.clone(),
        }
    }

    pub fn configuration(&self) -> &MergeTree {
        &self.configuration
    }

    pub fn into_configuration(self) -> MergeTree {
        self.configuration
    }

    /// The document passed to [`Collector::prepare`].
    pub fn root_document(&self) -> Option<&Path> {
        self.root_document.as_deref()
    }
}

/// Non-null entries of `cli_args.harpoon`.
fn cli_harpoon(cli_args: &ConfigValue) -> ConfigValue {
    let Some(harpoon) = cli_args.get("harpoon") else {
        return ConfigValue::empty_map();
    };
    match harpoon.as_map() {
        Some(entries) => ConfigValue::new_map(
            entries
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            harpoon.source_info.clone(),
        ),
        None => ConfigValue::empty_map(),
    }
}

fn document_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Prompts on stderr and reads one line from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

impl SecretPrompt for StdinPrompt {
    fn prompt(&self, message: &str) -> io::Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{}", message)?;
        stderr.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// State of one collection run.
#[derive(Default)]
struct CollectionWalk {
    tree: MergeTree,
    /// Documents currently being folded, outermost first
    active: Vec<PathBuf>,
    /// Documents already folded
    done: HashSet<PathBuf>,
}

/// Directories named by one `__images_from__` value.
struct Inclusion {
    dirs: Vec<PathBuf>,
    location: SourceInfo,
}

impl CollectionWalk {
    fn fold_document(&mut self, path: &Path, prefix: &[String]) -> Result<(), ConfigError> {
        let identity = fs::canonicalize(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if self.active.contains(&identity) {
            return Err(ConfigError::InclusionCycle {
                path: identity,
                chain: self.active.clone(),
            });
        }
        if self.done.contains(&identity) {
            tracing::debug!(path = %path.display(), "Document already collected, skipping");
            return Ok(());
        }

        tracing::debug!(path = %path.display(), prefix = ?prefix, "Collecting configuration document");

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let location = path.to_string_lossy();
        let mut value = load(&text, &location)?;
        if value.is_null() {
            value = ConfigValue::new_map(Default::default(), value.source_info);
        }
        if !value.is_map() {
            return Err(ConfigError::NotAMapping {
                path: path.to_path_buf(),
                found: value.kind_name(),
            });
        }

        let config_root = document_dir(path);
        let inclusions = take_inclusions(&mut value, !prefix.is_empty(), &config_root)?;

        let source = Source::File(path.to_path_buf());
        let mut document = self.tree.scoped(prefix);
        document.set::<&str>(&[], value, source.clone());
        document.set(
            &["mtime"],
            ConfigValue::new_deferred(
                Deferred::Mtime(MtimeAccessor::new(path)),
                SourceInfo::default(),
            ),
            source.clone(),
        );
        document.set(
            &["config_root"],
            ConfigValue::string(config_root.to_string_lossy()),
            source,
        );

        self.active.push(identity.clone());
        let result = self.fold_inclusions(&inclusions);
        self.active.pop();
        result?;

        self.done.insert(identity);
        Ok(())
    }

    fn fold_inclusions(&mut self, inclusions: &[Inclusion]) -> Result<(), ConfigError> {
        for inclusion in inclusions {
            for dir in &inclusion.dirs {
                if !dir.is_dir() {
                    return Err(ConfigError::InclusionNotADirectory {
                        path: dir.clone(),
                        location: inclusion.location.clone(),
                    });
                }

                for entry in WalkDir::new(dir).follow_links(false).sort_by(files_first) {
                    let entry = entry?;
                    if !is_document(&entry) {
                        continue;
                    }
                    let Some(stem) = entry.path().file_stem() else {
                        continue;
                    };
                    let prefix = vec!["images".to_string(), stem.to_string_lossy().into_owned()];
                    self.fold_document(entry.path(), &prefix)?;
                }
            }
        }
        Ok(())
    }
}

/// Files before directories, each group by name.
fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

fn is_document(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext))
}

/// Remove every `__images_from__` key from a document.
///
/// Recognized at `images.__images_from__`, `images.<name>.__images_from__`
/// and, for documents folded below `images`, at the top level.
fn take_inclusions(
    document: &mut ConfigValue,
    nested: bool,
    config_root: &Path,
) -> Result<Vec<Inclusion>, ConfigError> {
    let Some(top) = document.as_map_mut() else {
        return Ok(Vec::new());
    };

    let mut found = Vec::new();

    if nested {
        if let Some(value) = top.shift_remove(IMAGES_FROM) {
            found.push(value);
        }
    }
    if let Some(images) = top.get_mut("images").and_then(ConfigValue::as_map_mut) {
        if let Some(value) = images.shift_remove(IMAGES_FROM) {
            found.push(value);
        }
        for image in images.values_mut() {
            if let Some(value) = image.as_map_mut().and_then(|m| m.shift_remove(IMAGES_FROM)) {
                found.push(value);
            }
        }
    }

    found
        .into_iter()
        .map(|value| inclusion_dirs(value, config_root))
        .collect()
}

fn inclusion_dirs(value: ConfigValue, config_root: &Path) -> Result<Inclusion, ConfigError> {
    let location = value.source_info.clone();
    let invalid = || ConfigError::InvalidInclusion {
        location: location.clone(),
    };

    let names: Vec<String> = match &value.value {
        ConfigValueKind::Scalar(_) => vec![value.as_str().ok_or_else(invalid)?.to_string()],
        ConfigValueKind::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<Result<_, _>>()?,
        _ => return Err(invalid()),
    };

    Ok(Inclusion {
        dirs: names
            .iter()
            .map(|name| config_root.join(name).components().collect())
            .collect(),
        location,
    })
}
