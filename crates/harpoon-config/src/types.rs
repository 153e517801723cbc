//! Core type definitions for configuration values.

use crate::convert::DocumentParseError;
use crate::timestamp::MtimeAccessor;
use harpoon_yaml::SourceInfo;
use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use yaml_rust2::Yaml;

/// A configuration value with its source location.
#[derive(Debug, Clone)]
pub struct ConfigValue {
    /// The underlying value
    pub value: ConfigValueKind,

    /// Where this value was written
    pub source_info: SourceInfo,
}

/// The kind of configuration value.
#[derive(Debug, Clone)]
pub enum ConfigValueKind {
    /// Atomic values (String, Integer, Real, Boolean, Null).
    Scalar(Yaml),

    /// Sequences. Always replaced wholesale by a later write.
    Array(Vec<ConfigValue>),

    /// Mappings. Merged key by key with earlier writes.
    Map(IndexMap<String, ConfigValue>),

    /// A value computed when it is read rather than when it is written.
    Deferred(Deferred),
}

/// Accessors injected by the collector and evaluated by whoever reads them.
#[derive(Clone)]
pub enum Deferred {
    /// Commit time or modification time of the document this value came from.
    Mtime(MtimeAccessor),

    /// Asks the user for a secret.
    SecretPrompt(Arc<dyn SecretPrompt>),

    /// Reads process environment variables.
    Environment,

    /// The collector that produced this configuration.
    Collector(Arc<CollectorHandle>),
}

/// Something that can ask the user for a secret value.
pub trait SecretPrompt: Send + Sync {
    fn prompt(&self, message: &str) -> std::io::Result<String>;
}

/// Identity of a collector, as exposed through the `collector` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorHandle {
    /// The root document passed to `prepare`
    pub root_document: PathBuf,
    /// Directory containing the root document
    pub config_root: PathBuf,
}

impl Deferred {
    /// Look up an environment variable through an `Environment` accessor.
    pub fn env_var(&self, name: &str) -> Option<String> {
        match self {
            Deferred::Environment => std::env::var(name).ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Mtime(accessor) => f.debug_tuple("Mtime").field(accessor).finish(),
            Deferred::SecretPrompt(_) => f.write_str("SecretPrompt"),
            Deferred::Environment => f.write_str("Environment"),
            Deferred::Collector(handle) => f.debug_tuple("Collector").field(handle).finish(),
        }
    }
}

/// Identifies who produced a merge record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// A configuration document on disk
    File(PathBuf),
    /// Overrides given on the command line
    CommandLine,
    /// Keys seeded by the collector itself
    Runtime,
    /// Anything else, labelled by the caller
    Named(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "{}", path.display()),
            Source::CommandLine => f.write_str("<command line>"),
            Source::Runtime => f.write_str("<runtime>"),
            Source::Named(name) => write!(f, "<{}>", name),
        }
    }
}

impl ConfigValue {
    pub fn new_scalar(yaml: Yaml, source_info: SourceInfo) -> Self {
        Self {
            value: ConfigValueKind::Scalar(yaml),
            source_info,
        }
    }

    pub fn new_array(items: Vec<ConfigValue>, source_info: SourceInfo) -> Self {
        Self {
            value: ConfigValueKind::Array(items),
            source_info,
        }
    }

    pub fn new_map(entries: IndexMap<String, ConfigValue>, source_info: SourceInfo) -> Self {
        Self {
            value: ConfigValueKind::Map(entries),
            source_info,
        }
    }

    pub fn new_deferred(deferred: Deferred, source_info: SourceInfo) -> Self {
        Self {
            value: ConfigValueKind::Deferred(deferred),
            source_info,
        }
    }

    pub fn null(source_info: SourceInfo) -> Self {
        Self::new_scalar(Yaml::Null, source_info)
    }

    /// An empty mapping with no particular source.
    pub fn empty_map() -> Self {
        Self::new_map(IndexMap::new(), SourceInfo::default())
    }

    /// A string scalar with no particular source.
    pub fn string(s: impl Into<String>) -> Self {
        Self::new_scalar(Yaml::String(s.into()), SourceInfo::default())
    }

    /// Build a mapping from `(key, value)` pairs with no particular source.
    pub fn map_of<K: Into<String>>(entries: impl IntoIterator<Item = (K, ConfigValue)>) -> Self {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::new_map(entries, SourceInfo::default())
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.value, ConfigValueKind::Scalar(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.value, ConfigValueKind::Array(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.value, ConfigValueKind::Map(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, ConfigValueKind::Scalar(Yaml::Null))
    }

    pub fn as_yaml(&self) -> Option<&Yaml> {
        match &self.value {
            ConfigValueKind::Scalar(yaml) => Some(yaml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_yaml().and_then(|y| y.as_str())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_yaml().and_then(|y| y.as_i64())
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_yaml().and_then(|y| y.as_bool())
    }

    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match &self.value {
            ConfigValueKind::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, ConfigValue>> {
        match &self.value {
            ConfigValueKind::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, ConfigValue>> {
        match &mut self.value {
            ConfigValueKind::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_deferred(&self) -> Option<&Deferred> {
        match &self.value {
            ConfigValueKind::Deferred(deferred) => Some(deferred),
            _ => None,
        }
    }

    /// Look up a direct child of a mapping.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match &self.value {
            ConfigValueKind::Scalar(Yaml::String(_)) => "string",
            ConfigValueKind::Scalar(Yaml::Integer(_)) => "integer",
            ConfigValueKind::Scalar(Yaml::Real(_)) => "float",
            ConfigValueKind::Scalar(Yaml::Boolean(_)) => "boolean",
            ConfigValueKind::Scalar(Yaml::Null) => "null",
            ConfigValueKind::Scalar(_) => "scalar",
            ConfigValueKind::Array(_) => "sequence",
            ConfigValueKind::Map(_) => "mapping",
            ConfigValueKind::Deferred(_) => "accessor",
        }
    }

    /// Convert to a plain `Yaml` tree, dropping locations.
    ///
    /// Deferred accessors have no YAML form and become null.
    pub fn to_yaml(&self) -> Yaml {
        match &self.value {
            ConfigValueKind::Scalar(yaml) => yaml.clone(),
            ConfigValueKind::Array(items) => {
                Yaml::Array(items.iter().map(ConfigValue::to_yaml).collect())
            }
            ConfigValueKind::Map(entries) => Yaml::Hash(
                entries
                    .iter()
                    .map(|(k, v)| (Yaml::String(k.clone()), v.to_yaml()))
                    .collect(),
            ),
            ConfigValueKind::Deferred(_) => Yaml::Null,
        }
    }
}

/// Errors that abort configuration collection.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Didn't find any images in the configuration ({})", path.display())]
    NoImages { path: PathBuf },

    #[error("{}: expected a mapping at the top of the document, found a {found}", path.display())]
    NotAMapping { path: PathBuf, found: &'static str },

    #[error("Inclusion cycle: {} is included again while it is still being collected", path.display())]
    InclusionCycle {
        path: PathBuf,
        /// Documents being collected when the cycle was found, outermost first
        chain: Vec<PathBuf>,
    },

    #[error("__images_from__ at {location} must point at a directory: {}", path.display())]
    InclusionNotADirectory { path: PathBuf, location: SourceInfo },

    #[error("__images_from__ at {location} must be a path or a list of paths")]
    InvalidInclusion { location: SourceInfo },

    #[error(transparent)]
    Parse(#[from] DocumentParseError),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk inclusion directory: {0}")]
    Walk(#[from] walkdir::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_value_scalar() {
        let value = ConfigValue::string("test");
        assert!(value.is_scalar());
        assert!(!value.is_array());
        assert!(!value.is_map());
        assert_eq!(value.as_str(), Some("test"));
        assert_eq!(value.kind_name(), "string");
    }

    #[test]
    fn test_map_of() {
        let value = ConfigValue::map_of([("a", ConfigValue::string("1"))]);
        assert!(value.is_map());
        assert_eq!(value.get("a").and_then(|v| v.as_str()), Some("1"));
    }

    #[test]
    fn test_deferred_has_no_yaml_form() {
        let value = ConfigValue::new_deferred(Deferred::Environment, SourceInfo::default());
        assert_eq!(value.to_yaml(), Yaml::Null);
        assert_eq!(value.kind_name(), "accessor");
    }

    #[test]
    fn test_environment_accessor() {
        let deferred = Deferred::Environment;
        assert!(deferred.env_var("HARPOON_SURELY_UNSET_VARIABLE").is_none());
        assert!(std::env::var("PATH").ok() == deferred.env_var("PATH"));
    }

    #[test]
    fn test_source_display() {
        assert_eq!(Source::CommandLine.to_string(), "<command line>");
        assert_eq!(Source::File("a.yml".into()).to_string(), "a.yml");
    }
}
