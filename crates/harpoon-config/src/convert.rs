//! Conversion between YAML text and `ConfigValue`.
//!
//! This module provides conversion from `SourcedYaml` to `ConfigValue` and
//! the document-level `load`/`dump` pair used by the collector.

use crate::types::{ConfigValue, ConfigValueKind};
use harpoon_yaml::{ErrorKind, Node, SourcedYaml};
use indexmap::IndexMap;
use thiserror::Error;
use yaml_rust2::{EmitError, YamlEmitter};

/// A configuration document could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to read the configuration at {location}: {error_type}: {error_message}")]
pub struct DocumentParseError {
    /// The document that failed, usually a file path
    pub location: String,

    /// Tokenizer or grammar failure
    pub error_type: ErrorKind,

    /// The parser diagnostic followed by `in "<location>", line L, column C`
    pub error_message: String,
}

impl DocumentParseError {
    fn from_yaml_error(err: &harpoon_yaml::Error, location: &str) -> Self {
        let at = err.location();
        Self {
            location: location.to_string(),
            error_type: err.kind(),
            error_message: format!(
                "{} in \"{}\", line {}, column {}",
                err.message(),
                location,
                at.line,
                at.col
            ),
        }
    }
}

/// Convert a `SourcedYaml` tree to a `ConfigValue`, keeping every location.
pub fn config_value_from_yaml(yaml: SourcedYaml) -> ConfigValue {
    let source_info = yaml.source_info;
    match yaml.node {
        Node::Scalar(scalar) => ConfigValue::new_scalar(scalar, source_info),
        Node::Sequence(items) => ConfigValue::new_array(
            items.into_iter().map(config_value_from_yaml).collect(),
            source_info,
        ),
        Node::Mapping(entries) => {
            let map: IndexMap<String, ConfigValue> = entries
                .into_iter()
                .map(|entry| (entry.key, config_value_from_yaml(entry.value)))
                .collect();
            ConfigValue::new_map(map, source_info)
        }
    }
}

/// Load one configuration document.
///
/// `location` names the document in source locations and diagnostics.
/// An empty document loads as null.
pub fn load(text: &str, location: &str) -> Result<ConfigValue, DocumentParseError> {
    let yaml = harpoon_yaml::parse_file(text, location)
        .map_err(|e| DocumentParseError::from_yaml_error(&e, location))?;
    Ok(config_value_from_yaml(yaml))
}

/// Serialize a value back to YAML text.
///
/// Deferred accessors are written as null.
pub fn dump(value: &ConfigValue) -> Result<String, EmitError> {
    let mut out = String::new();
    {
        let mut emitter = YamlEmitter::new(&mut out);
        emitter.dump(&value.to_yaml())?;
    }
    out.push('\n');
    Ok(out)
}

impl ConfigValue {
    /// Number of direct children: items of a sequence, entries of a mapping.
    pub fn len(&self) -> usize {
        match &self.value {
            ConfigValueKind::Array(items) => items.len(),
            ConfigValueKind::Map(entries) => entries.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
