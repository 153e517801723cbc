//! YAML value with source location tracking.

use crate::SourceInfo;
use yaml_rust2::Yaml;

/// A YAML node with source location information.
///
/// Scalars hold an owned `yaml_rust2::Yaml` leaf. Collections hold their
/// children as `SourcedYaml` so every element keeps its own location.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedYaml {
    pub node: Node,
    pub source_info: SourceInfo,
}

/// The shape of a YAML node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Integer, real, string, boolean or null leaf.
    Scalar(Yaml),

    /// Sequence items in document order.
    Sequence(Vec<SourcedYaml>),

    /// Mapping entries in document order. Keys are unique.
    Mapping(Vec<MappingEntry>),
}

/// A key/value pair of a mapping.
///
/// Keys are kept as the raw scalar text so `1: x` and `"1": x` both yield
/// the key `"1"`.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub key: String,
    pub key_span: SourceInfo,
    pub value: SourcedYaml,
}

impl SourcedYaml {
    pub fn new_scalar(yaml: Yaml, source_info: SourceInfo) -> Self {
        Self {
            node: Node::Scalar(yaml),
            source_info,
        }
    }

    pub fn new_sequence(items: Vec<SourcedYaml>, source_info: SourceInfo) -> Self {
        Self {
            node: Node::Sequence(items),
            source_info,
        }
    }

    pub fn new_mapping(entries: Vec<MappingEntry>, source_info: SourceInfo) -> Self {
        Self {
            node: Node::Mapping(entries),
            source_info,
        }
    }

    /// A null node, used for empty documents.
    pub fn null(source_info: SourceInfo) -> Self {
        Self::new_scalar(Yaml::Null, source_info)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.node, Node::Scalar(Yaml::Null))
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.node, Node::Mapping(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.node, Node::Sequence(_))
    }

    pub fn as_scalar(&self) -> Option<&Yaml> {
        match &self.node {
            Node::Scalar(yaml) => Some(yaml),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[SourcedYaml]> {
        match &self.node {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a mapping value by key.
    pub fn get(&self, key: &str) -> Option<&SourcedYaml> {
        match &self.node {
            Node::Mapping(entries) => entries.iter().find(|e| e.key == key).map(|e| &e.value),
            _ => None,
        }
    }

    /// Convert back to a plain `Yaml` tree, dropping locations.
    pub fn to_yaml(&self) -> Yaml {
        match &self.node {
            Node::Scalar(yaml) => yaml.clone(),
            Node::Sequence(items) => Yaml::Array(items.iter().map(SourcedYaml::to_yaml).collect()),
            Node::Mapping(entries) => Yaml::Hash(
                entries
                    .iter()
                    .map(|e| (Yaml::String(e.key.clone()), e.value.to_yaml()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(s: &str) -> SourcedYaml {
        SourcedYaml::new_scalar(Yaml::String(s.into()), SourceInfo::default())
    }

    #[test]
    fn test_get_on_mapping() {
        let node = SourcedYaml::new_mapping(
            vec![MappingEntry {
                key: "commands".into(),
                key_span: SourceInfo::default(),
                value: scalar("FROM alpine"),
            }],
            SourceInfo::default(),
        );
        assert!(node.is_mapping());
        assert_eq!(
            node.get("commands").and_then(|v| v.as_scalar()).and_then(|y| y.as_str()),
            Some("FROM alpine")
        );
        assert!(node.get("missing").is_none());
    }

    #[test]
    fn test_get_on_scalar_is_none() {
        assert!(scalar("x").get("x").is_none());
    }

    #[test]
    fn test_to_yaml_sequence() {
        let node = SourcedYaml::new_sequence(vec![scalar("a"), scalar("b")], SourceInfo::default());
        assert_eq!(
            node.to_yaml(),
            Yaml::Array(vec![Yaml::String("a".into()), Yaml::String("b".into())])
        );
    }
}
