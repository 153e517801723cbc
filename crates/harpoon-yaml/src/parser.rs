//! YAML parser that builds `SourcedYaml` trees.

use crate::{Error, ErrorKind, MappingEntry, Result, SourceInfo, SourcedYaml};
use yaml_rust2::Yaml;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// Parse YAML from a string, producing a `SourcedYaml` tree.
///
/// Only the first document of a stream is read. An empty document yields a
/// null node.
///
/// # Example
///
/// ```rust
/// use harpoon_yaml::parse;
///
/// let yaml = parse("images: {}").unwrap();
/// assert!(yaml.is_mapping());
/// ```
///
/// # Errors
///
/// Returns an error if the YAML is invalid. No partial tree is returned.
pub fn parse(content: &str) -> Result<SourcedYaml> {
    parse_impl(content, None)
}

/// Parse YAML from a string with an associated filename.
///
/// The filename is recorded in every node's source location and in errors.
///
/// ```rust
/// use harpoon_yaml::parse_file;
///
/// let yaml = parse_file("images: {}", "harpoon.yml").unwrap();
/// assert_eq!(yaml.source_info.file, Some("harpoon.yml".into()));
/// ```
pub fn parse_file(content: &str, filename: &str) -> Result<SourcedYaml> {
    parse_impl(content, Some(filename))
}

fn parse_impl(content: &str, filename: Option<&str>) -> Result<SourcedYaml> {
    let mut parser = Parser::new_from_str(content);
    let mut builder = YamlBuilder::new(filename);

    parser
        .load(&mut builder, false)
        .map_err(|e| Error::from_scan(&e, filename))?;

    builder.result()
}

/// Builder that implements MarkedEventReceiver to construct `SourcedYaml`.
///
/// Events cannot fail, so the first structural problem is stored and all
/// later events are ignored.
struct YamlBuilder {
    filename: Option<String>,
    stack: Vec<BuildNode>,
    root: Option<SourcedYaml>,
    error: Option<Error>,
}

/// A collection being constructed during parsing.
enum BuildNode {
    Sequence {
        start_marker: Marker,
        items: Vec<SourcedYaml>,
    },

    Mapping {
        start_marker: Marker,
        entries: Vec<MappingEntry>,
        pending_key: Option<(String, SourceInfo)>,
    },
}

impl YamlBuilder {
    fn new(filename: Option<&str>) -> Self {
        Self {
            filename: filename.map(|s| s.to_string()),
            stack: Vec::new(),
            root: None,
            error: None,
        }
    }

    fn result(self) -> Result<SourcedYaml> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let empty = {
            let info = SourceInfo::new(None, 0, 1, 1);
            match &self.filename {
                Some(filename) => info.with_file(filename.clone()),
                None => info,
            }
        };
        Ok(self.root.unwrap_or_else(|| SourcedYaml::null(empty)))
    }

    fn make_source_info(&self, marker: &Marker) -> SourceInfo {
        let info = SourceInfo::from_marker(marker);
        match &self.filename {
            Some(filename) => info.with_file(filename.clone()),
            None => info,
        }
    }

    fn fail_structure(&mut self, message: impl Into<String>, marker: &Marker) {
        let location = self.make_source_info(marker);
        self.error = Some(Error::InvalidStructure {
            message: message.into(),
            location,
        });
    }

    /// True when the innermost open collection is a mapping waiting for a key.
    fn expecting_key(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(BuildNode::Mapping {
                pending_key: None,
                ..
            })
        )
    }

    fn push_complete(&mut self, node: SourcedYaml, marker: &Marker) {
        let Some(parent) = self.stack.last_mut() else {
            self.root = Some(node);
            return;
        };

        let outcome = match parent {
            BuildNode::Sequence { items, .. } => {
                items.push(node);
                Ok(())
            }
            BuildNode::Mapping {
                entries,
                pending_key,
                ..
            } => match pending_key.take() {
                None => Err("mapping keys must be scalars".to_string()),
                Some((key, _)) if entries.iter().any(|e| e.key == key) => {
                    Err(format!("found duplicate key '{}'", key))
                }
                Some((key, key_span)) => {
                    entries.push(MappingEntry {
                        key,
                        key_span,
                        value: node,
                    });
                    Ok(())
                }
            },
        };

        if let Err(message) = outcome {
            self.fail_structure(message, marker);
        }
    }
}

impl MarkedEventReceiver for YamlBuilder {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        if self.error.is_some() {
            return;
        }

        match ev {
            Event::Nothing
            | Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd => {}

            Event::Scalar(value, style, _anchor_id, _tag) => {
                let source_info = self.make_source_info(&marker);

                if self.expecting_key() {
                    if let Some(BuildNode::Mapping { pending_key, .. }) = self.stack.last_mut() {
                        *pending_key = Some((value, source_info));
                    }
                    return;
                }

                let yaml = match style {
                    TScalarStyle::Plain => parse_scalar_value(&value),
                    _ => Yaml::String(value),
                };
                self.push_complete(SourcedYaml::new_scalar(yaml, source_info), &marker);
            }

            Event::SequenceStart(_anchor_id, _tag) => {
                if self.expecting_key() {
                    self.fail_structure("mapping keys must be scalars", &marker);
                    return;
                }
                self.stack.push(BuildNode::Sequence {
                    start_marker: marker,
                    items: Vec::new(),
                });
            }

            Event::SequenceEnd => match self.stack.pop() {
                Some(BuildNode::Sequence {
                    start_marker,
                    items,
                }) => {
                    let source_info = self.make_source_info(&start_marker);
                    self.push_complete(SourcedYaml::new_sequence(items, source_info), &marker);
                }
                _ => self.fail_structure("unbalanced sequence end", &marker),
            },

            Event::MappingStart(_anchor_id, _tag) => {
                if self.expecting_key() {
                    self.fail_structure("mapping keys must be scalars", &marker);
                    return;
                }
                self.stack.push(BuildNode::Mapping {
                    start_marker: marker,
                    entries: Vec::new(),
                    pending_key: None,
                });
            }

            Event::MappingEnd => match self.stack.pop() {
                Some(BuildNode::Mapping {
                    start_marker,
                    entries,
                    ..
                }) => {
                    let source_info = self.make_source_info(&start_marker);
                    self.push_complete(SourcedYaml::new_mapping(entries, source_info), &marker);
                }
                _ => self.fail_structure("unbalanced mapping end", &marker),
            },

            Event::Alias(_anchor_id) => {
                let location = self.make_source_info(&marker);
                self.error = Some(Error::Syntax {
                    kind: ErrorKind::Parser,
                    message: "aliases are not supported in configuration documents".into(),
                    location,
                });
            }
        }
    }
}

/// Parse a plain scalar into the appropriate Yaml type.
///
/// Quoted and block scalars never reach this function; they are always
/// strings.
fn parse_scalar_value(value: &str) -> Yaml {
    if let Ok(i) = value.parse::<i64>() {
        return Yaml::Integer(i);
    }
    for (prefix, radix) in [("0o", 8), ("0x", 16)] {
        if let Some(digits) = value.strip_prefix(prefix) {
            if let Ok(i) = i64::from_str_radix(digits, radix) {
                return Yaml::Integer(i);
            }
        }
    }

    let looks_numeric = value.bytes().any(|b| b.is_ascii_digit());
    if looks_numeric && value.parse::<f64>().is_ok() {
        return Yaml::Real(value.to_string());
    }

    match value {
        "true" | "True" | "TRUE" | "yes" | "Yes" | "YES" | "on" | "On" | "ON" => Yaml::Boolean(true),
        "false" | "False" | "FALSE" | "no" | "No" | "NO" | "off" | "Off" | "OFF" => {
            Yaml::Boolean(false)
        }
        "null" | "Null" | "NULL" | "~" | "" => Yaml::Null,
        _ => Yaml::String(value.to_string()),
    }
}
