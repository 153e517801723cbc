//! # harpoon-yaml
//!
//! YAML parsing with source location tracking.
//!
//! This crate turns a single YAML document into a [`SourcedYaml`] tree where
//! every node knows the file, line and column it came from. Syntax errors are
//! classified as tokenizer ([`ErrorKind::Scanner`]) or grammar
//! ([`ErrorKind::Parser`]) failures so callers can report them precisely.
//!
//! ## Example
//!
//! ```rust,no_run
//! use harpoon_yaml::parse_file;
//!
//! let yaml = parse_file("images:\n  app:\n    commands: FROM alpine", "harpoon.yml").unwrap();
//! if let Some(images) = yaml.get("images") {
//!     println!("images declared at line {}", images.source_info.line);
//! }
//! ```

mod error;
mod node;
mod parser;
mod source_info;

pub use error::{Error, ErrorKind, Result};
pub use node::{MappingEntry, Node, SourcedYaml};
pub use parser::{parse, parse_file};
pub use source_info::SourceInfo;
