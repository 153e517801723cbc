//! Configuration collection and merging with source tracking for harpoon.
//!
//! This crate turns a root YAML document and the inclusion directories it
//! names into one merged configuration tree, keeping track of where every
//! value was written.
//!
//! # Key Features
//!
//! - **Source location preservation**: Every value carries its `SourceInfo`
//! - **Append-only merging**: [`MergeTree`] records writes and resolves them on read
//! - **Lazy timestamps**: each document gets an `mtime` accessor evaluated on demand
//! - **Deterministic discovery**: inclusion directories are walked in a fixed order
//!
//! # Architecture
//!
//! - [`ConfigValue`]: a configuration value with its source location
//! - [`MergeTree`]: the overlay store documents are folded into
//! - [`Collector`]: finds documents and folds them into a [`MergeTree`]
//! - [`timestamp`]: commit time or modification time of a path
//!
//! # Example
//!
//! ```rust,no_run
//! use harpoon_config::{Collector, ConfigValue};
//!
//! let cli_args = ConfigValue::map_of([(
//!     "harpoon",
//!     ConfigValue::map_of([("chosen_image", ConfigValue::string("app"))]),
//! )]);
//! let collector = Collector::new().prepare("harpoon.yml", &cli_args)?;
//!
//! for name in collector.configuration().keys(&["images"]) {
//!     println!("{}", name);
//! }
//! # Ok::<(), harpoon_config::ConfigError>(())
//! ```

mod collector;
mod convert;
pub mod git;
pub mod timestamp;
mod tree;
mod types;

pub use types::{
    CollectorHandle,
    ConfigError,
    ConfigValue,
    ConfigValueKind,
    Deferred,
    SecretPrompt,
    Source,
};

pub use convert::{
    DocumentParseError,
    config_value_from_yaml,
    dump,
    load,
};

pub use tree::{
    MergeRecord,
    MergeTree,
    ScopedTree,
};

pub use collector::{
    Collector,
    IMAGES_FROM,
    RESERVED_KEYS,
    StdinPrompt,
};

pub use timestamp::{MtimeAccessor, TimestampUnavailable};

// Re-export for convenience
pub use harpoon_yaml::{ErrorKind, SourceInfo};
