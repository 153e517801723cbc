//! Image specifications, build order and build contexts for harpoon.
//!
//! Takes the merged configuration produced by `harpoon-config` and turns each
//! declared image into something buildable:
//!
//! - [`normalize`] / [`normalize_all`]: validate image definitions into [`ImageSpec`]s
//! - [`build_order`]: images ordered so dependencies build first
//! - [`ContextBuilder`]: stream a reproducible tar build context
//!
//! # Example
//!
//! ```rust,no_run
//! use harpoon_config::{Collector, ConfigValue};
//! use harpoon_core::{BuildOptions, ContextBuilder, normalize_all};
//!
//! let collector = Collector::new().prepare("harpoon.yml", &ConfigValue::empty_map())?;
//! let report = normalize_all(collector.configuration());
//!
//! for name in report.build_order()? {
//!     let spec = report.spec(&name).unwrap();
//!     let file = std::fs::File::create(format!("{}.tar", name))?;
//!     ContextBuilder::new(BuildOptions::default()).build(spec, &[], file)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod context;
pub mod error;
pub mod graph;
pub mod image;
pub mod instruction;
pub mod report;

pub use context::{
    ArchiveEntry, BuildOptions, ContextArchive, ContextBuilder, ContextEntry, DOCKERFILE_PATH,
    EntryOrigin,
};
pub use error::{ContextError, GraphError, HarpoonError, SpecValidationError};
pub use graph::{build_chain, build_order};
pub use image::{BuildTime, ContextOptions, ImageCatalog, ImageSpec, normalize};
pub use instruction::{DockerFile, Instruction};
pub use report::{NormalizeReport, normalize_all, normalize_catalog};
