//! Error types for image normalization, ordering and context building.

use harpoon_config::{ConfigError, TimestampUnavailable};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// An image definition that cannot be built as written.
///
/// One bad image never stops the others from being normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("Image '{image}': {field} {reason}")]
pub struct SpecValidationError {
    /// Name of the image under `images`
    pub image: String,
    /// Dotted path of the offending option, relative to the image
    pub field: String,
    pub reason: String,
}

impl SpecValidationError {
    pub fn new(image: impl Into<String>, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Images that depend on each other, directly or transitively
    #[error("Dependency cycle between images: {}", cycle.join(", "))]
    DependencyCycle { cycle: Vec<String> },
}

/// Failures while writing a build context archive.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to walk the context directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid context pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error(transparent)]
    Timestamp(#[from] TimestampUnavailable),

    #[error("Context directory {} does not exist", path.display())]
    MissingParentDir { path: PathBuf },

    #[error("Extra context entry uses the reserved path {path}")]
    ReservedPath { path: String },
}

/// Any failure in the harpoon pipeline.
#[derive(Debug, Error)]
pub enum HarpoonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spec(#[from] SpecValidationError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("No image named '{name}' in the configuration")]
    UnknownImage { name: String },
}
