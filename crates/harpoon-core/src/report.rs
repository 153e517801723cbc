//! Normalizing every declared image at once.

use crate::error::{GraphError, SpecValidationError};
use crate::graph;
use crate::image::{ImageCatalog, ImageSpec};
use harpoon_config::MergeTree;
use serde::Serialize;

/// Outcome of normalizing all images of a configuration.
///
/// Images are listed in declaration order. A failing image is recorded and
/// the rest are still normalized.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeReport {
    pub specs: Vec<ImageSpec>,
    pub failures: Vec<SpecValidationError>,
}

impl NormalizeReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn spec(&self, name: &str) -> Option<&ImageSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn failure(&self, name: &str) -> Option<&SpecValidationError> {
        self.failures.iter().find(|f| f.image == name)
    }

    /// Build order of the images that normalized.
    pub fn build_order(&self) -> Result<Vec<String>, GraphError> {
        graph::build_order(&self.specs)
    }
}

/// Normalize every image under `images` in a collected configuration.
pub fn normalize_all(tree: &MergeTree) -> NormalizeReport {
    normalize_catalog(&ImageCatalog::from_tree(tree))
}

pub fn normalize_catalog(catalog: &ImageCatalog) -> NormalizeReport {
    let mut report = NormalizeReport::default();
    for name in catalog.names() {
        match catalog.normalize(name) {
            Ok(spec) => report.specs.push(spec),
            Err(err) => {
                tracing::warn!(image = name, field = %err.field, "{}", err.reason);
                report.failures.push(err);
            }
        }
    }
    tracing::debug!(
        normalized = report.specs.len(),
        failed = report.failures.len(),
        "Normalized images"
    );
    report
}
