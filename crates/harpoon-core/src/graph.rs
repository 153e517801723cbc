//! Build order of images that reference each other.

use crate::error::GraphError;
use crate::image::ImageSpec;
use std::collections::{BTreeMap, BTreeSet};

/// Names of `specs` ordered so every image comes after the images it
/// references.
///
/// Among images that are ready at the same time the lexicographically
/// smallest name goes first, so the order does not depend on the input order.
/// References to images missing from `specs` are not edges.
pub fn build_order(specs: &[ImageSpec]) -> Result<Vec<String>, GraphError> {
    let names: BTreeSet<&str> = specs.iter().map(|s| s.name.as_str()).collect();

    // Kahn's algorithm over image -> images that reference it
    let mut in_degree: BTreeMap<&str, usize> = names.iter().map(|n| (*n, 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for spec in specs {
        for dependency in &spec.dependencies {
            if !names.contains(dependency.as_str()) {
                tracing::debug!(
                    image = %spec.name,
                    dependency = %dependency,
                    "Dependency is not part of this build"
                );
                continue;
            }
            dependents
                .entry(dependency.as_str())
                .or_default()
                .push(spec.name.as_str());
            if let Some(degree) = in_degree.get_mut(spec.name.as_str()) {
                *degree += 1;
            }
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(names.len());

    while let Some(name) = ready.pop_first() {
        order.push(name.to_string());
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() != names.len() {
        let cycle = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(name, _)| name.to_string())
            .collect();
        return Err(GraphError::DependencyCycle { cycle });
    }

    Ok(order)
}

/// `target` and everything it needs, dependencies first.
pub fn build_chain(specs: &[ImageSpec], target: &str) -> Result<Vec<String>, GraphError> {
    let by_name: BTreeMap<&str, &ImageSpec> = specs.iter().map(|s| (s.name.as_str(), s)).collect();

    let mut needed: BTreeSet<&str> = BTreeSet::new();
    let mut pending = vec![target];
    while let Some(name) = pending.pop() {
        let Some(spec) = by_name.get(name) else {
            continue;
        };
        if needed.insert(name) {
            pending.extend(spec.dependencies.iter().map(String::as_str));
        }
    }

    let subset: Vec<ImageSpec> = specs
        .iter()
        .filter(|s| needed.contains(s.name.as_str()))
        .cloned()
        .collect();
    build_order(&subset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{BuildTime, ContextOptions};

    fn spec(name: &str, dependencies: &[&str]) -> ImageSpec {
        ImageSpec {
            name: name.to_string(),
            image_reference: name.to_string(),
            description: None,
            instructions: Vec::new(),
            context: ContextOptions::disabled("."),
            mtime: BuildTime::Unknown,
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            extra_context: Vec::new(),
            config_root: ".".into(),
        }
    }

    #[test]
    fn test_dependencies_come_first() {
        let specs = vec![
            spec("app", &["base", "tools"]),
            spec("tools", &["base"]),
            spec("base", &[]),
        ];
        assert_eq!(build_order(&specs).unwrap(), vec!["base", "tools", "app"]);
    }

    #[test]
    fn test_ties_break_by_name() {
        let specs = vec![spec("zeta", &[]), spec("alpha", &[]), spec("mid", &["zeta"])];
        assert_eq!(build_order(&specs).unwrap(), vec!["alpha", "zeta", "mid"]);

        let reversed: Vec<ImageSpec> = specs.into_iter().rev().collect();
        assert_eq!(build_order(&reversed).unwrap(), vec!["alpha", "zeta", "mid"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let specs = vec![
            spec("a", &["b"]),
            spec("b", &["c"]),
            spec("c", &["a"]),
            spec("free", &[]),
        ];
        let GraphError::DependencyCycle { cycle } = build_order(&specs).unwrap_err();
        assert_eq!(cycle, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_dependency_is_not_an_edge() {
        let specs = vec![spec("app", &["gone"])];
        assert_eq!(build_order(&specs).unwrap(), vec!["app"]);
    }

    #[test]
    fn test_build_chain() {
        let specs = vec![
            spec("app", &["tools"]),
            spec("tools", &["base"]),
            spec("base", &[]),
            spec("other", &["base"]),
        ];
        assert_eq!(build_chain(&specs, "app").unwrap(), vec!["base", "tools", "app"]);
        assert_eq!(build_chain(&specs, "base").unwrap(), vec!["base"]);
        assert!(build_chain(&specs, "missing").unwrap().is_empty());
    }
}
