//! Overlay-based merge tree.
//!
//! A `MergeTree` is an append-only log of writes. Nothing is merged when a
//! value is written; reads resolve a path by walking the log from the newest
//! record to the oldest.
//!
//! # Resolution
//!
//! - The newest record that reaches a path wins for non-mapping values.
//! - Mappings merge key by key with every older mapping at the same path,
//!   until an older non-mapping is met. Keys keep the order in which they
//!   first appeared in the log.
//! - A newer non-mapping written at a path, or at any prefix of it, hides
//!   every older record beneath that path.
//!
//! # Example
//!
//! ```rust
//! use harpoon_config::{ConfigValue, MergeTree, Source};
//!
//! let mut tree = MergeTree::new();
//! tree.set(&["images", "x"], ConfigValue::map_of([("tag", ConfigValue::string("1"))]), Source::Runtime);
//! tree.set(&["images", "x", "context"], ConfigValue::string("."), Source::Runtime);
//!
//! let x = tree.get(&["images", "x"]).unwrap();
//! assert_eq!(x.get("tag").and_then(|v| v.as_str()), Some("1"));
//! assert_eq!(x.get("context").and_then(|v| v.as_str()), Some("."));
//! ```

use crate::types::{ConfigValue, Source};
use indexmap::{IndexMap, IndexSet};
use std::borrow::Cow;
use std::sync::Arc;

/// One write into a `MergeTree`.
#[derive(Debug, Clone)]
pub struct MergeRecord {
    pub path: Vec<String>,
    pub value: ConfigValue,
    pub source: Source,
    /// Position in the log; larger is newer
    pub seq: u64,
}

/// Append-only overlay store with structural mapping merges.
///
/// Cloning is cheap: records are shared, only the log's spine is copied.
#[derive(Debug, Clone, Default)]
pub struct MergeTree {
    records: Vec<Arc<MergeRecord>>,
    next_seq: u64,
}

/// What a single record says about a path.
enum Lookup<'a> {
    /// The record is written somewhere else.
    Unrelated,
    /// The record covers the path but has no value there.
    Absent,
    /// A non-mapping sits above the path.
    Blocked,
    /// The record holds a value at the path.
    Found(&'a ConfigValue),
    /// The record is written below the path.
    Nested(ConfigValue),
}

impl MergeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write of `value` at `path`.
    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: ConfigValue, source: Source) {
        let record = MergeRecord {
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
            value,
            source,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.records.push(Arc::new(record));
    }

    /// Resolve the value at `path`, or `None` if nothing reaches it.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<ConfigValue> {
        let layers = self.layers(path);
        let layers: Vec<&ConfigValue> = layers.iter().map(|layer| &**layer).collect();
        merge_layers(&layers)
    }

    /// The whole merged tree.
    pub fn root(&self) -> Option<ConfigValue> {
        self.get::<&str>(&[])
    }

    pub fn contains<S: AsRef<str>>(&self, path: &[S]) -> bool {
        !self.layers(path).is_empty()
    }

    /// Keys of the mapping at `path`, in first-appearance order.
    pub fn keys<S: AsRef<str>>(&self, path: &[S]) -> Vec<String> {
        self.get(path)
            .and_then(|v| v.as_map().map(|m| m.keys().cloned().collect()))
            .unwrap_or_default()
    }

    /// Producer of the newest record that reaches `path`.
    pub fn source_of<S: AsRef<str>>(&self, path: &[S]) -> Option<&Source> {
        for record in self.records.iter().rev() {
            match lookup(record, path) {
                Lookup::Found(_) | Lookup::Nested(_) => return Some(&record.source),
                Lookup::Blocked => return None,
                Lookup::Unrelated | Lookup::Absent => {}
            }
        }
        None
    }

    pub fn get_str<S: AsRef<str>>(&self, path: &[S]) -> Option<String> {
        self.get(path).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn get_bool<S: AsRef<str>>(&self, path: &[S]) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }

    /// A view whose paths are relative to `prefix`.
    pub fn scoped<S: AsRef<str>>(&mut self, prefix: &[S]) -> ScopedTree<'_> {
        ScopedTree {
            tree: self,
            prefix: prefix.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// A copy of this tree with `overrides` written at `sub_path`.
    ///
    /// The copy shares every existing record with `self`; writes to either
    /// side are invisible to the other.
    pub fn clone_with<S: AsRef<str>>(
        &self,
        sub_path: &[S],
        overrides: ConfigValue,
        source: Source,
    ) -> MergeTree {
        let mut copy = self.clone();
        copy.set(sub_path, overrides, source);
        copy
    }

    /// The append log, oldest first.
    pub fn records(&self) -> &[Arc<MergeRecord>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every value reaching `path`, newest first, up to the first one that
    /// hides the rest.
    fn layers<S: AsRef<str>>(&self, path: &[S]) -> Vec<Cow<'_, ConfigValue>> {
        let mut layers = Vec::new();
        for record in self.records.iter().rev() {
            match lookup(record, path) {
                Lookup::Unrelated | Lookup::Absent => {}
                Lookup::Blocked => break,
                Lookup::Found(value) => {
                    let stop = !value.is_map();
                    layers.push(Cow::Borrowed(value));
                    if stop {
                        break;
                    }
                }
                Lookup::Nested(value) => layers.push(Cow::Owned(value)),
            }
        }
        layers
    }
}

fn lookup<'a, S: AsRef<str>>(record: &'a MergeRecord, path: &[S]) -> Lookup<'a> {
    let shared = record.path.len().min(path.len());
    if record.path[..shared]
        .iter()
        .zip(&path[..shared])
        .any(|(written, asked)| written.as_str() != asked.as_ref())
    {
        return Lookup::Unrelated;
    }

    if record.path.len() > path.len() {
        // Wrap the value so it sits at `path`.
        let mut value = record.value.clone();
        for key in record.path[path.len()..].iter().rev() {
            let source_info = value.source_info.clone();
            let mut map = IndexMap::new();
            map.insert(key.clone(), value);
            value = ConfigValue::new_map(map, source_info);
        }
        return Lookup::Nested(value);
    }

    let mut current = &record.value;
    for key in &path[record.path.len()..] {
        let key: &str = key.as_ref();
        match current.as_map() {
            Some(map) => match map.get(key) {
                Some(child) => current = child,
                None => return Lookup::Absent,
            },
            None => return Lookup::Blocked,
        }
    }
    Lookup::Found(current)
}

/// Merge values for one path, given newest first.
fn merge_layers(layers: &[&ConfigValue]) -> Option<ConfigValue> {
    let newest = *layers.first()?;
    if !newest.is_map() {
        return Some(newest.clone());
    }

    let maps: Vec<&ConfigValue> = layers.iter().copied().take_while(|v| v.is_map()).collect();

    let mut keys: IndexSet<&str> = IndexSet::new();
    for map in maps.iter().rev().filter_map(|v| v.as_map()) {
        keys.extend(map.keys().map(String::as_str));
    }

    let mut merged = IndexMap::with_capacity(keys.len());
    for key in keys {
        let children: Vec<&ConfigValue> = maps.iter().filter_map(|m| m.get(key)).collect();
        if let Some(child) = merge_layers(&children) {
            merged.insert(key.to_string(), child);
        }
    }
    Some(ConfigValue::new_map(merged, newest.source_info.clone()))
}

/// A prefixed view of a `MergeTree`.
///
/// Writes through the view land in the parent tree under the prefix.
#[derive(Debug)]
pub struct ScopedTree<'a> {
    tree: &'a mut MergeTree,
    prefix: Vec<String>,
}

impl ScopedTree<'_> {
    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: ConfigValue, source: Source) {
        let full = self.full_path(path);
        self.tree.set(&full, value, source);
    }

    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<ConfigValue> {
        self.tree.get(&self.full_path(path))
    }

    pub fn contains<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.tree.contains(&self.full_path(path))
    }

    /// A narrower view below this one.
    pub fn scoped<S: AsRef<str>>(&mut self, prefix: &[S]) -> ScopedTree<'_> {
        let prefix = self.full_path(prefix);
        ScopedTree {
            tree: &mut *self.tree,
            prefix,
        }
    }

    fn full_path<S: AsRef<str>>(&self, path: &[S]) -> Vec<String> {
        self.prefix
            .iter()
            .cloned()
            .chain(path.iter().map(|s| s.as_ref().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust2::Yaml;

    fn int(i: i64) -> ConfigValue {
        ConfigValue::new_scalar(Yaml::Integer(i), Default::default())
    }

    fn s(text: &str) -> ConfigValue {
        ConfigValue::string(text)
    }

    fn src(name: &str) -> Source {
        Source::Named(name.into())
    }

    #[test]
    fn test_empty_tree() {
        let tree = MergeTree::new();
        assert!(tree.root().is_none());
        assert!(!tree.contains(&["images"]));
        assert!(tree.keys(&["images"]).is_empty());
    }

    #[test]
    fn test_later_scalar_wins() {
        let mut tree = MergeTree::new();
        tree.set(&["a"], int(1), src("first"));
        tree.set(&["a"], int(2), src("second"));
        assert_eq!(tree.get(&["a"]).and_then(|v| v.as_i64()), Some(2));
        assert_eq!(tree.source_of(&["a"]), Some(&src("second")));
    }

    #[test]
    fn test_mappings_merge_key_by_key() {
        let mut tree = MergeTree::new();
        tree.set(&["p"], ConfigValue::map_of([("a", int(1)), ("b", int(2))]), src("1"));
        tree.set(&["p"], ConfigValue::map_of([("b", int(3)), ("c", int(4))]), src("2"));

        let merged = tree.get(&["p"]).unwrap();
        assert_eq!(tree.keys(&["p"]), vec!["a", "b", "c"]);
        assert_eq!(merged.get("a").and_then(|v| v.as_i64()), Some(1));
        assert_eq!(merged.get("b").and_then(|v| v.as_i64()), Some(3));
        assert_eq!(merged.get("c").and_then(|v| v.as_i64()), Some(4));
    }

    #[test]
    fn test_repeated_identical_writes_are_idempotent() {
        let mut tree = MergeTree::new();
        let value = ConfigValue::map_of([("a", int(1))]);
        tree.set(&["p"], value.clone(), src("1"));
        let once = tree.get(&["p"]).unwrap().to_yaml();
        tree.set(&["p"], value, src("1"));
        assert_eq!(tree.get(&["p"]).unwrap().to_yaml(), once);
    }

    #[test]
    fn test_nested_mappings_merge_recursively() {
        let mut tree = MergeTree::new();
        tree.set(
            &["images"],
            ConfigValue::map_of([("x", ConfigValue::map_of([("tag", s("1")), ("commands", s("FROM a"))]))]),
            src("root"),
        );
        tree.set(
            &["images"],
            ConfigValue::map_of([("x", ConfigValue::map_of([("tag", s("2"))]))]),
            src("override"),
        );

        let x = tree.get(&["images", "x"]).unwrap();
        assert_eq!(x.get("tag").and_then(|v| v.as_str()), Some("2"));
        assert_eq!(x.get("commands").and_then(|v| v.as_str()), Some("FROM a"));
    }

    #[test]
    fn test_scalar_replaces_mapping_wholesale() {
        let mut tree = MergeTree::new();
        tree.set(&["p"], ConfigValue::map_of([("a", int(1))]), src("1"));
        tree.set(&["p"], s("flat"), src("2"));
        assert_eq!(tree.get(&["p"]).and_then(|v| v.as_str().map(String::from)), Some("flat".into()));
        assert!(tree.get(&["p", "a"]).is_none());
    }

    #[test]
    fn test_mapping_replaces_scalar_wholesale() {
        let mut tree = MergeTree::new();
        tree.set(&["p"], s("flat"), src("1"));
        tree.set(&["p"], ConfigValue::map_of([("a", int(1))]), src("2"));
        let p = tree.get(&["p"]).unwrap();
        assert!(p.is_map());
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_arrays_are_replaced_not_merged() {
        let mut tree = MergeTree::new();
        tree.set(&["p"], ConfigValue::new_array(vec![int(1), int(2)], Default::default()), src("1"));
        tree.set(&["p"], ConfigValue::new_array(vec![int(3)], Default::default()), src("2"));
        assert_eq!(tree.get(&["p"]).unwrap().as_array().map(|a| a.len()), Some(1));
    }

    #[test]
    fn test_scalar_at_prefix_hides_older_values_beneath() {
        let mut tree = MergeTree::new();
        tree.set(&["a", "b", "c"], int(1), src("1"));
        tree.set(&["a"], s("flat"), src("2"));
        assert!(tree.get(&["a", "b", "c"]).is_none());
        assert!(!tree.contains(&["a", "b"]));
        assert_eq!(tree.source_of(&["a", "b"]), None);

        tree.set(&["a", "b", "c"], int(3), src("3"));
        assert_eq!(tree.get(&["a", "b", "c"]).and_then(|v| v.as_i64()), Some(3));
        assert!(tree.get(&["a"]).unwrap().is_map());
    }

    #[test]
    fn test_deep_write_is_visible_from_parent() {
        let mut tree = MergeTree::new();
        tree.set(&["images", "x", "tag"], s("1"), src("1"));
        let images = tree.get(&["images"]).unwrap();
        assert_eq!(
            images.get("x").and_then(|x| x.get("tag")).and_then(|v| v.as_str()),
            Some("1")
        );
        assert_eq!(tree.source_of(&["images"]), Some(&src("1")));
    }

    #[test]
    fn test_key_order_is_first_appearance() {
        let mut tree = MergeTree::new();
        tree.set(&["m", "z"], int(1), src("1"));
        tree.set(&["m", "a"], int(2), src("2"));
        tree.set(&["m", "z"], int(3), src("3"));
        assert_eq!(tree.keys(&["m"]), vec!["z", "a"]);
    }

    #[test]
    fn test_scoped_writes_visible_through_parent() {
        let mut tree = MergeTree::new();
        {
            let mut view = tree.scoped(&["images", "x"]);
            view.set(&["commands"], s("FROM alpine"), src("doc"));
            assert_eq!(view.prefix(), ["images", "x"]);
            assert_eq!(view.get(&["commands"]).and_then(|v| v.as_str().map(String::from)), Some("FROM alpine".into()));

            let mut inner = view.scoped(&["context"]);
            inner.set(&["enabled"], ConfigValue::new_scalar(Yaml::Boolean(false), Default::default()), src("doc"));
        }
        assert_eq!(tree.get_str(&["images", "x", "commands"]), Some("FROM alpine".into()));
        assert_eq!(tree.get_bool(&["images", "x", "context", "enabled"]), Some(false));
    }

    #[test]
    fn test_clone_diverges_without_disturbing_original() {
        let mut tree = MergeTree::new();
        tree.set(&["harpoon"], ConfigValue::map_of([("chosen_image", s("first")), ("debug", int(1))]), src("root"));

        let copy = tree.clone_with(
            &["harpoon"],
            ConfigValue::map_of([("chosen_image", s("other"))]),
            Source::CommandLine,
        );

        assert_eq!(tree.get_str(&["harpoon", "chosen_image"]), Some("first".into()));
        assert_eq!(copy.get_str(&["harpoon", "chosen_image"]), Some("other".into()));
        assert_eq!(copy.get(&["harpoon", "debug"]).and_then(|v| v.as_i64()), Some(1));
        assert!(Arc::ptr_eq(&tree.records()[0], &copy.records()[0]));

        tree.set(&["late"], int(1), src("late"));
        assert!(!copy.contains(&["late"]));
    }

    #[test]
    fn test_records_are_sequenced() {
        let mut tree = MergeTree::new();
        tree.set(&["a"], int(1), src("1"));
        tree.set(&["b"], int(2), src("2"));
        let seqs: Vec<u64> = tree.records().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(tree.len(), 2);
    }
}
