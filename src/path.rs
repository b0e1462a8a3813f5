//! Dotted document paths for sections and properties.
//!
//! A section's path is the `.`-joined keys of its ancestors followed by its own
//! key, walking the parent links of the [`SchemaTree`]. The root's path is empty,
//! so root-level properties resolve to just their key. Load and save both depend
//! on these paths matching exactly; nothing here reads state beyond the tree.

use crate::schema::{SchemaTree, SectionId};

/// Resolve the dotted path of a section. The root resolves to `""`.
pub fn section_path(tree: &SchemaTree, id: SectionId) -> String {
    let mut segments = Vec::new();
    let mut current = Some(id);
    while let Some(section) = current {
        let node = tree.node(section);
        if let Some(key) = &node.key {
            segments.push(key.as_str());
        }
        current = node.parent;
    }
    segments.reverse();
    segments.join(".")
}

/// Resolve the full dotted path of a property owned by `section`.
pub fn property_path(tree: &SchemaTree, section: SectionId, key: &str) -> String {
    join(&section_path(tree, section), key)
}

/// Append `key` to `prefix`, omitting the separator for an empty prefix.
pub fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Split a dotted path into segments. The empty path has no segments.
pub fn split_path(dotted: &str) -> Vec<&str> {
    if dotted.is_empty() {
        Vec::new()
    } else {
        dotted.split('.').collect()
    }
}
