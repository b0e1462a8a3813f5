//! Moves values between a [`Document`] and the [`InstanceGraph`].
//!
//! [`load`] copies every compatible document value into its slot and leaves
//! everything else untouched. [`write_document`] does the reverse: it writes every
//! section and every slot back at its resolved path, keeping comments that are
//! already in the document and falling back to the declared ones. Neither function
//! does any I/O.

use std::path::Path;

use crate::coerce::{classify, coerce};
use crate::document::Document;
use crate::error::AnnofigError;
use crate::path;
use crate::schema::{InstanceGraph, SchemaTree};

/// What a [`load`] pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Properties whose slot received a document value.
    pub applied: usize,
    /// Dotted paths whose document value was incompatible with the declared type.
    pub skipped: Vec<String>,
}

/// Populate the instance graph from `doc`.
///
/// Missing paths and incompatible values are not errors.
pub fn load<D: Document>(
    doc: &D,
    tree: &SchemaTree,
    graph: &mut InstanceGraph,
) -> Result<LoadReport, AnnofigError> {
    let mut report = LoadReport::default();

    for (id, property) in tree.properties() {
        let dotted = path::property_path(tree, id, &property.key);
        let segments = path::split_path(&dotted);

        let Some(raw) = doc.get(&segments) else {
            tracing::trace!(path = %dotted, "not in document, keeping current value");
            continue;
        };

        match coerce(&raw, &property.field_type, property.nullable) {
            Some(value) => {
                if !graph.set(id, property.slot, value) {
                    return Err(missing_slot(&dotted));
                }
                tracing::trace!(path = %dotted, "loaded");
                report.applied += 1;
            }
            None => {
                tracing::debug!(
                    path = %dotted,
                    expected = %property.field_type,
                    found = %classify(&raw),
                    "skipping incompatible value"
                );
                report.skipped.push(dotted);
            }
        }
    }

    Ok(report)
}

/// Write every section and slot into `doc`.
///
/// `target` is only used to identify the file in errors.
pub fn write_document<D: Document>(
    doc: &mut D,
    tree: &SchemaTree,
    graph: &InstanceGraph,
    target: &Path,
) -> Result<(), AnnofigError> {
    let save_error = |source| AnnofigError::SaveError {
        path: target.to_path_buf(),
        source,
    };

    for (id, node) in tree.sections().filter(|(_, n)| !n.is_root()) {
        let dotted = path::section_path(tree, id);
        let segments = path::split_path(&dotted);
        let comments = doc
            .comments(&segments)
            .unwrap_or_else(|| node.comments.clone());
        doc.ensure_section(&segments, &comments).map_err(save_error)?;
    }

    for (id, property) in tree.properties() {
        let dotted = path::property_path(tree, id, &property.key);
        let segments = path::split_path(&dotted);
        let value = graph
            .get(id, property.slot)
            .ok_or_else(|| missing_slot(&dotted))?;

        let comments = match doc.comments(&segments) {
            Some(existing) => existing,
            None => {
                tracing::debug!(path = %dotted, value = %value, "filling absent value");
                property.comments.clone()
            }
        };
        doc.set(&segments, value, &comments).map_err(save_error)?;
        tracing::trace!(path = %dotted, "written");
    }

    Ok(())
}

fn missing_slot(dotted: &str) -> AnnofigError {
    AnnofigError::FieldAccess {
        field: dotted.to_string(),
        reason: "no runtime slot for declared property".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Provenance;
    use crate::fixtures::test::{AppSchema, Counter, Nested};
    use crate::schema::{SectionId, discover};
    use crate::toml_doc::TomlDocument;
    use crate::types::{RenderOptions, Value};
    use pretty_assertions::assert_eq;

    fn save_text<S: crate::schema::Schema>(input: &str) -> String {
        let (tree, mut graph) = discover::<S>().unwrap();
        let doc = TomlDocument::parse(input).unwrap();
        load(&doc, &tree, &mut graph).unwrap();
        let mut doc = TomlDocument::parse(input).unwrap();
        write_document(&mut doc, &tree, &graph, Path::new("test.toml")).unwrap();
        doc.render(&RenderOptions::default())
    }

    fn slot(tree: &SchemaTree, graph: &InstanceGraph, dotted: &str) -> Value {
        let (id, p) = tree.find_property(dotted).unwrap();
        graph.get(id, p.slot).unwrap().clone()
    }

    #[test]
    fn load_applies_compatible_values() {
        let (tree, mut graph) = discover::<Counter>().unwrap();
        let doc = TomlDocument::parse("count = 414\n[a]\nname = \"X\"\n").unwrap();
        let report = load(&doc, &tree, &mut graph).unwrap();
        assert_eq!(report.applied, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(slot(&tree, &graph, "count"), Value::Integer(414));
        assert_eq!(slot(&tree, &graph, "a.name"), Value::String("X".into()));
    }

    #[test]
    fn load_missing_paths_keep_defaults() {
        let (tree, mut graph) = discover::<AppSchema>().unwrap();
        let report = load(&TomlDocument::default(), &tree, &mut graph).unwrap();
        assert_eq!(report, LoadReport::default());
        for (id, p) in tree.properties() {
            assert_eq!(graph.get(id, p.slot), Some(&p.default));
        }
    }

    #[test]
    fn load_skips_incompatible_values() {
        let (tree, mut graph) = discover::<AppSchema>().unwrap();
        let doc = TomlDocument::parse("count = \"many\"\nverbose = true\n").unwrap();
        let report = load(&doc, &tree, &mut graph).unwrap();
        assert_eq!(report.skipped, vec!["count".to_string()]);
        assert_eq!(slot(&tree, &graph, "count"), Value::Integer(1));
        assert_eq!(slot(&tree, &graph, "verbose"), Value::Boolean(true));
    }

    #[test]
    fn load_skips_byte_overflow() {
        let (tree, mut graph) = discover::<AppSchema>().unwrap();
        let doc = TomlDocument::parse("[server]\nbacklog = 414\nretries = 414\n").unwrap();
        let report = load(&doc, &tree, &mut graph).unwrap();
        assert_eq!(report.skipped, vec!["server.backlog".to_string()]);
        assert_eq!(slot(&tree, &graph, "server.backlog"), Value::Integer(16));
        assert_eq!(slot(&tree, &graph, "server.retries"), Value::Integer(414));
    }

    #[test]
    fn load_keeps_previous_value_not_default() {
        let (tree, mut graph) = discover::<Counter>().unwrap();
        let first = TomlDocument::parse("count = 7\n").unwrap();
        load(&first, &tree, &mut graph).unwrap();
        let second = TomlDocument::parse("count = 1.5\n").unwrap();
        load(&second, &tree, &mut graph).unwrap();
        assert_eq!(slot(&tree, &graph, "count"), Value::Integer(7));
    }

    #[test]
    fn load_through_scalar_is_skip() {
        let (tree, mut graph) = discover::<Counter>().unwrap();
        let doc = TomlDocument::parse("a = 3\n").unwrap();
        let report = load(&doc, &tree, &mut graph).unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(slot(&tree, &graph, "a.name"), Value::Null);
    }

    #[test]
    fn save_fresh_document_writes_defaults() {
        assert_eq!(save_text::<Counter>(""), "count = 1\n\n[a]\n# name =\n");
    }

    #[test]
    fn save_nested_paths() {
        assert_eq!(
            save_text::<Nested>(""),
            "x = 0\n\n[a]\n\n[a.b]\nname = \"n\"\n"
        );
    }

    #[test]
    fn save_uses_declared_comments_for_absent_paths() {
        let text = save_text::<AppSchema>("");
        assert!(text.starts_with("# Application name.\nname = \"demo\"\n"));
        assert!(text.contains("# How many workers to start.\ncount = 1\n"));
        assert!(text.contains("\n# Server settings.\n[server]\n# Address to bind.\nhost = \"127.0.0.1\"\n"));
        assert!(text.contains(
            "\n# TLS settings.\n[server.tls]\n# Path to the certificate.\n\
             # Leave unset to disable TLS.\n# cert =\nenabled = false\n"
        ));
        assert!(text.contains("ratio = 0.5\n"));
        assert!(text.contains("tags = [\"alpha\"]\n"));
        assert!(text.contains("limits = {}\n"));
        assert!(text.contains("\n# Logging settings.\n[logging]\nlevel = \"info\"\n"));
    }

    #[test]
    fn save_keeps_existing_comments() {
        let input = "# mine\ncount = 5\n\n# my section\n[a]\n# name =\n";
        assert_eq!(save_text::<Counter>(input), input);
    }

    #[test]
    fn save_keeps_edited_comments_of_null_property() {
        let input = "[server.tls]\n# Mine.\n# cert =\nenabled = true\n";
        let text = save_text::<AppSchema>(input);
        assert!(text.contains("\n[server.tls]\n# Mine.\n# cert =\nenabled = true\n"));
        assert!(!text.contains("Path to the certificate."));
    }

    #[test]
    fn save_keeps_unknown_keys() {
        let text = save_text::<Counter>("extra = \"kept\"\n");
        assert_eq!(text, "extra = \"kept\"\ncount = 1\n\n[a]\n# name =\n");
    }

    #[test]
    fn save_is_idempotent() {
        let once = save_text::<AppSchema>("");
        let twice = save_text::<AppSchema>(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn save_writes_loaded_values() {
        let text = save_text::<Counter>("count = 414\n[a]\nname = \"X\"\n");
        assert_eq!(text, "count = 414\n\n[a]\nname = \"X\"\n");
    }

    #[test]
    fn save_marks_new_paths_synthesized() {
        let (tree, graph) = discover::<Counter>().unwrap();
        let mut doc = TomlDocument::parse("count = 2\n").unwrap();
        write_document(&mut doc, &tree, &graph, Path::new("t.toml")).unwrap();
        assert_eq!(doc.provenance(&["count"]), Some(Provenance::Parsed));
        assert_eq!(doc.provenance(&["a"]), Some(Provenance::Synthesized));
    }

    #[test]
    fn section_and_property_comments_share_paths() {
        let (tree, graph) = discover::<Nested>().unwrap();
        let mut doc = TomlDocument::default();
        write_document(&mut doc, &tree, &graph, Path::new("t.toml")).unwrap();
        let first = path::section_path(&tree, tree.node(SectionId::ROOT).children[0]);
        assert_eq!(first, "a");
        assert_eq!(doc.comments(&["a", "b", "name"]), Some(vec![]));
        assert_eq!(doc.comments(&["a", "b"]), Some(vec![]));
    }
}
