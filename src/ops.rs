//! Read-side operations: listing, key description, template generation, and typed
//! extraction.
//!
//! These work on a discovered [`SchemaTree`] and its [`InstanceGraph`] and never
//! touch the filesystem. [`Configuration`](crate::Configuration) exposes them as
//! methods.

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::document::Document;
use crate::error::AnnofigError;
use crate::mapper;
use crate::path;
use crate::schema::{self, InstanceGraph, Schema, SchemaTree, SectionId};
use crate::toml_doc::TomlDocument;
use crate::types::{RenderOptions, Value};

/// A property's dotted key, current value, and declared comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub value: Value,
    pub comments: Vec<String>,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.comments {
            writeln!(f, "# {line}")?;
        }
        write!(f, "{} = {}", self.key, self.value)
    }
}

/// Every property in discovery order.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub entries: Vec<Entry>,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{} = {}", entry.key, entry.value)?;
        }
        Ok(())
    }
}

/// List every property with its current value.
pub fn list_values(tree: &SchemaTree, graph: &InstanceGraph) -> Result<Listing, AnnofigError> {
    let entries = tree
        .properties()
        .map(|(id, property)| {
            let key = path::property_path(tree, id, &property.key);
            let value = slot_value(graph, id, property.slot, &key)?;
            Ok(Entry {
                key,
                value: value.clone(),
                comments: property.comments.clone(),
            })
        })
        .collect::<Result<Vec<_>, AnnofigError>>()?;
    Ok(Listing { entries })
}

/// Describe one property by its dotted key.
pub fn get_value(
    tree: &SchemaTree,
    graph: &InstanceGraph,
    key: &str,
) -> Result<Entry, AnnofigError> {
    let (id, property) = tree
        .find_property(key)
        .ok_or_else(|| AnnofigError::KeyNotFound(key.into()))?;
    let value = slot_value(graph, id, property.slot, key)?;
    Ok(Entry {
        key: key.to_string(),
        value: value.clone(),
        comments: property.comments.clone(),
    })
}

/// Render the defaults-only document for `S`, with every declared comment.
pub fn generate_template<S: Schema>(options: &RenderOptions) -> Result<String, AnnofigError> {
    let (tree, graph) = schema::discover::<S>()?;
    let mut doc = TomlDocument::default();
    mapper::write_document(&mut doc, &tree, &graph, Path::new("<template>"))?;
    Ok(doc.render(options))
}

/// Nested JSON view of the current values: one object per section.
pub fn to_json(tree: &SchemaTree, graph: &InstanceGraph) -> Result<serde_json::Value, AnnofigError> {
    section_json(tree, graph, SectionId::ROOT)
}

fn section_json(
    tree: &SchemaTree,
    graph: &InstanceGraph,
    id: SectionId,
) -> Result<serde_json::Value, AnnofigError> {
    let node = tree.node(id);
    let mut object = serde_json::Map::new();
    for property in &node.properties {
        let key = path::property_path(tree, id, &property.key);
        let value = slot_value(graph, id, property.slot, &key)?;
        object.insert(property.key.clone(), value.into());
    }
    for &child in &node.children {
        if let Some(key) = &tree.node(child).key {
            object.insert(key.clone(), section_json(tree, graph, child)?);
        }
    }
    Ok(serde_json::Value::Object(object))
}

/// Deserialize the current values into `T`.
pub fn extract<T: DeserializeOwned>(
    tree: &SchemaTree,
    graph: &InstanceGraph,
) -> Result<T, AnnofigError> {
    Ok(serde_json::from_value(to_json(tree, graph)?)?)
}

fn slot_value<'a>(
    graph: &'a InstanceGraph,
    id: SectionId,
    slot: usize,
    key: &str,
) -> Result<&'a Value, AnnofigError> {
    graph.get(id, slot).ok_or_else(|| AnnofigError::FieldAccess {
        field: key.to_string(),
        reason: "no runtime slot for declared property".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{AppConfig, AppSchema, Counter, ServerConfig, TlsConfig};
    use crate::schema::discover;
    use pretty_assertions::assert_eq;

    #[test]
    fn list_values_in_discovery_order() {
        let (tree, graph) = discover::<Counter>().unwrap();
        let listing = list_values(&tree, &graph).unwrap();
        let keys: Vec<&str> = listing.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["count", "a.name"]);
        assert_eq!(listing.to_string(), "count = 1\na.name = <not set>");
    }

    #[test]
    fn get_value_includes_comments() {
        let (tree, graph) = discover::<AppSchema>().unwrap();
        let entry = get_value(&tree, &graph, "server.tls.cert").unwrap();
        assert_eq!(entry.value, Value::Null);
        assert_eq!(
            entry.to_string(),
            "# Path to the certificate.\n# Leave unset to disable TLS.\nserver.tls.cert = <not set>"
        );
    }

    #[test]
    fn get_value_unknown_key() {
        let (tree, graph) = discover::<AppSchema>().unwrap();
        let err = get_value(&tree, &graph, "server.nope").unwrap_err();
        assert!(matches!(err, AnnofigError::KeyNotFound(k) if k == "server.nope"));
    }

    #[test]
    fn listing_formats_collections() {
        let (tree, graph) = discover::<AppSchema>().unwrap();
        let listing = list_values(&tree, &graph).unwrap().to_string();
        assert!(listing.contains("tags = [\"alpha\"]"));
        assert!(listing.contains("server.limits = {}"));
        assert!(listing.contains("server.host = 127.0.0.1"));
    }

    #[test]
    fn template_contains_declared_comments() {
        let template = generate_template::<AppSchema>(&RenderOptions::default()).unwrap();
        assert!(template.contains("# Application name.\nname = \"demo\""));
        assert!(template.contains("# Server settings.\n[server]"));
        assert!(template.contains(
            "# Path to the certificate.\n# Leave unset to disable TLS.\n# cert =\nenabled = false"
        ));
        assert!(!template.contains("\ncert ="));
    }

    #[test]
    fn template_without_comments() {
        let options = RenderOptions {
            comments: false,
            section_spacing: false,
        };
        let template = generate_template::<Counter>(&options).unwrap();
        assert_eq!(template, "count = 1\n[a]\n");
    }

    #[test]
    fn to_json_nests_sections() {
        let (tree, graph) = discover::<Counter>().unwrap();
        let json = to_json(&tree, &graph).unwrap();
        assert_eq!(json, serde_json::json!({ "count": 1, "a": { "name": null } }));
    }

    #[test]
    fn extract_typed_snapshot() {
        let (tree, graph) = discover::<AppSchema>().unwrap();
        let config: AppConfig = extract(&tree, &graph).unwrap();
        assert_eq!(
            config,
            AppConfig {
                name: "demo".into(),
                count: 1,
                ratio: 0.5,
                verbose: false,
                tags: vec!["alpha".into()],
                server: ServerConfig {
                    host: "127.0.0.1".into(),
                    port: 8080,
                    tls: TlsConfig {
                        cert: None,
                        enabled: false,
                    },
                },
            }
        );
    }

    #[test]
    fn extract_mismatch_is_error() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Wrong {
            count: String,
        }
        let (tree, graph) = discover::<Counter>().unwrap();
        let err = extract::<Wrong>(&tree, &graph).unwrap_err();
        assert!(matches!(err, AnnofigError::Extract(_)));
    }
}
