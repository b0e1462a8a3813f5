//! The configuration handle and the create-or-load flow.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::coerce::coerce;
use crate::document::{Document, Provenance};
use crate::error::AnnofigError;
use crate::file;
use crate::mapper::{self, LoadReport};
use crate::ops::{self, Entry, Listing};
use crate::path;
use crate::schema::{self, InstanceGraph, PropertyDescriptor, Schema, SchemaTree, SectionId};
use crate::toml_doc::TomlDocument;
use crate::types::{ConfigField, DefaultSource, RenderOptions, Value};

/// A live configuration bound to one file.
///
/// Built by [`create`](Self::create), [`create_with_default`](Self::create_with_default)
/// or [`AnnofigBuilder::create`](crate::AnnofigBuilder::create). Construction
/// discovers the schema of `S`, makes sure the file exists, loads it, and then
/// saves it straight back. That final save is deliberate: it fills in every
/// absent property and normalizes the file, so the on-disk document always
/// reflects the full schema after a successful construction.
///
/// The handle is not synchronized. Wrap it in a lock to share it between threads.
pub struct Configuration<S: Schema, D: Document = TomlDocument> {
    path: PathBuf,
    tree: SchemaTree,
    graph: InstanceGraph,
    document: D,
    render_options: RenderOptions,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema> Configuration<S> {
    /// Create or load the TOML file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, AnnofigError> {
        Self::open(path.into(), None, RenderOptions::default())
    }

    /// Like [`create`](Self::create), seeding a newly created file from `default`.
    pub fn create_with_default(
        path: impl Into<PathBuf>,
        default: DefaultSource,
    ) -> Result<Self, AnnofigError> {
        Self::open(path.into(), Some(&default), RenderOptions::default())
    }
}

impl<S: Schema, D: Document> Configuration<S, D> {
    pub(crate) fn open(
        path: PathBuf,
        default: Option<&DefaultSource>,
        render_options: RenderOptions,
    ) -> Result<Self, AnnofigError> {
        let (tree, graph) = schema::discover::<S>()?;
        file::ensure_file(&path, default)?;

        let mut config = Self {
            path,
            tree,
            graph,
            document: D::default(),
            render_options,
            _schema: PhantomData,
        };
        config.reload()?;
        config.save()?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &SchemaTree {
        &self.tree
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.render_options
    }

    /// Re-read the file and apply every compatible value.
    ///
    /// Properties that are missing from the file, or hold an incompatible value,
    /// keep their current value.
    pub fn reload(&mut self) -> Result<LoadReport, AnnofigError> {
        let doc = self.read_document()?;
        let report = mapper::load(&doc, &self.tree, &mut self.graph)?;
        self.document = doc;
        Ok(report)
    }

    /// Write every current value back to the file.
    ///
    /// The file is re-read first so that comments and unknown keys written by
    /// someone else since the last load are kept.
    pub fn save(&mut self) -> Result<(), AnnofigError> {
        let mut doc = self.read_document()?;
        mapper::write_document(&mut doc, &self.tree, &self.graph, &self.path)?;
        file::write_atomic(&self.path, &doc.render(&self.render_options))?;
        tracing::info!(path = %self.path.display(), "saved configuration");
        self.document = doc;
        Ok(())
    }

    /// The document as of the last load or save, rendered with this instance's
    /// render options.
    pub fn rendered_text(&self) -> String {
        self.document.render(&self.render_options)
    }

    /// Typed value of the property at dotted `key`.
    pub fn get<T: ConfigField>(&self, key: &str) -> Result<T, AnnofigError> {
        let (id, property) = self.property(key)?;
        let value = self.slot(id, property, key)?;
        T::from_value(value).ok_or_else(|| AnnofigError::TypeMismatch {
            key: key.to_string(),
            expected: property.field_type.clone(),
            found: T::field_type().to_string(),
        })
    }

    /// Raw slot value of the property at dotted `key`.
    pub fn value(&self, key: &str) -> Result<&Value, AnnofigError> {
        let (id, property) = self.property(key)?;
        self.slot(id, property, key)
    }

    /// Assign a new value in memory. Call [`save`](Self::save) to persist it.
    ///
    /// The value goes through the same compatibility rules as a loaded value.
    pub fn set<T: ConfigField>(&mut self, key: &str, value: T) -> Result<(), AnnofigError> {
        let (id, slot, coerced) = {
            let (id, property) = self.property(key)?;
            let raw = value.into_value();
            let found = if raw.is_null() {
                "null".to_string()
            } else {
                T::field_type().to_string()
            };
            let coerced = coerce(&raw, &property.field_type, property.nullable).ok_or_else(
                || AnnofigError::TypeMismatch {
                    key: key.to_string(),
                    expected: property.field_type.clone(),
                    found,
                },
            )?;
            (id, property.slot, coerced)
        };
        if !self.graph.set(id, slot, coerced) {
            return Err(AnnofigError::FieldAccess {
                field: key.to_string(),
                reason: "no runtime slot for declared property".into(),
            });
        }
        tracing::trace!(key, "value set");
        Ok(())
    }

    /// Every property with its current value, in discovery order.
    pub fn entries(&self) -> Result<Listing, AnnofigError> {
        ops::list_values(&self.tree, &self.graph)
    }

    /// One property with its current value and declared comments.
    pub fn describe(&self, key: &str) -> Result<Entry, AnnofigError> {
        ops::get_value(&self.tree, &self.graph, key)
    }

    /// Deserialize the current values into `T`.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, AnnofigError> {
        ops::extract(&self.tree, &self.graph)
    }

    /// Whether the node at dotted `key` was read from the file or written by the
    /// last save. `None` if the document has no such node.
    pub fn provenance(&self, key: &str) -> Option<Provenance> {
        self.document.provenance(&path::split_path(key))
    }

    fn read_document(&self) -> Result<D, AnnofigError> {
        let text = file::read_file(&self.path)?;
        D::parse(&text).map_err(|source| AnnofigError::ParseError {
            path: self.path.clone(),
            source,
        })
    }

    fn property(&self, key: &str) -> Result<(SectionId, &PropertyDescriptor), AnnofigError> {
        self.tree
            .find_property(key)
            .ok_or_else(|| AnnofigError::KeyNotFound(key.into()))
    }

    fn slot(
        &self,
        id: SectionId,
        property: &PropertyDescriptor,
        key: &str,
    ) -> Result<&Value, AnnofigError> {
        self.graph
            .get(id, property.slot)
            .ok_or_else(|| AnnofigError::FieldAccess {
                field: key.to_string(),
                reason: "no runtime slot for declared property".into(),
            })
    }
}
