//! Schema declaration and discovery.
//!
//! A configuration type implements [`Schema`] and registers its root properties
//! and child sections on a [`SectionBuilder`], in the order they should appear in
//! the document. Child sections are either typed ([`Section`]) or inline closures.
//!
//! [`discover`] walks those declarations depth-first, starting at the root
//! (depth 1). Each section's declaration runs only when the walker reaches it, one
//! level below the section that declared it, so a section is always discovered at
//! exactly its declared depth. The walk produces two parallel structures indexed by
//! [`SectionId`]:
//!
//! - a [`SchemaTree`]: keys, declared types, defaults, and comments;
//! - an [`InstanceGraph`]: one runtime instance per section holding the live slot
//!   values, each with a non-owning link to its enclosing section's instance.
//!
//! Any invalid declaration fails the whole discovery. A partially discovered
//! schema is never returned.

use std::any::{TypeId, type_name};
use std::collections::HashSet;

use crate::error::AnnofigError;
use crate::path;
use crate::types::{ConfigField, FieldType, Value};

/// The root of a configuration schema.
pub trait Schema: 'static {
    fn declare(root: &mut SectionBuilder);
}

/// A named section that can be nested inside the root or another section.
pub trait Section: 'static {
    /// The section's own path segment.
    const KEY: &'static str;

    fn declare(section: &mut SectionBuilder);
}

/// Index of a section in both the [`SchemaTree`] and the [`InstanceGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(usize);

impl SectionId {
    pub const ROOT: SectionId = SectionId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// One declared property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub key: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub comments: Vec<String>,
    pub default: Value,
    /// Position of the property's value in its section instance.
    pub slot: usize,
}

/// One discovered section. The root has no key and no comments.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub key: Option<String>,
    pub parent: Option<SectionId>,
    pub depth: usize,
    pub comments: Vec<String>,
    pub properties: Vec<PropertyDescriptor>,
    pub children: Vec<SectionId>,
}

impl SchemaNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// The discovered schema, in discovery (pre-order) order.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaTree {
    nodes: Vec<SchemaNode>,
}

impl SchemaTree {
    pub fn root(&self) -> &SchemaNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: SectionId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// Sections in discovery order, root first.
    pub fn sections(&self) -> impl Iterator<Item = (SectionId, &SchemaNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (SectionId(i), n))
    }

    /// Every property in discovery order, paired with its owning section.
    pub fn properties(&self) -> impl Iterator<Item = (SectionId, &PropertyDescriptor)> {
        self.sections()
            .flat_map(|(id, node)| node.properties.iter().map(move |p| (id, p)))
    }

    /// Find a property by its full dotted path.
    pub fn find_property(&self, dotted: &str) -> Option<(SectionId, &PropertyDescriptor)> {
        self.properties()
            .find(|(id, p)| path::property_path(self, *id, &p.key) == dotted)
    }
}

/// Runtime instance of one section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionInstance {
    parent: Option<SectionId>,
    slots: Vec<Value>,
}

impl SectionInstance {
    fn new(parent: Option<SectionId>, slots: Vec<Value>) -> Self {
        Self { parent, slots }
    }

    /// The enclosing section's instance. Set once at construction.
    pub fn parent(&self) -> Option<SectionId> {
        self.parent
    }

    pub fn slots(&self) -> &[Value] {
        &self.slots
    }
}

/// All live section instances, indexed like the [`SchemaTree`].
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceGraph {
    sections: Vec<SectionInstance>,
}

impl InstanceGraph {
    pub fn section(&self, id: SectionId) -> Option<&SectionInstance> {
        self.sections.get(id.0)
    }

    pub fn get(&self, id: SectionId, slot: usize) -> Option<&Value> {
        self.sections.get(id.0)?.slots.get(slot)
    }

    /// Replace a slot value. Returns `false` if the slot does not exist.
    pub fn set(&mut self, id: SectionId, slot: usize, value: Value) -> bool {
        match self
            .sections
            .get_mut(id.0)
            .and_then(|s| s.slots.get_mut(slot))
        {
            Some(current) => {
                *current = value;
                true
            }
            None => false,
        }
    }
}

type Declare = Box<dyn FnOnce(&mut SectionBuilder)>;

struct ChildDecl {
    key: String,
    origin: Option<(TypeId, &'static str)>,
    declare: Declare,
}

/// Collects the declarations of one section.
pub struct SectionBuilder {
    depth: usize,
    comments: Vec<String>,
    properties: Vec<PropertyDescriptor>,
    children: Vec<ChildDecl>,
}

impl SectionBuilder {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            comments: Vec::new(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Nesting depth of the section being declared; the root is at depth 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Add a comment line to this section. Not allowed on the root.
    pub fn comment(&mut self, line: impl Into<String>) -> &mut Self {
        self.comments.extend(split_lines(line.into()));
        self
    }

    /// Declare a property. Its type is taken from `T` and its default from `default`.
    pub fn property<T: ConfigField>(&mut self, key: &str, default: T) -> PropertyBuilder<'_> {
        let slot = self.properties.len();
        self.properties.push(PropertyDescriptor {
            key: key.to_string(),
            field_type: T::field_type(),
            nullable: T::nullable(),
            comments: Vec::new(),
            default: default.into_value(),
            slot,
        });
        PropertyBuilder {
            property: &mut self.properties[slot],
        }
    }

    /// Declare a typed child section.
    pub fn section<T: Section>(&mut self) -> &mut Self {
        self.children.push(ChildDecl {
            key: T::KEY.to_string(),
            origin: Some((TypeId::of::<T>(), type_name::<T>())),
            declare: Box::new(T::declare),
        });
        self
    }

    /// Declare an inline child section.
    pub fn section_with<F>(&mut self, key: &str, declare: F) -> &mut Self
    where
        F: FnOnce(&mut SectionBuilder) + 'static,
    {
        self.children.push(ChildDecl {
            key: key.to_string(),
            origin: None,
            declare: Box::new(declare),
        });
        self
    }
}

/// Returned by [`SectionBuilder::property`] to attach comments.
pub struct PropertyBuilder<'a> {
    property: &'a mut PropertyDescriptor,
}

impl PropertyBuilder<'_> {
    pub fn comment(self, line: impl Into<String>) -> Self {
        self.property.comments.extend(split_lines(line.into()));
        self
    }
}

/// One comment line per line break, so no line leaves the comment marker.
fn split_lines(text: String) -> Vec<String> {
    if !text.contains('\n') {
        return vec![text];
    }
    text.split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

/// Discover the schema of `S` and build a fresh instance graph holding the defaults.
pub fn discover<S: Schema>() -> Result<(SchemaTree, InstanceGraph), AnnofigError> {
    let mut walker = Walker::default();
    walker.walk(None, None, String::new(), 1, Box::new(S::declare))?;
    Ok((
        SchemaTree {
            nodes: walker.nodes,
        },
        InstanceGraph {
            sections: walker.instances,
        },
    ))
}

#[derive(Default)]
struct Walker {
    nodes: Vec<SchemaNode>,
    instances: Vec<SectionInstance>,
    /// Typed sections currently being walked, outermost first.
    ancestors: Vec<TypeId>,
}

impl Walker {
    fn walk(
        &mut self,
        parent: Option<SectionId>,
        key: Option<String>,
        section_path: String,
        depth: usize,
        declare: Declare,
    ) -> Result<SectionId, AnnofigError> {
        let mut builder = SectionBuilder::new(depth);
        declare(&mut builder);
        validate(&builder, &section_path, parent.is_none())?;

        let id = SectionId(self.nodes.len());
        if let Some(parent) = parent {
            debug_assert_eq!(self.nodes[parent.0].depth + 1, depth);
        }

        let defaults = builder.properties.iter().map(|p| p.default.clone()).collect();
        self.instances.push(SectionInstance::new(parent, defaults));
        self.nodes.push(SchemaNode {
            key,
            parent,
            depth,
            comments: builder.comments,
            properties: builder.properties,
            children: Vec::new(),
        });
        tracing::trace!(section = %display_path(&section_path), depth, "discovered section");

        for child in builder.children {
            let child_path = path::join(&section_path, &child.key);
            if let Some((type_id, name)) = child.origin {
                if self.ancestors.contains(&type_id) {
                    return Err(AnnofigError::Discovery {
                        section: child_path,
                        reason: format!("section type {name} is nested inside itself"),
                    });
                }
                self.ancestors.push(type_id);
            }
            let child_id =
                self.walk(Some(id), Some(child.key), child_path, depth + 1, child.declare)?;
            if child.origin.is_some() {
                self.ancestors.pop();
            }
            self.nodes[id.0].children.push(child_id);
        }

        Ok(id)
    }
}

fn display_path(section_path: &str) -> &str {
    if section_path.is_empty() {
        "<root>"
    } else {
        section_path
    }
}

fn validate(builder: &SectionBuilder, section_path: &str, is_root: bool) -> Result<(), AnnofigError> {
    let fail = |reason: String| AnnofigError::Discovery {
        section: display_path(section_path).to_string(),
        reason,
    };

    if is_root && !builder.comments.is_empty() {
        return Err(fail("the root section cannot carry comments".into()));
    }

    let keys = builder
        .properties
        .iter()
        .map(|p| p.key.as_str())
        .chain(builder.children.iter().map(|c| c.key.as_str()));

    let mut seen = HashSet::new();
    for key in keys {
        if key.is_empty() {
            return Err(fail("empty key".into()));
        }
        if key.contains('.') {
            return Err(fail(format!("key '{key}' contains '.'")));
        }
        if !seen.insert(key) {
            return Err(fail(format!("duplicate key '{key}'")));
        }
    }
    Ok(())
}
