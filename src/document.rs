//! The document store interface.
//!
//! The mapper only talks to this trait. A backend owns one parsed document and
//! exposes path-based reads and writes over it. It keeps each node's attached
//! comment lines and renders the whole tree back to text. Paths are given as
//! segment slices (`["server", "port"]`), already split by the caller.
//!
//! [`TomlDocument`](crate::TomlDocument) is the bundled backend. Another format
//! only has to implement this trait; nothing in the mapper changes.

use thiserror::Error;

use crate::types::{RenderOptions, Value};

/// Where a document node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Present in the text the document was parsed from.
    Parsed,
    /// Written since the document was parsed.
    Synthesized,
}

#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("{0}")]
    Parse(String),

    #[error("invalid document path '{0}'")]
    InvalidPath(String),
}

pub trait Document: Default + Sized {
    /// Parse document text. Empty text is an empty document.
    fn parse(text: &str) -> Result<Self, DocumentError>;

    /// The value at `path`, or `None` if nothing is there.
    ///
    /// Containers are returned as [`Value::Map`] with their children.
    fn get(&self, path: &[&str]) -> Option<Value>;

    fn contains(&self, path: &[&str]) -> bool {
        self.get(path).is_some()
    }

    /// Comment lines attached to the node at `path`, or `None` if the node is absent.
    fn comments(&self, path: &[&str]) -> Option<Vec<String>>;

    /// Make sure a container exists at `path`, replacing anything that is not a
    /// container, and attach `comments` to it.
    fn ensure_section(&mut self, path: &[&str], comments: &[String]) -> Result<(), DocumentError>;

    /// Write `value` at `path` with `comments`, creating intermediate containers
    /// and overwriting whatever was there.
    fn set(&mut self, path: &[&str], value: &Value, comments: &[String])
    -> Result<(), DocumentError>;

    /// Provenance of the node at `path`, or `None` if it is absent.
    fn provenance(&self, path: &[&str]) -> Option<Provenance>;

    /// Render the whole document to canonical text.
    fn render(&self, options: &RenderOptions) -> String;
}
