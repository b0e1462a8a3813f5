//! Annotated, self-describing configuration files for Rust applications.
//!
//! Declare a schema in code, point at a file, and go:
//!
//! ```ignore
//! struct AppSchema;
//!
//! impl Schema for AppSchema {
//!     fn declare(root: &mut SectionBuilder) {
//!         root.property("workers", 4i32).comment("How many workers to start.");
//!         root.section_with("server", |s| {
//!             s.comment("Network settings.");
//!             s.property("port", 8080i32);
//!         });
//!     }
//! }
//!
//! let config = Annofig::builder::<AppSchema>().app_name("myapp").create()?;
//! let workers: i32 = config.get("workers")?;
//! ```
//!
//! That call creates `myapp.toml` in the platform config directory if it is
//! missing, reads every value it can, and writes the file straight back with
//! every declared property present and commented.
//!
//! # Schema as source of truth
//!
//! A [`Schema`] registers root properties and child sections on a
//! [`SectionBuilder`] in the order they should appear in the file. Sections are
//! either types implementing [`Section`] or inline closures. Each property's Rust
//! type decides its declared type through [`ConfigField`]: `i8` is a byte, `f32`
//! a float, `Option<T>` a nullable `T`, `Vec<T>` a sequence, and so on.
//!
//! Discovery walks those declarations depth-first. A section is discovered only
//! one level below the section that declared it, and every section gets a
//! runtime instance that knows its enclosing instance. An invalid declaration
//! (duplicate key, dotted key, root comment, a section nested inside itself)
//! fails construction outright.
//!
//! # Lenient loading
//!
//! Loading never fails because of the file's content shape. A path that is
//! missing, or holds a value of the wrong kind, leaves the property at its
//! current value. Integers are range-checked into narrow widths, so `414` is
//! never squeezed into a byte. See [`coerce`] for the full table.
//!
//! # Comment provenance
//!
//! Saving writes every property back at its dotted path. Comments that are
//! already in the file are kept verbatim; paths the file lacks get the comments
//! declared in code. Unknown keys in the file are left alone. The file is
//! replaced atomically.
//!
//! # Documents
//!
//! The mapper works against the [`Document`] trait. [`TomlDocument`] is the
//! bundled backend, built on `toml_edit`.
//!
//! # Error handling
//!
//! All fallible operations return [`AnnofigError`]. Every error names the file,
//! section or property it is about.

pub mod coerce;
pub mod document;
pub mod error;
pub mod path;
pub mod schema;
pub mod types;

mod builder;
mod config;
mod file;
mod mapper;
mod ops;
mod toml_doc;

#[cfg(test)]
mod fixtures;

pub use builder::{Annofig, AnnofigBuilder};
pub use config::Configuration;
pub use document::{Document, DocumentError, Provenance};
pub use error::AnnofigError;
pub use mapper::LoadReport;
pub use ops::{Entry, Listing, generate_template};
pub use schema::{PropertyBuilder, Schema, Section, SectionBuilder, discover};
pub use toml_doc::TomlDocument;
pub use types::{ConfigField, DefaultSource, FieldType, Location, Number, RenderOptions, Value};
