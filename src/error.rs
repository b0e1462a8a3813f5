use std::path::PathBuf;
use thiserror::Error;

use crate::document::DocumentError;
use crate::types::FieldType;

#[derive(Debug, Error)]
pub enum AnnofigError {
    #[error("Failed to discover section '{section}': {reason}")]
    Discovery { section: String, reason: String },

    #[error("Failed to create {path}: {source}")]
    FileCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to copy default content into {path}: {source}")]
    DefaultCopy {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to access {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to load {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: DocumentError,
    },

    #[error("Failed to save {path}: {source}")]
    SaveError {
        path: PathBuf,
        source: DocumentError,
    },

    #[error("Internal error accessing property '{field}': {reason}")]
    FieldAccess { field: String, reason: String },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Type mismatch for '{key}': declared {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: FieldType,
        found: String,
    },

    #[error("No config file path configured: call .path() or .app_name() on the builder")]
    NoPath,

    #[error("Failed to extract typed configuration: {0}")]
    Extract(#[from] serde_json::Error),
}
