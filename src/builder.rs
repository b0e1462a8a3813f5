use std::marker::PhantomData;
use std::path::PathBuf;

use crate::config::Configuration;
use crate::document::Document;
use crate::error::AnnofigError;
use crate::file;
use crate::ops;
use crate::schema::Schema;
use crate::toml_doc::TomlDocument;
use crate::types::{DefaultSource, Location, RenderOptions};

/// Entry point for building an annotated configuration.
pub struct Annofig;

impl Annofig {
    pub fn builder<S: Schema>() -> AnnofigBuilder<S> {
        AnnofigBuilder::new()
    }
}

/// Builder for locating, creating and loading a configuration file.
///
/// The file is either given directly with [`path()`](Self::path), or derived from
/// [`app_name()`](Self::app_name), [`file_name()`](Self::file_name) and
/// [`location()`](Self::location). An explicit path wins.
pub struct AnnofigBuilder<S: Schema, D: Document = TomlDocument> {
    path: Option<PathBuf>,
    app_name: Option<String>,
    file_name: Option<String>,
    location: Option<Location>,
    default_source: Option<DefaultSource>,
    render_options: RenderOptions,
    _phantom: PhantomData<fn() -> (S, D)>,
}

impl<S: Schema, D: Document> AnnofigBuilder<S, D> {
    fn new() -> Self {
        Self {
            path: None,
            app_name: None,
            file_name: None,
            location: None,
            default_source: None,
            render_options: RenderOptions::default(),
            _phantom: PhantomData,
        }
    }

    /// Use this exact file path.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the application name. This derives sensible defaults:
    /// - `file_name` → `"{app_name}.toml"`
    /// - `location` → [`Location::Platform`]
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    /// Override the config file name (default: `"{app_name}.toml"`).
    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }

    /// Set the directory the file lives in (default: [`Location::Platform`]).
    pub fn location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Initial content for a file that does not exist yet.
    pub fn default_source(mut self, source: DefaultSource) -> Self {
        self.default_source = Some(source);
        self
    }

    pub fn render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    /// Switch to another document backend.
    pub fn document<D2: Document>(self) -> AnnofigBuilder<S, D2> {
        AnnofigBuilder {
            path: self.path,
            app_name: self.app_name,
            file_name: self.file_name,
            location: self.location,
            default_source: self.default_source,
            render_options: self.render_options,
            _phantom: PhantomData,
        }
    }

    /// Resolve the effective file name.
    fn effective_file_name(&self) -> Result<String, AnnofigError> {
        if let Some(name) = &self.file_name {
            return Ok(name.clone());
        }
        let app = self.app_name.as_deref().ok_or(AnnofigError::NoPath)?;
        Ok(format!("{app}.toml"))
    }

    /// Resolve the effective location.
    fn effective_location(&self) -> Location {
        self.location.clone().unwrap_or(Location::Platform)
    }

    /// Resolve the full file path.
    fn effective_path(&self) -> Result<PathBuf, AnnofigError> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let file_name = self.effective_file_name()?;
        let app_name = self.app_name.as_deref().unwrap_or_default();
        file::resolve_location(&self.effective_location(), app_name)
            .map(|dir| dir.join(file_name))
            .ok_or(AnnofigError::NoPath)
    }

    /// Create or load the configuration file.
    pub fn create(self) -> Result<Configuration<S, D>, AnnofigError> {
        let path = self.effective_path()?;
        Configuration::open(path, self.default_source.as_ref(), self.render_options)
    }

    /// Render the defaults-only document without touching the filesystem.
    pub fn template(&self) -> Result<String, AnnofigError> {
        ops::generate_template::<S>(&self.render_options)
    }
}
