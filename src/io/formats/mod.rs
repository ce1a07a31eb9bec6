//! Item codecs.
//!
//! Each encoding provides a [`CodecFactory`] that builds readers, writers,
//! item factories and concatenating writers from a dataset's
//! [`SourceConfig`]. Factories live in a [`CodecRegistry`] keyed by
//! encoding name, so adding a format means registering a factory.
//!
//! | Encoding | Reader | Writer | Concatenation |
//! |----------|--------|--------|---------------|
//! | `json` | array of objects, lazy | object stream (array on request) | merged array |
//! | `csv` | positional columns | header + rows | byte concatenation |
//! | `flatfile` | fixed-width fields | padded fields | byte concatenation |
//! | `parquet` | schema driven | row groups by size | one row group per part |

pub mod concat;
pub mod csv;
pub mod flatfile;
pub mod json;
pub mod parquet;

use crate::config::{SourceConfig, require};
use crate::io::traits::{ConcatenatingWriter, ItemFactory, ItemReader, ItemWriter};
use crate::{Error, Result};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::str::FromStr;
use std::sync::Arc;

/// Built-in encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// A single top-level JSON array of objects.
    Json,
    /// Delimited text with configured columns.
    Csv,
    /// Fixed-width flat file.
    FlatFile,
    /// Apache Parquet with an explicit schema.
    Parquet,
}

impl Encoding {
    /// Returns all built-in encodings.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Json, Self::Csv, Self::FlatFile, Self::Parquet]
    }

    /// Canonical registry name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::FlatFile => "flatfile",
            Self::Parquet => "parquet",
        }
    }

    /// Returns the file extension for this encoding.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::FlatFile => "txt",
            Self::Parquet => "parquet",
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "flatfile" | "flat-file" | "fixed-width" => Ok(Self::FlatFile),
            "parquet" | "columnar" => Ok(Self::Parquet),
            _ => Err(Error::Configuration(format!("unknown encoding: {s}"))),
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call writer options chosen by the caller, not the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Emit a header row when the encoding has one.
    pub emit_header: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self { emit_header: true }
    }
}

/// Builds the codec parts for one encoding.
///
/// Every constructor parses the source configuration into the codec's typed
/// configuration first and fails with [`Error::Configuration`] before
/// touching the stream.
pub trait CodecFactory: Send + Sync {
    /// Registry name of the encoding.
    fn name(&self) -> &str;

    /// Creates the item factory for a dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    fn item_factory(&self, config: &SourceConfig) -> Result<Arc<dyn ItemFactory>>;

    /// Creates a reader over `stream`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the stream does
    /// not start like this encoding.
    fn new_reader<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Read + 'a>,
    ) -> Result<Box<dyn ItemReader + 'a>>;

    /// Creates a writer over `stream`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    fn new_writer<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Write + Send + 'a>,
        options: WriterOptions,
    ) -> Result<Box<dyn ItemWriter + 'a>>;

    /// Creates a concatenating writer over `stream`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    fn concatenating_writer<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Write + Send + 'a>,
    ) -> Result<Box<dyn ConcatenatingWriter + 'a>>;
}

/// Maps encoding names to codec factories.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    factories: HashMap<String, Arc<dyn CodecFactory>>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CodecRegistry").field("encodings", &names).finish()
    }
}

impl CodecRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the four built-in codecs.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(json::JsonCodec));
        registry.register(Arc::new(csv::CsvCodec));
        registry.register(Arc::new(flatfile::FlatFileCodec));
        registry.register(Arc::new(parquet::ParquetCodec));
        registry
    }

    /// Adds or replaces a factory under its name.
    pub fn register(&mut self, factory: Arc<dyn CodecFactory>) {
        self.factories
            .insert(factory.name().to_lowercase(), factory);
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves an encoding name, including built-in aliases.
    ///
    /// # Errors
    ///
    /// Returns an error if no factory is registered under the name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn CodecFactory>> {
        let key = name
            .parse::<Encoding>()
            .map_or_else(|_| name.trim().to_lowercase(), |e| e.as_str().to_string());
        self.factories
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::Configuration(format!("unknown encoding: {name}")))
    }

    /// Resolves the factory named by the config's `encoding` key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is absent or unregistered.
    pub fn for_config(&self, config: &SourceConfig) -> Result<Arc<dyn CodecFactory>> {
        let name = require(config.get_str("encoding")?, "encoding")?;
        self.get(name)
    }

    /// Creates a reader for the config's encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec cannot be built.
    pub fn create_item_reader<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Read + 'a>,
    ) -> Result<Box<dyn ItemReader + 'a>> {
        self.for_config(config)?.new_reader(config, stream)
    }

    /// Creates a writer for the config's encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec cannot be built.
    pub fn create_item_writer<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Write + Send + 'a>,
    ) -> Result<Box<dyn ItemWriter + 'a>> {
        self.for_config(config)?
            .new_writer(config, stream, WriterOptions::default())
    }
}
