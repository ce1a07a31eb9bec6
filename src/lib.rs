//! # Datalayer
//!
//! A configuration-driven data exchange layer between external file formats
//! and a generic entity graph model.
//!
//! Records flow through a format-neutral [`Item`] so that decoding and
//! transformation stay independent:
//!
//! ```text
//! bytes -> ItemReader -> Item -> ItemToEntityMapper -> Entity
//! Entity -> EntityToItemMapper -> Item -> ItemWriter -> bytes
//! ```
//!
//! ## Features
//!
//! - Four codecs selected by name: JSON arrays, delimited text, fixed-width
//!   flat files and Parquet with an explicit schema
//! - Concatenating writers that merge independently encoded parts into one
//!   valid file without re-encoding records
//! - Declarative, bidirectional mapping between items and entities with
//!   identity and reference URL templates
//! - Fail-fast configuration validation; per-record errors are reported, not fatal
//!
//! ## Example
//!
//! ```rust,ignore
//! use datalayer::config::SourceConfig;
//! use datalayer::io::formats::CodecRegistry;
//!
//! let registry = CodecRegistry::with_defaults();
//! let source = SourceConfig::from_json(serde_json::json!({ "encoding": "json" }))?;
//! let mut reader = registry.create_item_reader(&source, Box::new(file))?;
//! while let Some(item) = reader.read()? {
//!     println!("{:?}", item.get("id"));
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod io;
pub mod mapping;
pub mod models;
pub mod observability;

pub use config::{DatasetDefinition, LayerConfig, SourceConfig};
pub use io::formats::{CodecFactory, CodecRegistry, Encoding};
pub use io::traits::{ConcatenatingWriter, ItemFactory, ItemReader, ItemWriter};
pub use mapping::{EntityToItemMapper, ItemToEntityMapper};
pub use models::{BatchInfo, Entity, EntityRef, Item, Value};

/// Error type for datalayer operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | Scope |
/// |---------|-------------|-------|
/// | `Configuration` | Missing or malformed codec/mapping configuration | Construction |
/// | `Validation` | A record misses a required field or breaks an identity rule | One record |
/// | `Decode` | Input is malformed for its declared encoding | Whole stream |
/// | `TypeConversion` | A value does not fit the declared column type | One record |
/// | `OperationFailed` | Underlying stream or library I/O fails | Whole stream |
/// | `InvalidInput` | A caller passes unusable arguments | Call |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Codec or mapping configuration is missing or malformed.
    ///
    /// Raised when:
    /// - A required source config key (`columns`, `fields`, `schema`) is absent
    /// - A key has the wrong type (e.g. `columnSeparator` longer than one character)
    /// - A mapping has no identity rule or the identity lacks a URL pattern
    /// - An encoding name is not registered
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single record failed a mapping rule.
    ///
    /// Raised when:
    /// - A required property is absent from the item or entity
    /// - The identity value cannot be rendered into the URL template
    /// - A required columnar column has no value
    #[error("validation failed: {message}")]
    Validation {
        /// The field the rule applies to.
        field: String,
        /// Human readable description.
        message: String,
    },

    /// Input bytes do not match the declared encoding.
    ///
    /// Raised when:
    /// - A JSON stream does not open with `[`
    /// - A Parquet part is unreadable or its schema differs from the first part
    /// - A declared column is missing from a Parquet file
    #[error("{format} decode error: {message}")]
    Decode {
        /// The encoding that failed to decode.
        format: &'static str,
        /// Description of the malformed input.
        message: String,
    },

    /// A value's runtime type does not match the declared column type.
    #[error("cannot convert field '{field}' to {expected}: got {actual}")]
    TypeConversion {
        /// Column or field name.
        field: String,
        /// Declared type.
        expected: String,
        /// Offending value, rendered for diagnosis.
        actual: String,
    },

    /// An I/O or library operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Invalid input was provided by a caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Coarse classification of an [`Error`], used to pick a recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Configuration`].
    Configuration,
    /// See [`Error::Validation`].
    Validation,
    /// See [`Error::Decode`].
    Decode,
    /// See [`Error::TypeConversion`].
    TypeConversion,
    /// See [`Error::OperationFailed`].
    Io,
    /// See [`Error::InvalidInput`].
    InvalidInput,
}

impl Error {
    /// Creates a validation error for a field.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an operation failure from any displayable cause.
    #[must_use]
    pub fn operation(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::TypeConversion { .. } => ErrorKind::TypeConversion,
            Self::OperationFailed { .. } => ErrorKind::Io,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Returns `true` when the error only invalidates the current record.
    ///
    /// Callers may skip the record and continue the pass.
    #[must_use]
    pub const fn is_record_scoped(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::TypeConversion)
    }
}

/// Result type alias for datalayer operations.
pub type Result<T> = std::result::Result<T, Error>;
