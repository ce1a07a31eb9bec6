//! Codec and dataset I/O subsystem.
//!
//! # Architecture
//!
//! - **Codecs** implement [`ItemReader`] and [`ItemWriter`] for one encoding
//!   and are selected by name through the [`CodecRegistry`]
//! - **Concatenating writers** merge encoded parts without decoding them
//! - **Services** compose a codec with a dataset's mappers
//!
//! # Supported Formats
//!
//! | Format | Read | Write | Concatenate | Notes |
//! |--------|------|-------|-------------|-------|
//! | JSON | ✓ | ✓ | ✓ | Top-level array; writer emits arrays or lines |
//! | CSV | ✓ | ✓ | ✓ | Configured columns, optional header |
//! | Flat file | ✓ | ✓ | ✓ | Fixed-width fields, blank rows suppressed |
//! | Parquet | ✓ | ✓ | ✓ | Explicit schema, row groups flushed by size |
//!
//! # Example
//!
//! ```rust,ignore
//! use datalayer::io::{Dataset, EntityReadService, ReadOptions};
//!
//! let dataset = Arc::new(Dataset::from_definition(&definition, &registry)?);
//! let result = EntityReadService::new(dataset)
//!     .read_entities(Box::new(File::open("people.json")?), ReadOptions::default())?;
//! println!("Read {} entities", result.entities.len());
//! ```

pub mod formats;
pub mod services;
pub mod traits;

pub use formats::{CodecFactory, CodecRegistry, Encoding, WriterOptions};
pub use services::{
    Dataset, EntityReadService, EntityWriteService, ReadOptions, ReadResult, WriteResult,
    concatenate_parts,
};
pub use traits::{ConcatenatingWriter, ItemFactory, ItemReader, ItemWriter};
