//! Dataset services.
//!
//! Compose a codec with the dataset's mappers and drive whole read, write
//! and concatenation passes. Logging happens here, never in codecs or
//! mappers.

mod dataset;
mod read;
mod write;

pub use dataset::Dataset;
pub use read::{EntityReadService, ReadOptions, ReadResult};
pub use write::{EntityWriteService, WriteResult, concatenate_parts};
