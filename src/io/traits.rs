//! Core traits for item codecs.
//!
//! Defines the [`ItemReader`] and [`ItemWriter`] traits that format codecs
//! implement, the [`ItemFactory`] that creates empty items for a dataset, and
//! the [`ConcatenatingWriter`] that merges already encoded parts.

use crate::Result;
use crate::models::Item;
use std::io::Read;

/// Lazy, forward-only source of items decoded from one stream.
///
/// Readers are single pass. Re-reading requires a fresh stream and a fresh
/// reader.
///
/// # Example Implementation
///
/// ```rust,ignore
/// impl<R: Read> ItemReader for LineReader<R> {
///     fn read(&mut self) -> Result<Option<Item>> {
///         // Read next line, split it, return the item
///     }
/// }
/// ```
pub trait ItemReader {
    /// Reads the next item.
    ///
    /// Returns `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails or the stream fails.
    fn read(&mut self) -> Result<Option<Item>>;

    /// Releases the underlying stream.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing the stream fails.
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Sink of items encoded onto one stream.
///
/// # Lifecycle
///
/// 1. Create the writer over an open stream
/// 2. Call `write()` for each item
/// 3. Call `close()` to flush buffered rows and footers
pub trait ItemWriter {
    /// Encodes one item and returns whether a record was emitted.
    ///
    /// `Ok(false)` means the encoding suppressed the item, e.g. a flat-file
    /// line with no populated field. A record-scoped error (validation, type
    /// conversion) leaves the writer usable; nothing of the rejected item is
    /// written.
    ///
    /// # Errors
    ///
    /// Returns an error if the item cannot be encoded or the stream fails.
    fn write(&mut self, item: &Item) -> Result<bool>;

    /// Flushes and releases the stream. Consumes the writer.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Creates items for one dataset and knows which field names it accepts.
pub trait ItemFactory: Send + Sync {
    /// Creates an empty item.
    fn new_item(&self) -> Item {
        Item::new()
    }

    /// Field names the encoding can carry, or `None` when any name is accepted.
    fn field_names(&self) -> Option<&[String]>;

    /// Returns `true` if a field called `name` survives encoding.
    fn accepts(&self, name: &str) -> bool {
        self.field_names()
            .is_none_or(|names| names.iter().any(|n| n == name))
    }
}

/// Item factory for encodings that accept any field name.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenItemFactory;

impl ItemFactory for OpenItemFactory {
    fn field_names(&self) -> Option<&[String]> {
        None
    }
}

/// Item factory for encodings with a fixed field set.
#[derive(Debug, Clone, Default)]
pub struct FixedItemFactory {
    names: Vec<String>,
}

impl FixedItemFactory {
    /// Creates a factory accepting exactly `names`.
    #[must_use]
    pub const fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl ItemFactory for FixedItemFactory {
    fn new_item(&self) -> Item {
        Item::with_capacity(self.names.len())
    }

    fn field_names(&self) -> Option<&[String]> {
        Some(&self.names)
    }
}

/// Merges already encoded parts into one output without decoding to items.
///
/// `write_part` may be called any number of times; `finalize` must be called
/// exactly once afterwards. A failed merge leaves the output invalid and the
/// writer must not be reused.
pub trait ConcatenatingWriter {
    /// Appends one encoded part.
    ///
    /// # Errors
    ///
    /// Returns an error if the part cannot be parsed or the output fails.
    fn write_part(&mut self, part: &mut dyn Read) -> Result<()>;

    /// Writes any closing framing and releases the output.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn finalize(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_factory_accepts_anything() {
        let factory = OpenItemFactory;
        assert!(factory.accepts("whatever"));
        assert!(factory.field_names().is_none());
    }

    #[test]
    fn test_fixed_factory() {
        let factory = FixedItemFactory::new(vec!["id".into(), "name".into()]);
        assert!(factory.accepts("name"));
        assert!(!factory.accepts("age"));
        assert!(factory.new_item().is_empty());
    }
}
