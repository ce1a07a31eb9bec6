//! Entity write service and part concatenation.

use super::Dataset;
use crate::Result;
use crate::io::formats::WriterOptions;
use crate::models::{BatchInfo, Entity};
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::Span;

/// Result of a write pass.
#[derive(Debug, Clone, Default)]
pub struct WriteResult {
    /// Entities encoded as a record.
    pub written: usize,
    /// Entities mapped to an item the encoding chose not to emit.
    pub suppressed: usize,
    /// Entities skipped as invalid.
    pub skipped_invalid: usize,
    /// One message per skipped entity.
    pub errors: Vec<String>,
}

/// Writes entities into one dataset.
#[derive(Debug, Clone)]
pub struct EntityWriteService {
    dataset: Arc<Dataset>,
    span: Span,
    skip_invalid: bool,
}

impl EntityWriteService {
    /// Creates a write service logging under a `dataset.write` span.
    #[must_use]
    pub fn new(dataset: Arc<Dataset>) -> Self {
        let span = tracing::info_span!("dataset.write", dataset = %dataset.name());
        Self::with_span(dataset, span)
    }

    /// Creates a write service logging under `span`.
    #[must_use]
    pub const fn with_span(dataset: Arc<Dataset>, span: Span) -> Self {
        Self {
            dataset,
            span,
            skip_invalid: true,
        }
    }

    /// Enables or disables skipping invalid entities.
    #[must_use]
    pub const fn with_skip_invalid(mut self, skip: bool) -> Self {
        self.skip_invalid = skip;
        self
    }

    /// Maps and encodes `entities` onto `stream`.
    ///
    /// Only the start batch of a sync carries a header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails, or an entity is invalid and
    /// skipping is disabled.
    pub fn write_entities<'a>(
        &self,
        entities: &[Entity],
        stream: Box<dyn Write + Send + 'a>,
        batch: &BatchInfo,
    ) -> Result<WriteResult> {
        let _guard = self.span.enter();
        let options = WriterOptions {
            emit_header: batch.is_start_batch,
        };
        let mapper = self.dataset.incoming();
        let mut writer = self.dataset.writer(stream, options)?;
        let mut result = WriteResult::default();

        for (index, entity) in entities.iter().enumerate() {
            match mapper.map(entity).and_then(|item| writer.write(&item)) {
                Ok(true) => result.written += 1,
                Ok(false) => {
                    tracing::debug!(entity = %entity.id, "Encoding suppressed empty item");
                    result.suppressed += 1;
                },
                Err(e) if self.skip_invalid && e.is_record_scoped() => {
                    tracing::debug!(entity = %entity.id, error = %e, "Skipping invalid entity");
                    result.skipped_invalid += 1;
                    result.errors.push(format!("Entity {}: {e}", index + 1));
                },
                Err(e) => return Err(e),
            }
        }
        writer.close()?;

        tracing::info!(
            sync_id = %batch.sync_id,
            start = batch.is_start_batch,
            last = batch.is_last_batch,
            written = result.written,
            suppressed = result.suppressed,
            skipped = result.skipped_invalid,
            "Wrote entities"
        );
        Ok(result)
    }

    /// Writes `entities` as one complete file.
    ///
    /// The batch is encoded as a single part and passed through the
    /// dataset's concatenating writer, so encodings whose writers leave
    /// framing to concatenation (JSON object streams) still yield a valid
    /// top-level document.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as
    /// [`EntityWriteService::write_entities`], or if the part cannot be
    /// merged.
    pub fn write_complete<'a>(
        &self,
        entities: &[Entity],
        output: Box<dyn Write + Send + 'a>,
        batch: &BatchInfo,
    ) -> Result<WriteResult> {
        let mut part = Vec::new();
        let result = self.write_entities(entities, Box::new(&mut part), batch)?;
        concatenate_parts(&self.dataset, [part.as_slice()], output)?;
        Ok(result)
    }
}

/// Merges already encoded `parts` of `dataset` into `output`.
///
/// Returns the number of parts merged.
///
/// # Errors
///
/// Returns an error if any part cannot be parsed; the output is invalid
/// afterwards.
pub fn concatenate_parts<'a, R: Read>(
    dataset: &Dataset,
    parts: impl IntoIterator<Item = R>,
    output: Box<dyn Write + Send + 'a>,
) -> Result<usize> {
    let span = tracing::info_span!("dataset.concat", dataset = %dataset.name());
    let _guard = span.enter();

    let mut writer = dataset.concatenating_writer(output)?;
    let mut count = 0;
    for mut part in parts {
        writer.write_part(&mut part)?;
        count += 1;
        tracing::debug!(part = count, "Merged part");
    }
    writer.finalize()?;

    tracing::info!(parts = count, "Concatenated parts");
    Ok(count)
}
