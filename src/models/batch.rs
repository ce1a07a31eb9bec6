//! Batch metadata passed through write calls.

use serde::{Deserialize, Serialize};

/// Describes where a write call sits inside a sync.
///
/// Codecs never interpret this; dataset adapters use it to choose between
/// creating and appending to output files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    /// Identifier shared by every batch of one sync.
    pub sync_id: String,
    /// First batch of the sync.
    pub is_start_batch: bool,
    /// Last batch of the sync.
    pub is_last_batch: bool,
}

impl BatchInfo {
    /// A sync consisting of exactly one batch.
    #[must_use]
    pub fn single(sync_id: impl Into<String>) -> Self {
        Self {
            sync_id: sync_id.into(),
            is_start_batch: true,
            is_last_batch: true,
        }
    }

    /// Returns `true` if this batch is neither first nor last.
    #[must_use]
    pub const fn is_middle(&self) -> bool {
        !self.is_start_batch && !self.is_last_batch
    }
}
