//! The durable transaction log written by the block processor.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::Transaction;

/// Result of a successful append.
///
/// A duplicate is not an error: the record is already durable, which is all
/// the processor needs before counting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    AlreadyExists,
}

impl AppendOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::AlreadyExists)
    }
}

/// Durable, idempotent append of transaction records keyed on `signature`.
#[async_trait]
pub trait TransactionSink: Send + Sync {
    /// Append `tx`. Fails with [`IndexerError::SinkUnavailable`].
    async fn append(&self, tx: &Transaction) -> Result<AppendOutcome, IndexerError>;
}
