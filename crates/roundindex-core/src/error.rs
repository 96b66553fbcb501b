//! Error types for the roundindex pipeline.

use thiserror::Error;

use crate::types::Round;

/// Errors that can occur during indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// The source has not produced this round yet.
    #[error("round {round} not found")]
    RoundNotFound { round: Round },

    /// Transport or decoding failure while talking to the source.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The transaction sink rejected or failed an append.
    #[error("sink unavailable: {0}")]
    SinkUnavailable(String),

    /// Checkpoint load/save failed.
    #[error("checkpoint store unavailable: {0}")]
    StoreUnavailable(String),

    /// Cancellation was observed at a round boundary.
    #[error("indexer cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IndexerError {
    /// Returns `true` if the source simply hasn't reached the round yet.
    pub fn is_round_not_found(&self) -> bool {
        matches!(self, Self::RoundNotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` for errors the engine absorbs locally (log and move on).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RoundNotFound { .. } | Self::SourceUnavailable(_) | Self::SinkUnavailable(_)
        )
    }
}
