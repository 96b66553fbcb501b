//! The ledger source contract consumed by the index loop.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::{Block, Round};

/// Read access to a round-numbered ledger.
///
/// Implementations own no retry policy; the index loop decides when a failed
/// round is attempted again.
#[async_trait]
pub trait SourceGateway: Send + Sync {
    /// Highest round the source has produced.
    ///
    /// Fails with [`IndexerError::SourceUnavailable`].
    async fn current_frontier(&self) -> Result<Round, IndexerError>;

    /// Fetch the block for `round`.
    ///
    /// Fails with [`IndexerError::RoundNotFound`] if the round does not exist
    /// yet, [`IndexerError::SourceUnavailable`] for anything else.
    async fn fetch_block(&self, round: Round) -> Result<Block, IndexerError>;
}

#[async_trait]
impl<T: SourceGateway + ?Sized> SourceGateway for std::sync::Arc<T> {
    async fn current_frontier(&self) -> Result<Round, IndexerError> {
        (**self).current_frontier().await
    }

    async fn fetch_block(&self, round: Round) -> Result<Block, IndexerError> {
        (**self).fetch_block(round).await
    }
}
