//! The main index loop. Orchestrates checkpoint load, backfill and live phases.
//!
//! # Lifecycle
//! `Loading → Backfilling → Polling → Draining → Terminated`
//!
//! # Phase 1: BACKFILL
//! Read the source frontier once, then walk `last_processed_round + 1 ..= frontier`
//! one round at a time. A round that fails to fetch is logged and skipped for
//! the rest of this run. Cancellation is checked before every round.
//!
//! # Phase 2: LIVE
//! Every `poll_interval_ms` (first attempt one period after backfill), try
//! exactly `last_processed_round + 1`.
//! On success the block is folded and the checkpoint is persisted when the
//! round falls on the persistence cadence.
//!
//! On cancellation the checkpoint is saved unconditionally.

use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use roundindex_core::checkpoint::{Checkpoint, CheckpointManager, CheckpointStore};
use roundindex_core::error::IndexerError;
use roundindex_core::indexer::{IndexerConfig, IndexerState};
use roundindex_core::processor::{BlockProcessor, FoldSummary};
use roundindex_core::sink::TransactionSink;
use roundindex_core::source::SourceGateway;
use roundindex_core::types::{Block, IndexPhase, Round};

/// Result of a single live-mode tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The round was fetched and folded.
    Processed { round: Round, persisted: bool },
    /// The source has not produced the next round yet.
    Pending { round: Round },
    /// Fetch failed; the round is retried on the next tick.
    Failed { round: Round },
}

/// The core index loop implementation.
pub struct IndexLoop<C: SourceGateway> {
    config: IndexerConfig,
    source: C,
    processor: BlockProcessor,
    checkpoints: CheckpointManager,
    checkpoint: Checkpoint,
    state: IndexerState,
    cancel: CancellationToken,
}

impl<C: SourceGateway> IndexLoop<C> {
    pub fn new(
        config: IndexerConfig,
        source: C,
        sink: Arc<dyn TransactionSink>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let checkpoints = CheckpointManager::new(store, &config.id, config.persist_cadence);
        Self {
            processor: BlockProcessor::new(sink, &config.qualifying_kind),
            source,
            checkpoints,
            checkpoint: Checkpoint::new(),
            state: IndexerState::Idle,
            cancel: CancellationToken::new(),
            config,
        }
    }

    /// Use an externally owned cancellation token (e.g. wired to signals).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that stops the loop at the next round or tick boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> IndexerState {
        self.state
    }

    /// The in-memory aggregate (may be ahead of the persisted one).
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Run the full lifecycle until cancellation or a fatal error.
    ///
    /// Fatal: invalid config, checkpoint load failure, frontier failure at
    /// startup, and failure of the final save.
    pub async fn run(&mut self) -> Result<(), IndexerError> {
        if let Err(e) = self.config.validate() {
            self.set_state(IndexerState::Failed);
            return Err(e);
        }

        if let Err(e) = self.load_checkpoint().await {
            tracing::error!(error = %e, "could not load checkpoint");
            self.set_state(IndexerState::Failed);
            return Err(e);
        }

        match self.backfill().await {
            Ok(()) => {}
            Err(IndexerError::Cancelled) => {
                tracing::info!(
                    round = self.checkpoint.last_processed_round,
                    "Shutdown requested during backfill"
                );
                return self.drain().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Backfill failed, saving state before exit");
                let saved = self.checkpoints.force_save(&self.checkpoint).await;
                self.set_state(IndexerState::Failed);
                saved?;
                return Err(e);
            }
        }

        self.live_loop().await;
        self.drain().await
    }

    /// Replace the in-memory aggregate with the persisted one (zero if none).
    pub async fn load_checkpoint(&mut self) -> Result<(), IndexerError> {
        self.set_state(IndexerState::Loading);
        self.checkpoint = self.checkpoints.load_or_default().await?;
        tracing::info!(
            indexer = self.checkpoints.indexer_id(),
            round = self.checkpoint.last_processed_round,
            txn_count = self.checkpoint.txn_count,
            "Resuming from checkpoint"
        );
        Ok(())
    }

    /// Catch up from the checkpoint to the current source frontier.
    ///
    /// Returns [`IndexerError::Cancelled`] if cancellation was observed before
    /// the range was drained; rounds already folded stay folded.
    pub async fn backfill(&mut self) -> Result<(), IndexerError> {
        self.set_state(IndexerState::Backfilling);

        let frontier = self.source.current_frontier().await?;
        let from = self.checkpoint.next_round();
        tracing::info!(from, frontier, "Starting backfill phase");

        for round in from..=frontier {
            if self.cancel.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }

            match self.fetch(round).await {
                Ok(block) => {
                    self.process(&block, IndexPhase::Backfill).await;
                }
                Err(e) => {
                    tracing::warn!(round, error = %e, "Could not fetch block during backfill, skipping");
                }
            }
        }

        tracing::info!(at = self.checkpoint.last_processed_round, "Backfill complete");
        Ok(())
    }

    /// Attempt the next round once.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let round = self.checkpoint.next_round();

        let block = match self.fetch(round).await {
            Ok(block) => block,
            Err(e) if e.is_round_not_found() => {
                tracing::trace!(round, "round not produced yet");
                return PollOutcome::Pending { round };
            }
            Err(e) => {
                tracing::warn!(round, error = %e, "Failed to get block");
                return PollOutcome::Failed { round };
            }
        };

        self.process(&block, IndexPhase::Live).await;

        let persisted = match self.checkpoints.maybe_save(&self.checkpoint).await {
            Ok(saved) => {
                if saved {
                    tracing::info!(round, "Checkpoint persisted");
                }
                saved
            }
            Err(e) => {
                tracing::warn!(round, error = %e, "Failed to persist checkpoint");
                false
            }
        };

        PollOutcome::Processed { round, persisted }
    }

    async fn live_loop(&mut self) {
        self.set_state(IndexerState::Polling);

        // First poll one full period after backfill, not immediately.
        let period = self.config.poll_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!("Shutdown signal received");
                    return;
                }
                _ = ticker.tick() => {}
            }
            self.poll_once().await;
        }
    }

    async fn drain(&mut self) -> Result<(), IndexerError> {
        self.set_state(IndexerState::Draining);
        match self.checkpoints.force_save(&self.checkpoint).await {
            Ok(()) => {
                tracing::info!(
                    round = self.checkpoint.last_processed_round,
                    txn_count = self.checkpoint.txn_count,
                    "Final checkpoint saved"
                );
                self.set_state(IndexerState::Terminated);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to save checkpoint on exit");
                self.set_state(IndexerState::Failed);
                Err(e)
            }
        }
    }

    /// Fetch `round`, rejecting a block that claims a different round.
    async fn fetch(&self, round: Round) -> Result<Block, IndexerError> {
        let block = self.source.fetch_block(round).await?;
        if block.round != round {
            return Err(IndexerError::SourceUnavailable(format!(
                "requested round {round}, source returned round {}",
                block.round
            )));
        }
        Ok(block)
    }

    async fn process(&mut self, block: &Block, phase: IndexPhase) -> FoldSummary {
        let summary = self.processor.fold(block, &mut self.checkpoint).await;
        tracing::debug!(
            %phase,
            round = block.round,
            qualifying = summary.qualifying,
            recorded = summary.recorded,
            duplicates = summary.duplicates,
            failed = summary.failed,
            "Processed block"
        );
        summary
    }

    fn set_state(&mut self, state: IndexerState) {
        if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "indexer state change");
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLedger;
    use roundindex_core::checkpoint::MemoryCheckpointStore;
    use roundindex_core::sink::AppendOutcome;
    use roundindex_core::types::Transaction;

    struct AcceptAll;

    #[async_trait::async_trait]
    impl TransactionSink for AcceptAll {
        async fn append(&self, _tx: &Transaction) -> Result<AppendOutcome, IndexerError> {
            Ok(AppendOutcome::Inserted)
        }
    }

    fn index_loop(ledger: MockLedger, cadence: u64) -> IndexLoop<MockLedger> {
        let config = IndexerConfig {
            persist_cadence: cadence,
            ..Default::default()
        };
        IndexLoop::new(
            config,
            ledger,
            Arc::new(AcceptAll),
            Arc::new(MemoryCheckpointStore::new()),
        )
    }

    #[tokio::test]
    async fn poll_once_pending_when_round_missing() {
        let mut lp = index_loop(MockLedger::new(), 10);
        assert_eq!(lp.poll_once().await, PollOutcome::Pending { round: 1 });
        assert_eq!(lp.checkpoint().last_processed_round, 0);
    }

    #[tokio::test]
    async fn poll_once_processes_and_persists_on_cadence() {
        let ledger = MockLedger::new();
        ledger.push_transfers(1, &[5]);
        ledger.push_transfers(2, &[7, 9]);
        let mut lp = index_loop(ledger, 2);

        assert_eq!(
            lp.poll_once().await,
            PollOutcome::Processed { round: 1, persisted: false }
        );
        assert_eq!(
            lp.poll_once().await,
            PollOutcome::Processed { round: 2, persisted: true }
        );
        assert_eq!(lp.checkpoint().txn_count, 3);
        assert_eq!(lp.checkpoint().total_amount, 21);
    }

    #[tokio::test]
    async fn poll_once_failed_does_not_advance() {
        let ledger = MockLedger::new();
        ledger.push_transfers(1, &[5]);
        ledger.fail_round(1);
        let mut lp = index_loop(ledger, 10);

        assert_eq!(lp.poll_once().await, PollOutcome::Failed { round: 1 });
        assert_eq!(lp.checkpoint().last_processed_round, 0);

        lp.source().heal_round(1);
        assert!(matches!(lp.poll_once().await, PollOutcome::Processed { round: 1, .. }));
    }

    #[tokio::test]
    async fn mismatched_round_is_rejected() {
        let ledger = MockLedger::new();
        ledger.insert_at(1, Block::empty(40));
        let mut lp = index_loop(ledger, 10);

        assert_eq!(lp.poll_once().await, PollOutcome::Failed { round: 1 });
        assert_eq!(lp.checkpoint().last_processed_round, 0);
    }

    #[tokio::test]
    async fn backfill_with_nothing_to_do() {
        let ledger = MockLedger::new();
        let mut lp = index_loop(ledger, 10);
        lp.backfill().await.unwrap();
        assert_eq!(lp.state(), IndexerState::Backfilling);
        assert!(lp.source().fetch_log().is_empty());
    }

    #[tokio::test]
    async fn invalid_config_fails_fast() {
        let mut lp = index_loop(MockLedger::new(), 0);
        // CheckpointManager clamps, but the config itself is still invalid.
        assert!(matches!(lp.run().await, Err(IndexerError::Config(_))));
        assert_eq!(lp.state(), IndexerState::Failed);
    }
}
