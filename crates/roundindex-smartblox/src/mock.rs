//! Scripted in-memory ledger.
//!
//! Serves blocks from a map, reports a movable frontier and lets callers
//! inject per-round failures. Every `fetch_block` call is recorded so tests
//! can assert which rounds were attempted and how often.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use roundindex_core::error::IndexerError;
use roundindex_core::source::SourceGateway;
use roundindex_core::types::{Block, Round, Transaction};

#[derive(Default)]
struct LedgerState {
    blocks: BTreeMap<Round, Block>,
    frontier: Option<Round>,
    failing_rounds: HashSet<Round>,
    frontier_down: bool,
    fetch_log: Vec<Round>,
}

/// In-memory [`SourceGateway`] for tests and local runs.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger pre-populated with `blocks`.
    pub fn with_blocks(blocks: impl IntoIterator<Item = Block>) -> Self {
        let ledger = Self::new();
        for block in blocks {
            ledger.push_block(block);
        }
        ledger
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `block` available at its own round.
    pub fn push_block(&self, block: Block) {
        self.state().blocks.insert(block.round, block);
    }

    /// Serve `block` when `round` is requested, whatever round the block
    /// itself claims.
    pub fn insert_at(&self, round: Round, block: Block) {
        self.state().blocks.insert(round, block);
    }

    /// Add a block of `txfer` transactions with the given amounts.
    pub fn push_transfers(&self, round: Round, amounts: &[u64]) {
        let txs = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| Transaction {
                signature: format!("r{round}-t{i}"),
                kind: "txfer".into(),
                sender: round,
                recipient: i as u64,
                amount: *amount,
            })
            .collect();
        self.push_block(Block::new(round, txs));
    }

    /// Pin the reported frontier. Without a pin it follows the highest block.
    pub fn set_frontier(&self, round: Round) {
        self.state().frontier = Some(round);
    }

    /// Fail every fetch of `round` with `SourceUnavailable`.
    pub fn fail_round(&self, round: Round) {
        self.state().failing_rounds.insert(round);
    }

    pub fn heal_round(&self, round: Round) {
        self.state().failing_rounds.remove(&round);
    }

    /// Make `current_frontier` fail (or recover).
    pub fn set_frontier_down(&self, down: bool) {
        self.state().frontier_down = down;
    }

    /// Every round passed to `fetch_block`, in call order.
    pub fn fetch_log(&self) -> Vec<Round> {
        self.state().fetch_log.clone()
    }

    /// How many times `round` was requested.
    pub fn fetch_count(&self, round: Round) -> usize {
        self.state().fetch_log.iter().filter(|r| **r == round).count()
    }
}

#[async_trait]
impl SourceGateway for MockLedger {
    async fn current_frontier(&self) -> Result<Round, IndexerError> {
        let state = self.state();
        if state.frontier_down {
            return Err(IndexerError::SourceUnavailable("status endpoint down".into()));
        }
        Ok(state
            .frontier
            .unwrap_or_else(|| state.blocks.keys().next_back().copied().unwrap_or(0)))
    }

    async fn fetch_block(&self, round: Round) -> Result<Block, IndexerError> {
        let mut state = self.state();
        state.fetch_log.push(round);
        if state.failing_rounds.contains(&round) {
            return Err(IndexerError::SourceUnavailable(format!(
                "injected failure for round {round}"
            )));
        }
        state
            .blocks
            .get(&round)
            .cloned()
            .ok_or(IndexerError::RoundNotFound { round })
    }
}
