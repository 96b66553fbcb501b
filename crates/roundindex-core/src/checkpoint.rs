//! Checkpoint: the resumable aggregate and the manager that persists it.
//!
//! A checkpoint holds the last fully folded round together with the running
//! aggregate over every qualifying transaction folded so far. On restart the
//! indexer resumes from `last_processed_round + 1` with the aggregate intact.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::IndexerError;
use crate::types::{AmountRecord, Round};

/// The resumable aggregate state.
///
/// `min_amount` / `max_amount` carry no meaning while `txn_count == 0`; use
/// [`Checkpoint::min`] and [`Checkpoint::max`] to read them safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Highest round whose block has been fully folded.
    pub last_processed_round: Round,
    /// Number of qualifying transactions folded.
    pub txn_count: u64,
    /// Sum of their amounts.
    pub total_amount: u64,
    pub min_amount: AmountRecord,
    pub max_amount: AmountRecord,
}

impl Checkpoint {
    /// The zero checkpoint used on first run.
    pub fn new() -> Self {
        Self::default()
    }

    /// The round the indexer should fetch next. Pinned at `u64::MAX`.
    pub fn next_round(&self) -> Round {
        self.last_processed_round.saturating_add(1)
    }

    /// Returns `true` if no qualifying transaction has ever been folded.
    pub fn is_empty(&self) -> bool {
        self.txn_count == 0
    }

    pub fn min(&self) -> Option<&AmountRecord> {
        (!self.is_empty()).then_some(&self.min_amount)
    }

    pub fn max(&self) -> Option<&AmountRecord> {
        (!self.is_empty()).then_some(&self.max_amount)
    }

    /// Fold one recorded amount into the aggregate.
    ///
    /// The first amount ever recorded initialises both extrema; afterwards
    /// they only move on a strictly smaller / strictly larger amount, so ties
    /// keep the earliest round.
    pub fn record(&mut self, amount: u64, round: Round) {
        self.txn_count += 1;
        self.total_amount = self.total_amount.saturating_add(amount);

        let rec = AmountRecord::new(amount, round);
        if self.txn_count == 1 {
            self.min_amount = rec;
            self.max_amount = rec;
            return;
        }
        if amount < self.min_amount.amount {
            self.min_amount = rec;
        }
        if amount > self.max_amount.amount {
            self.max_amount = rec;
        }
    }
}

/// Trait for storing and loading checkpoints.
///
/// Implementations include `MemoryCheckpointStore`, `InMemoryStorage` and
/// `SqliteStorage`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint saved under `indexer_id`, if any.
    async fn load(&self, indexer_id: &str) -> Result<Option<Checkpoint>, IndexerError>;

    /// Save (upsert) a checkpoint.
    async fn save(&self, indexer_id: &str, checkpoint: &Checkpoint) -> Result<(), IndexerError>;

    /// Delete a checkpoint (e.g. when resetting an indexer).
    async fn delete(&self, indexer_id: &str) -> Result<(), IndexerError>;
}

/// Manages checkpoint reads/writes for an indexer.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    indexer_id: String,
    /// Persist whenever the last processed round is a multiple of this.
    persist_cadence: u64,
}

impl CheckpointManager {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        indexer_id: impl Into<String>,
        persist_cadence: u64,
    ) -> Self {
        Self {
            store,
            indexer_id: indexer_id.into(),
            persist_cadence: persist_cadence.max(1),
        }
    }

    pub fn indexer_id(&self) -> &str {
        &self.indexer_id
    }

    /// Load the saved checkpoint (returns `None` if none exists).
    pub async fn load(&self) -> Result<Option<Checkpoint>, IndexerError> {
        self.store.load(&self.indexer_id).await
    }

    /// Load the saved checkpoint, falling back to the zero checkpoint.
    pub async fn load_or_default(&self) -> Result<Checkpoint, IndexerError> {
        Ok(self.load().await?.unwrap_or_default())
    }

    /// Returns `true` if `round` falls on the persistence cadence.
    pub fn is_due(&self, round: Round) -> bool {
        round > 0 && round % self.persist_cadence == 0
    }

    /// Save `checkpoint` if its last processed round falls on the cadence.
    ///
    /// Returns whether a save was issued.
    pub async fn maybe_save(&self, checkpoint: &Checkpoint) -> Result<bool, IndexerError> {
        if !self.is_due(checkpoint.last_processed_round) {
            return Ok(false);
        }
        self.force_save(checkpoint).await?;
        Ok(true)
    }

    /// Immediately save a checkpoint (used on shutdown and startup failure).
    pub async fn force_save(&self, checkpoint: &Checkpoint) -> Result<(), IndexerError> {
        self.store.save(&self.indexer_id, checkpoint).await
    }

    /// Drop the persisted checkpoint so the next run starts from round 1.
    pub async fn reset(&self) -> Result<(), IndexerError> {
        self.store.delete(&self.indexer_id).await
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory checkpoint store for tests and ephemeral indexers.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> IndexerError {
        IndexerError::StoreUnavailable("checkpoint map lock poisoned".into())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, indexer_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        let data = self.data.lock().map_err(|_| Self::poisoned())?;
        Ok(data.get(indexer_id).copied())
    }

    async fn save(&self, indexer_id: &str, checkpoint: &Checkpoint) -> Result<(), IndexerError> {
        let mut data = self.data.lock().map_err(|_| Self::poisoned())?;
        data.insert(indexer_id.to_string(), *checkpoint);
        Ok(())
    }

    async fn delete(&self, indexer_id: &str) -> Result<(), IndexerError> {
        let mut data = self.data.lock().map_err(|_| Self::poisoned())?;
        data.remove(indexer_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_record_sets_both_extrema() {
        let mut cp = Checkpoint::new();
        assert!(cp.min().is_none());
        assert!(cp.max().is_none());

        cp.record(500, 50);
        assert_eq!(cp.txn_count, 1);
        assert_eq!(cp.min(), Some(&AmountRecord::new(500, 50)));
        assert_eq!(cp.max(), Some(&AmountRecord::new(500, 50)));
    }

    #[test]
    fn next_round_saturates() {
        assert_eq!(Checkpoint::new().next_round(), 1);
        let cp = Checkpoint {
            last_processed_round: u64::MAX,
            ..Default::default()
        };
        assert_eq!(cp.next_round(), u64::MAX);
    }

    #[test]
    fn ties_keep_earliest_round() {
        let mut cp = Checkpoint::new();
        cp.record(10, 1);
        cp.record(10, 2);
        assert_eq!(cp.min_amount.round, 1);
        assert_eq!(cp.max_amount.round, 1);
    }

    #[test]
    fn extrema_bound_every_amount() {
        let amounts = [42u64, 7, 1_000, 7, 0, 999, 1_000];
        let mut cp = Checkpoint::new();
        for (i, a) in amounts.iter().enumerate() {
            cp.record(*a, i as u64 + 1);
        }
        assert_eq!(cp.txn_count, amounts.len() as u64);
        assert_eq!(cp.total_amount, amounts.iter().sum::<u64>());
        for a in amounts {
            assert!(cp.min_amount.amount <= a && a <= cp.max_amount.amount);
        }
        assert_eq!(cp.min_amount, AmountRecord::new(0, 5));
        assert_eq!(cp.max_amount, AmountRecord::new(1_000, 3));
    }

    #[test]
    fn checkpoint_serde_roundtrip() {
        let mut cp = Checkpoint::new();
        cp.last_processed_round = 12;
        cp.record(3, 12);
        let json = serde_json::to_string(&cp).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cp);
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let mgr = CheckpointManager::new(Arc::new(MemoryCheckpointStore::new()), "idx", 10);

        // No checkpoint initially
        assert!(mgr.load().await.unwrap().is_none());
        assert_eq!(mgr.load_or_default().await.unwrap(), Checkpoint::new());

        let mut cp = Checkpoint::new();
        cp.last_processed_round = 1000;
        mgr.force_save(&cp).await.unwrap();

        let loaded = mgr.load().await.unwrap().unwrap();
        assert_eq!(loaded.last_processed_round, 1000);

        mgr.reset().await.unwrap();
        assert!(mgr.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn maybe_save_follows_round_cadence() {
        let mgr = CheckpointManager::new(Arc::new(MemoryCheckpointStore::new()), "idx", 5);
        let mut cp = Checkpoint::new();

        for round in 1..=4 {
            cp.last_processed_round = round;
            assert!(!mgr.maybe_save(&cp).await.unwrap());
        }
        assert!(mgr.load().await.unwrap().is_none());

        cp.last_processed_round = 5;
        assert!(mgr.maybe_save(&cp).await.unwrap());
        assert_eq!(mgr.load().await.unwrap().unwrap().last_processed_round, 5);
    }

    #[test]
    fn round_zero_is_never_due() {
        let mgr = CheckpointManager::new(Arc::new(MemoryCheckpointStore::new()), "idx", 10);
        assert!(!mgr.is_due(0));
        assert!(mgr.is_due(10));
        assert!(!mgr.is_due(11));
    }
}
