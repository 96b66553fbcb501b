//! In-memory storage backend.
//!
//! Stores checkpoints and the transaction log in RAM. Useful for testing and
//! short-lived indexers that don't need persistence. Either half can be
//! switched offline to exercise the engine's failure paths.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use roundindex_core::checkpoint::{Checkpoint, CheckpointStore};
use roundindex_core::error::IndexerError;
use roundindex_core::sink::{AppendOutcome, TransactionSink};
use roundindex_core::types::{Round, Transaction};

#[derive(Default)]
struct TxLog {
    records: Vec<Transaction>,
    signatures: HashSet<String>,
}

/// In-memory indexer storage.
///
/// All data is lost when the process exits.
pub struct InMemoryStorage {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
    save_log: Mutex<Vec<(String, Round)>>,
    log: Mutex<TxLog>,
    sink_online: AtomicBool,
    store_online: AtomicBool,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self {
            checkpoints: Mutex::default(),
            save_log: Mutex::default(),
            log: Mutex::default(),
            sink_online: AtomicBool::new(true),
            store_online: AtomicBool::new(true),
        }
    }
}

fn relock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `append` fail with `SinkUnavailable` while `false`.
    pub fn set_sink_online(&self, online: bool) {
        self.sink_online.store(online, Ordering::SeqCst);
    }

    /// Make checkpoint load/save/delete fail with `StoreUnavailable` while `false`.
    pub fn set_store_online(&self, online: bool) {
        self.store_online.store(online, Ordering::SeqCst);
    }

    fn check_store(&self) -> Result<(), IndexerError> {
        if self.store_online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(IndexerError::StoreUnavailable("memory store offline".into()))
        }
    }

    /// Total number of logged transactions.
    pub fn transaction_count(&self) -> usize {
        relock(&self.log).records.len()
    }

    /// Logged transactions in append order.
    pub fn transactions(&self) -> Vec<Transaction> {
        relock(&self.log).records.clone()
    }

    /// Look up a logged transaction by signature.
    pub fn get_transaction(&self, signature: &str) -> Option<Transaction> {
        relock(&self.log)
            .records
            .iter()
            .find(|t| t.signature == signature)
            .cloned()
    }

    /// The checkpoint currently stored under `indexer_id`.
    pub fn checkpoint(&self, indexer_id: &str) -> Option<Checkpoint> {
        relock(&self.checkpoints).get(indexer_id).copied()
    }

    /// `last_processed_round` of every successful save for `indexer_id`, in order.
    pub fn saved_rounds(&self, indexer_id: &str) -> Vec<Round> {
        relock(&self.save_log)
            .iter()
            .filter(|(id, _)| id == indexer_id)
            .map(|(_, round)| *round)
            .collect()
    }
}

#[async_trait]
impl TransactionSink for InMemoryStorage {
    async fn append(&self, tx: &Transaction) -> Result<AppendOutcome, IndexerError> {
        if !self.sink_online.load(Ordering::SeqCst) {
            return Err(IndexerError::SinkUnavailable("memory sink offline".into()));
        }
        let mut log = relock(&self.log);
        if !log.signatures.insert(tx.signature.clone()) {
            return Ok(AppendOutcome::AlreadyExists);
        }
        log.records.push(tx.clone());
        Ok(AppendOutcome::Inserted)
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStorage {
    async fn load(&self, indexer_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        self.check_store()?;
        Ok(self.checkpoint(indexer_id))
    }

    async fn save(&self, indexer_id: &str, checkpoint: &Checkpoint) -> Result<(), IndexerError> {
        self.check_store()?;
        relock(&self.checkpoints).insert(indexer_id.to_string(), *checkpoint);
        relock(&self.save_log).push((indexer_id.to_string(), checkpoint.last_processed_round));
        Ok(())
    }

    async fn delete(&self, indexer_id: &str) -> Result<(), IndexerError> {
        self.check_store()?;
        relock(&self.checkpoints).remove(indexer_id);
        Ok(())
    }
}
