//! Block processor. Folds one block into the running checkpoint.

use std::sync::Arc;

use crate::checkpoint::Checkpoint;
use crate::sink::TransactionSink;
use crate::types::Block;

/// Per-block counters reported by [`BlockProcessor::fold`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldSummary {
    /// Transactions of the qualifying kind seen in the block.
    pub qualifying: usize,
    /// Appended and folded into the aggregate (includes duplicates).
    pub recorded: usize,
    /// Subset of `recorded` the sink reported as already present.
    pub duplicates: usize,
    /// Appends that failed; these were left out of the aggregate.
    pub failed: usize,
}

/// Folds qualifying transactions into a [`Checkpoint`], logging each one to
/// the transaction sink first.
pub struct BlockProcessor {
    sink: Arc<dyn TransactionSink>,
    qualifying_kind: String,
}

impl BlockProcessor {
    pub fn new(sink: Arc<dyn TransactionSink>, qualifying_kind: impl Into<String>) -> Self {
        Self {
            sink,
            qualifying_kind: qualifying_kind.into(),
        }
    }

    pub fn qualifying_kind(&self) -> &str {
        &self.qualifying_kind
    }

    /// Fold `block` into `checkpoint`.
    ///
    /// A transaction only reaches the aggregate once the sink has accepted it.
    /// Failed appends are logged and skipped; they never abort the block.
    /// `last_processed_round` moves to `block.round` regardless.
    pub async fn fold(&self, block: &Block, checkpoint: &mut Checkpoint) -> FoldSummary {
        let mut summary = FoldSummary::default();

        for tx in block.of_kind(&self.qualifying_kind) {
            summary.qualifying += 1;

            match self.sink.append(tx).await {
                Ok(outcome) => {
                    if outcome.is_duplicate() {
                        summary.duplicates += 1;
                        tracing::debug!(
                            signature = %tx.signature,
                            round = block.round,
                            "transaction already logged"
                        );
                    }
                    checkpoint.record(tx.amount, block.round);
                    summary.recorded += 1;
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        signature = %tx.signature,
                        round = block.round,
                        error = %e,
                        "failed to log transaction, leaving it out of the aggregate"
                    );
                }
            }
        }

        checkpoint.last_processed_round = block.round;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexerError;
    use crate::sink::AppendOutcome;
    use crate::types::{AmountRecord, Transaction};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records appended signatures; optionally fails or dedups.
    #[derive(Default)]
    struct RecordingSink {
        logged: Mutex<Vec<String>>,
        seen: Mutex<HashSet<String>>,
        fail_all: bool,
        fail_sigs: HashSet<String>,
    }

    impl RecordingSink {
        fn failing() -> Self {
            Self {
                fail_all: true,
                ..Default::default()
            }
        }

        fn failing_on(sigs: &[&str]) -> Self {
            Self {
                fail_sigs: sigs.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        fn logged(&self) -> Vec<String> {
            self.logged.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransactionSink for RecordingSink {
        async fn append(&self, tx: &Transaction) -> Result<AppendOutcome, IndexerError> {
            if self.fail_all || self.fail_sigs.contains(&tx.signature) {
                return Err(IndexerError::SinkUnavailable("database is down".into()));
            }
            if !self.seen.lock().unwrap().insert(tx.signature.clone()) {
                return Ok(AppendOutcome::AlreadyExists);
            }
            self.logged.lock().unwrap().push(tx.signature.clone());
            Ok(AppendOutcome::Inserted)
        }
    }

    fn tx(sig: &str, kind: &str, amount: u64) -> Transaction {
        Transaction {
            signature: sig.into(),
            kind: kind.into(),
            sender: 10,
            recipient: 20,
            amount,
        }
    }

    fn processor(sink: &Arc<RecordingSink>) -> BlockProcessor {
        BlockProcessor::new(sink.clone(), "txfer")
    }

    #[tokio::test]
    async fn folds_qualifying_transactions() {
        let sink = Arc::new(RecordingSink::default());
        let p = processor(&sink);

        let block = Block::new(
            100,
            vec![
                tx("sig1", "txfer", 100),
                tx("sig2", "other", 50),
                tx("sig3", "txfer", 25),
                tx("sig4", "txfer", 200),
            ],
        );
        let mut cp = Checkpoint::new();
        let summary = p.fold(&block, &mut cp).await;

        assert_eq!(cp.last_processed_round, 100);
        assert_eq!(cp.txn_count, 3);
        assert_eq!(cp.total_amount, 325);
        assert_eq!(cp.min_amount, AmountRecord::new(25, 100));
        assert_eq!(cp.max_amount, AmountRecord::new(200, 100));

        assert_eq!(sink.logged(), ["sig1", "sig3", "sig4"]);
        assert_eq!(summary.qualifying, 3);
        assert_eq!(summary.recorded, 3);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn first_transaction_sets_min_and_max() {
        let sink = Arc::new(RecordingSink::default());
        let p = processor(&sink);

        let mut cp = Checkpoint::new();
        p.fold(&Block::new(50, vec![tx("sig1", "txfer", 500)]), &mut cp).await;

        assert_eq!(cp.txn_count, 1);
        assert_eq!(cp.min_amount, AmountRecord::new(500, 50));
        assert_eq!(cp.max_amount, AmountRecord::new(500, 50));
    }

    #[tokio::test]
    async fn empty_block_only_moves_round() {
        let sink = Arc::new(RecordingSink::default());
        let p = processor(&sink);

        let mut cp = Checkpoint {
            txn_count: 5,
            total_amount: 1000,
            ..Default::default()
        };
        let before = cp;
        p.fold(&Block::empty(200), &mut cp).await;

        assert_eq!(cp.last_processed_round, 200);
        assert_eq!(cp.txn_count, before.txn_count);
        assert_eq!(cp.total_amount, before.total_amount);
        assert_eq!(cp.min_amount, before.min_amount);
        assert_eq!(cp.max_amount, before.max_amount);
        assert!(sink.logged().is_empty());
    }

    #[tokio::test]
    async fn non_qualifying_block_never_touches_sink() {
        let sink = Arc::new(RecordingSink::failing());
        let p = processor(&sink);

        let mut cp = Checkpoint::new();
        let summary = p
            .fold(&Block::new(7, vec![tx("a", "other", 1), tx("b", "stake", 2)]), &mut cp)
            .await;

        assert_eq!(summary, FoldSummary::default());
        assert_eq!(cp.last_processed_round, 7);
        assert!(cp.is_empty());
    }

    #[tokio::test]
    async fn failed_append_skips_aggregate_but_advances_round() {
        let sink = Arc::new(RecordingSink::failing());
        let p = processor(&sink);

        let mut cp = Checkpoint::new();
        let summary = p.fold(&Block::new(300, vec![tx("sig1", "txfer", 100)]), &mut cp).await;

        assert_eq!(cp.last_processed_round, 300);
        assert_eq!(cp.txn_count, 0);
        assert_eq!(cp.total_amount, 0);
        assert!(cp.min().is_none());
        assert!(sink.logged().is_empty());
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn partial_failure_does_not_abort_block() {
        let sink = Arc::new(RecordingSink::failing_on(&["sig2"]));
        let p = processor(&sink);

        let block = Block::new(
            8,
            vec![tx("sig1", "txfer", 40), tx("sig2", "txfer", 1), tx("sig3", "txfer", 60)],
        );
        let mut cp = Checkpoint::new();
        let summary = p.fold(&block, &mut cp).await;

        assert_eq!(cp.txn_count, 2);
        assert_eq!(cp.total_amount, 100);
        // The failed 1 must not become the minimum.
        assert_eq!(cp.min_amount, AmountRecord::new(40, 8));
        assert_eq!(summary.recorded, 2);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn duplicate_counts_as_success_once_per_fold() {
        let sink = Arc::new(RecordingSink::default());
        let p = processor(&sink);

        let mut first = Checkpoint::new();
        p.fold(&Block::new(1, vec![tx("dup", "txfer", 9)]), &mut first).await;
        assert_eq!(first.txn_count, 1);

        // Re-delivery of the same block into a fresh aggregate (e.g. restart
        // from a stale checkpoint): the sink dedups, the fold still counts it.
        let mut replay = Checkpoint::new();
        let summary = p.fold(&Block::new(1, vec![tx("dup", "txfer", 9)]), &mut replay).await;

        assert_eq!(replay.txn_count, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(sink.logged(), ["dup"]);
    }

    #[tokio::test]
    async fn sums_across_blocks() {
        let sink = Arc::new(RecordingSink::default());
        let p = processor(&sink);

        let mut cp = Checkpoint::new();
        let mut expected = 0u64;
        let mut n = 0u64;
        for round in 1..=20u64 {
            let txs: Vec<_> = (0..round % 4)
                .map(|i| {
                    let amount = round * 10 + i;
                    expected += amount;
                    n += 1;
                    tx(&format!("r{round}-{i}"), "txfer", amount)
                })
                .collect();
            p.fold(&Block::new(round, txs), &mut cp).await;
        }

        assert_eq!(cp.total_amount, expected);
        assert_eq!(cp.txn_count, n);
        assert_eq!(cp.last_processed_round, 20);
        assert_eq!(cp.min_amount, AmountRecord::new(10, 1));
        assert_eq!(cp.max_amount, AmountRecord::new(192, 19));
    }
}
