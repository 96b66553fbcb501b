//! SQLite storage backend for RoundIndex.
//!
//! Persists checkpoints and the transaction log to a single SQLite file.
//! Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use roundindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./roundindex.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use roundindex_core::checkpoint::{Checkpoint, CheckpointStore};
use roundindex_core::error::IndexerError;
use roundindex_core::sink::{AppendOutcome, TransactionSink};
use roundindex_core::types::{AmountRecord, Transaction};

fn store_err(e: sqlx::Error) -> IndexerError {
    IndexerError::StoreUnavailable(e.to_string())
}

fn sink_err(e: sqlx::Error) -> IndexerError {
    IndexerError::SinkUnavailable(e.to_string())
}

/// SQLite-backed storage for checkpoints and logged transactions.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./roundindex.db"`) or a full
    /// SQLite URL (`"sqlite:./roundindex.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(store_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Pinned to a single connection: every connection to `:memory:` would
    /// otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(store_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        // One row per indexer; all aggregate fields inline.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                indexer_id           TEXT    NOT NULL PRIMARY KEY,
                last_processed_round INTEGER NOT NULL,
                txn_count            INTEGER NOT NULL,
                total_amount         INTEGER NOT NULL,
                min_amount           INTEGER NOT NULL,
                min_round            INTEGER NOT NULL,
                max_amount           INTEGER NOT NULL,
                max_round            INTEGER NOT NULL,
                updated_at           INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        // Signature is the dedup key for the transaction log.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transactions (
                signature TEXT    NOT NULL PRIMARY KEY,
                kind      TEXT    NOT NULL,
                sender    INTEGER NOT NULL,
                recipient INTEGER NOT NULL,
                amount    INTEGER NOT NULL,
                logged_at INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_kind ON transactions (kind);")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(())
    }

    /// Close every pooled connection, checkpointing the WAL.
    ///
    /// Later calls on this storage fail with `StoreUnavailable` / `SinkUnavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("sqlite pool closed");
    }

    // ─── Transaction log queries ────────────────────────────────────────────────

    /// Total number of logged transactions.
    pub async fn transaction_count(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM transactions")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }

    /// Look up a logged transaction by signature.
    pub async fn get_transaction(&self, signature: &str) -> Result<Option<Transaction>, IndexerError> {
        let row = sqlx::query(
            "SELECT signature, kind, sender, recipient, amount
             FROM transactions WHERE signature = ?",
        )
        .bind(signature)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(|r| Transaction {
            signature: r.get("signature"),
            kind: r.get("kind"),
            sender: r.get::<i64, _>("sender") as u64,
            recipient: r.get::<i64, _>("recipient") as u64,
            amount: r.get::<i64, _>("amount") as u64,
        }))
    }

    /// Unix timestamp of the last save for `indexer_id`.
    pub async fn checkpoint_updated_at(&self, indexer_id: &str) -> Result<Option<i64>, IndexerError> {
        let row = sqlx::query("SELECT updated_at FROM checkpoints WHERE indexer_id = ?")
            .bind(indexer_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(row.map(|r| r.get::<i64, _>("updated_at")))
    }
}

fn checkpoint_from_row(r: &SqliteRow) -> Checkpoint {
    let u = |col: &str| r.get::<i64, _>(col) as u64;
    Checkpoint {
        last_processed_round: u("last_processed_round"),
        txn_count: u("txn_count"),
        total_amount: u("total_amount"),
        min_amount: AmountRecord::new(u("min_amount"), u("min_round")),
        max_amount: AmountRecord::new(u("max_amount"), u("max_round")),
    }
}

// ─── TransactionSink impl ────────────────────────────────────────────────────

#[async_trait]
impl TransactionSink for SqliteStorage {
    async fn append(&self, tx: &Transaction) -> Result<AppendOutcome, IndexerError> {
        let result = sqlx::query(
            "INSERT INTO transactions (signature, kind, sender, recipient, amount, logged_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(signature) DO NOTHING",
        )
        .bind(&tx.signature)
        .bind(&tx.kind)
        .bind(tx.sender as i64)
        .bind(tx.recipient as i64)
        .bind(tx.amount as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(sink_err)?;

        if result.rows_affected() == 0 {
            debug!(signature = %tx.signature, "duplicate transaction, skipping");
            return Ok(AppendOutcome::AlreadyExists);
        }
        Ok(AppendOutcome::Inserted)
    }
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStorage {
    async fn load(&self, indexer_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT last_processed_round, txn_count, total_amount,
                    min_amount, min_round, max_amount, max_round
             FROM checkpoints WHERE indexer_id = ?",
        )
        .bind(indexer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.as_ref().map(checkpoint_from_row))
    }

    async fn save(&self, indexer_id: &str, checkpoint: &Checkpoint) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints
             (indexer_id, last_processed_round, txn_count, total_amount,
              min_amount, min_round, max_amount, max_round, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(indexer_id)
        .bind(checkpoint.last_processed_round as i64)
        .bind(checkpoint.txn_count as i64)
        .bind(checkpoint.total_amount as i64)
        .bind(checkpoint.min_amount.amount as i64)
        .bind(checkpoint.min_amount.round as i64)
        .bind(checkpoint.max_amount.amount as i64)
        .bind(checkpoint.max_amount.round as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        debug!(
            indexer_id,
            round = checkpoint.last_processed_round,
            "checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self, indexer_id: &str) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM checkpoints WHERE indexer_id = ?")
            .bind(indexer_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
