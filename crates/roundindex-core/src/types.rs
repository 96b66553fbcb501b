//! Shared types for the indexing pipeline.

use serde::{Deserialize, Serialize};

/// Sequential unit of block production on the source ledger.
pub type Round = u64;

// ─── Transaction ──────────────────────────────────────────────────────────────

/// A single ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Globally unique signature; the sink's idempotency key.
    pub signature: String,
    /// Transaction kind (e.g. `"txfer"`).
    pub kind: String,
    pub sender: u64,
    pub recipient: u64,
    pub amount: u64,
}

impl Transaction {
    /// Returns `true` if this transaction is of the given kind.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

// ─── Block ────────────────────────────────────────────────────────────────────

/// A fetched block: a round and its ordered transactions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub round: Round,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(round: Round, transactions: Vec<Transaction>) -> Self {
        Self { round, transactions }
    }

    /// An empty block at `round`.
    pub fn empty(round: Round) -> Self {
        Self::new(round, vec![])
    }

    /// Iterate the transactions of `kind`, in block order.
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Transaction> + 'a {
        self.transactions.iter().filter(move |tx| tx.is_kind(kind))
    }
}

// ─── AmountRecord ─────────────────────────────────────────────────────────────

/// An amount together with the round it was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmountRecord {
    pub amount: u64,
    pub round: Round,
}

impl AmountRecord {
    pub fn new(amount: u64, round: Round) -> Self {
        Self { amount, round }
    }
}

// ─── IndexPhase ───────────────────────────────────────────────────────────────

/// The current phase of the index loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexPhase {
    /// Catching up from the checkpoint to the source frontier.
    Backfill,
    /// Following the frontier one round per tick.
    Live,
}

impl std::fmt::Display for IndexPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backfill => write!(f, "backfill"),
            Self::Live => write!(f, "live"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
