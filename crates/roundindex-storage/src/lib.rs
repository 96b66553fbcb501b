//! roundindex-storage: pluggable storage backends for RoundIndex.
//!
//! Every backend implements both [`CheckpointStore`] and [`TransactionSink`]
//! so one handle can serve the checkpoint manager and the block processor.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - `sqlite`: SQLite via `sqlx` (embedded, single-file persistence)
//!
//! [`CheckpointStore`]: roundindex_core::checkpoint::CheckpointStore
//! [`TransactionSink`]: roundindex_core::sink::TransactionSink

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryStorage;
