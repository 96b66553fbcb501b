//! Fluent builder API for creating indexers.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roundindex_smartblox::{IndexerBuilder, MockLedger};
//! use roundindex_storage::InMemoryStorage;
//!
//! # fn example() -> Result<(), roundindex_core::IndexerError> {
//! let storage = Arc::new(InMemoryStorage::new());
//! let _index_loop = IndexerBuilder::new()
//!     .id("smartblox-mainnet")
//!     .qualifying_kind("txfer")
//!     .poll_interval_ms(5_000)
//!     .persist_cadence(10)
//!     .build(MockLedger::new(), storage.clone(), storage)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use roundindex_core::checkpoint::CheckpointStore;
use roundindex_core::error::IndexerError;
use roundindex_core::indexer::IndexerConfig;
use roundindex_core::sink::TransactionSink;
use roundindex_core::source::SourceGateway;

use crate::index_loop::IndexLoop;

/// Fluent builder for `IndexerConfig` and `IndexLoop`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Start from an existing config.
    pub fn from_config(config: IndexerConfig) -> Self {
        Self { config }
    }

    /// Set the indexer ID (used as the checkpoint key).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Set the transaction kind that gets logged and aggregated.
    pub fn qualifying_kind(mut self, kind: impl Into<String>) -> Self {
        self.config.qualifying_kind = kind.into();
        self
    }

    /// Set live mode polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Persist the checkpoint on every round that is a multiple of `n`.
    pub fn persist_cadence(mut self, n: u64) -> Self {
        self.config.persist_cadence = n;
        self
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }

    /// Validate the config and assemble an `IndexLoop`.
    pub fn build<C: SourceGateway>(
        self,
        source: C,
        sink: Arc<dyn TransactionSink>,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<IndexLoop<C>, IndexerError> {
        self.config.validate()?;
        Ok(IndexLoop::new(self.config, source, sink, store))
    }
}
