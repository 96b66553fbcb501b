//! Indexer configuration and state types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::IndexerError;

/// Configuration for an indexer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Unique name for this indexer (used as the checkpoint key).
    pub id: String,
    /// Transaction kind that gets logged and aggregated.
    pub qualifying_kind: String,
    /// Live mode polling interval (milliseconds).
    pub poll_interval_ms: u64,
    /// Persist the checkpoint whenever the last processed round is a multiple
    /// of this value.
    pub persist_cadence: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            id: "singleton_metrics_state".into(),
            qualifying_kind: "txfer".into(),
            poll_interval_ms: 5_000,
            persist_cadence: 10,
        }
    }
}

impl IndexerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject settings the index loop cannot run with.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.id.is_empty() {
            return Err(IndexerError::Config("indexer id must not be empty".into()));
        }
        if self.qualifying_kind.is_empty() {
            return Err(IndexerError::Config("qualifying kind must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(IndexerError::Config("poll interval must be positive".into()));
        }
        if self.persist_cadence == 0 {
            return Err(IndexerError::Config("persist cadence must be positive".into()));
        }
        Ok(())
    }
}

/// Runtime state of the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerState {
    /// Not yet started.
    Idle,
    /// Reading the persisted checkpoint.
    Loading,
    /// Draining the gap between the checkpoint and the source frontier.
    Backfilling,
    /// Following the frontier one round per tick.
    Polling,
    /// Cancellation observed; persisting the final checkpoint.
    Draining,
    /// Clean shutdown.
    Terminated,
    /// Encountered an unrecoverable error.
    Failed,
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Backfilling => write!(f, "backfilling"),
            Self::Polling => write!(f, "polling"),
            Self::Draining => write!(f, "draining"),
            Self::Terminated => write!(f, "terminated"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = IndexerConfig::default();
        assert_eq!(cfg.qualifying_kind, "txfer");
        assert_eq!(cfg.persist_cadence, 10);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let cfg = IndexerConfig {
            persist_cadence: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(IndexerError::Config(_))));
    }

    #[test]
    fn empty_kind_is_rejected() {
        let cfg = IndexerConfig {
            qualifying_kind: String::new(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn state_display() {
        assert_eq!(IndexerState::Backfilling.to_string(), "backfilling");
        assert_eq!(IndexerState::Terminated.to_string(), "terminated");
    }
}
