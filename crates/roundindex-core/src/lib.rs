//! roundindex-core: foundation for the crash-resumable round indexer.
//!
//! # Architecture
//!
//! ```text
//! IndexLoop (engine)
//!     ├── SourceGateway      (frontier + block by round)
//!     ├── BlockProcessor     (fold qualifying transactions)
//!     │     └── TransactionSink (durable, idempotent log)
//!     └── CheckpointManager  (load / periodic save / final save)
//!           └── CheckpointStore (memory / SQLite)
//! ```

pub mod checkpoint;
pub mod error;
pub mod indexer;
pub mod processor;
pub mod sink;
pub mod source;
pub mod types;

pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore, MemoryCheckpointStore};
pub use error::IndexerError;
pub use indexer::{IndexerConfig, IndexerState};
pub use processor::{BlockProcessor, FoldSummary};
pub use sink::{AppendOutcome, TransactionSink};
pub use source::SourceGateway;
pub use types::{AmountRecord, Block, IndexPhase, Round, Transaction};
