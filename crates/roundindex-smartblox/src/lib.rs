//! roundindex-smartblox: SmartBlox gateway and the index loop.

pub mod builder;
pub mod fetcher;
pub mod index_loop;
pub mod mock;

pub use builder::IndexerBuilder;
pub use fetcher::{ClientConfig, SmartBloxClient};
pub use index_loop::{IndexLoop, PollOutcome};
pub use mock::MockLedger;
