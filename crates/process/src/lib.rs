//! The Shardgate core engine: observer registry and shard resolution,
//! HTTP dispatch with failover, the transaction pipeline, cross-shard
//! status resolution, outcome classification, pool aggregation, heartbeat
//! caching and the secondary-index read path.
//!
//! Everything network-facing is written against the [`CoreProcessor`]
//! trait so the logic stays testable with stubbed observers.

pub mod base;
pub mod classify;
pub mod database;
pub mod errors;
pub mod heartbeat;
pub mod network;
pub mod tx;

pub use base::{decode_payload, try_observers, BaseProcessor, CoreProcessor};
pub use classify::{classify, kind_of, EventMarkers, TransactionKind};
pub use database::{ElasticReader, HistoryReader};
pub use errors::{DispatchError, ProcessError};
pub use heartbeat::HeartbeatProcessor;
pub use network::NetworkProcessor;
pub use tx::TransactionProcessor;
