use serde::{Deserialize, Serialize};

/// A backend observer node endpoint belonging to exactly one shard.
///
/// Observers are immutable after registry construction; a configuration
/// reload replaces the whole set. Registration order matters: the failover
/// policy tries observers of a shard in exactly this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observer {
    /// Base URL of the observer's REST API (e.g. `http://10.0.0.1:8080`).
    pub address: String,
    /// Shard this observer belongs to.
    #[serde(rename = "shardId", alias = "shard_id")]
    pub shard_id: u32,
}

impl Observer {
    pub fn new(address: impl Into<String>, shard_id: u32) -> Self {
        Self {
            address: address.into(),
            shard_id,
        }
    }
}

/// Liveness payload returned by an observer's `/node/status` endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub running: bool,
}
