use serde::{Deserialize, Serialize};

/// One validator's heartbeat as reported by an observer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PubKeyHeartbeat {
    #[serde(default, rename = "publicKey")]
    pub public_key: String,
    #[serde(default, rename = "timeStamp")]
    pub time_stamp: u64,
    #[serde(default, rename = "isActive")]
    pub is_active: bool,
    #[serde(default, rename = "receivedShardID")]
    pub received_shard_id: u32,
    #[serde(default, rename = "computedShardID")]
    pub computed_shard_id: u32,
    #[serde(default, rename = "versionNumber")]
    pub version_number: String,
    #[serde(default, rename = "nodeDisplayName")]
    pub node_display_name: String,
    #[serde(default)]
    pub identity: String,
    #[serde(default, rename = "peerType")]
    pub peer_type: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default, rename = "numInstances")]
    pub num_instances: u64,
}

/// The heartbeat list served to clients, refreshed from a cache rather than
/// fetched per request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    #[serde(default)]
    pub heartbeats: Vec<PubKeyHeartbeat>,
}

/// Payload of an observer's `/node/heartbeatstatus` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub heartbeats: Vec<PubKeyHeartbeat>,
}
