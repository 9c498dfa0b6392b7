use serde::{Deserialize, Serialize};

use crate::record::TransactionRecord;

/// A block as served by an observer's block-by-nonce endpoint, narrowed to
/// the fields the gateway inspects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiBlock {
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub hash: String,
    #[serde(default, rename = "round")]
    pub round: u64,
    #[serde(default)]
    pub shard: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<TransactionRecord>,
}

/// A transaction document as stored by the secondary index.
///
/// The index flattens the record and keys documents by hash, so the hash
/// lives outside the source body and is re-attached after a lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseTransaction {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default, rename = "senderShard")]
    pub sender_shard: u32,
    #[serde(default, rename = "receiverShard")]
    pub receiver_shard: u32,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
}

impl DatabaseTransaction {
    /// Project the indexed document onto the record shape the rest of the
    /// pipeline works with.
    pub fn into_record(self) -> TransactionRecord {
        TransactionRecord {
            hash: self.hash,
            nonce: self.nonce,
            value: self.value,
            sender: self.sender,
            receiver: self.receiver,
            source_shard: self.sender_shard,
            destination_shard: self.receiver_shard,
            status: self.status,
            data: self.data,
            ..Default::default()
        }
    }
}
