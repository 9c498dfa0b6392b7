use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::pool::{NonceGaps, TransactionsPool, TransactionsPoolForSender};
use crate::record::{EventLogs, SubTransaction, TransactionRecord};

/// The response envelope every observer endpoint wraps its payload in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub code: String,
}

/// Payload of a successful single-transaction submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendTxPayload {
    #[serde(rename = "txHash")]
    pub tx_hash: String,
}

/// Payload of a batched submission: the per-index hash map refers to the
/// positions inside the batch that was POSTed to that observer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiSendPayload {
    #[serde(rename = "numOfSentTxs")]
    pub num_of_txs: u64,
    #[serde(rename = "txsHashes")]
    pub txs_hashes: HashMap<usize, String>,
}

/// Result of simulating one leg of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "failReason", skip_serializing_if = "String::is_empty")]
    pub fail_reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<EventLogs>,
    #[serde(
        default,
        rename = "scResults",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub sc_results: Vec<SubTransaction>,
}

/// Payload of an observer's `/transaction/simulate` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationPayload {
    pub result: SimulationResult,
}

/// What the gateway hands back for a simulation request.
///
/// A cross-shard simulation intentionally reports both legs so a client can
/// see why a transaction might pass on one side and fail on the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimulationOutcome {
    SingleShard {
        result: SimulationResult,
    },
    CrossShard {
        result: HashMap<String, SimulationResult>,
    },
}

impl SimulationOutcome {
    pub const SENDER_SHARD_KEY: &'static str = "senderShard";
    pub const RECEIVER_SHARD_KEY: &'static str = "receiverShard";

    pub fn cross_shard(sender: SimulationResult, receiver: SimulationResult) -> Self {
        let mut result = HashMap::with_capacity(2);
        result.insert(Self::SENDER_SHARD_KEY.to_string(), sender);
        result.insert(Self::RECEIVER_SHARD_KEY.to_string(), receiver);
        SimulationOutcome::CrossShard { result }
    }
}

/// Payload of a transaction-by-hash lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTransactionPayload {
    pub transaction: TransactionRecord,
}

/// Payload of a whole-pool or per-shard pool snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolPayload {
    #[serde(rename = "txPool")]
    pub transactions: TransactionsPool,
}

/// Payload of a per-sender pool query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolForSenderPayload {
    #[serde(rename = "txPool")]
    pub tx_pool: TransactionsPoolForSender,
}

/// Payload of a last-nonce-for-sender query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastNoncePayload {
    #[serde(default)]
    pub nonce: u64,
}

/// Payload of a nonce-gaps-for-sender query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NonceGapsPayload {
    #[serde(rename = "nonceGaps")]
    pub nonce_gaps: NonceGaps,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_a_typed_payload() {
        let raw = serde_json::json!({
            "data": {"txHash": "DEADBEEF01234567890"},
            "error": "",
            "code": "successful"
        });

        let envelope: ApiResponse<SendTxPayload> = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.data.tx_hash, "DEADBEEF01234567890");
        assert_eq!(envelope.code, "successful");
    }

    #[test]
    fn multi_send_payload_maps_indices() {
        // error and code are absent; they default
        let raw = serde_json::json!({
            "data": {
                "numOfSentTxs": 2,
                "txsHashes": {"0": "hash0", "1": "hash1"}
            }
        });

        let envelope: ApiResponse<MultiSendPayload> = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.data.num_of_txs, 2);
        assert_eq!(envelope.data.txs_hashes[&1], "hash1");
        assert!(envelope.error.is_empty());
    }

    #[test]
    fn cross_shard_outcome_keyed_by_leg() {
        let outcome = SimulationOutcome::cross_shard(
            SimulationResult {
                status: "ok".into(),
                ..Default::default()
            },
            SimulationResult {
                status: "not ok".into(),
                fail_reason: "fail reason".into(),
                ..Default::default()
            },
        );

        let encoded = serde_json::to_value(&outcome).unwrap();
        assert_eq!(encoded["result"]["senderShard"]["status"], "ok");
        assert_eq!(encoded["result"]["receiverShard"]["failReason"], "fail reason");
    }
}
