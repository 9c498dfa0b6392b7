use serde::{Deserialize, Serialize};

/// A single log event emitted during transaction execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub address: String,
    /// Event name, e.g. a completion marker or an error signal. The set of
    /// terminal identifiers is configuration data, not hard-coded here.
    #[serde(default)]
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
}

/// The ordered event log attached to one executed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogs {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// A transaction synthesized by contract execution as a side effect of a
/// parent transaction (cross-shard call-back, balance settlement, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTransaction {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sender: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receiver: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    #[serde(default, rename = "returnMessage", skip_serializing_if = "String::is_empty")]
    pub return_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<EventLogs>,
}

/// The full transaction record an observer returns for a by-hash lookup.
///
/// Together with the derived sub-transactions this is the execution trace
/// the outcome classifier runs over. Assembled per query, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sender: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receiver: String,
    #[serde(default, rename = "sourceShard")]
    pub source_shard: u32,
    #[serde(default, rename = "destinationShard")]
    pub destination_shard: u32,
    /// Raw status string as reported by the observer ("pending",
    /// "success", "invalid", ...). The classifier may override this view.
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<EventLogs>,
    #[serde(
        default,
        rename = "smartContractResults",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub smart_contract_results: Vec<SubTransaction>,
}

impl TransactionRecord {
    /// Whether execution spans two shards.
    pub fn is_cross_shard(&self) -> bool {
        self.source_shard != self.destination_shard
    }

    /// Iterate over the record's own log events, if any were attached.
    pub fn own_events(&self) -> impl Iterator<Item = &Event> {
        self.logs.iter().flat_map(|logs| logs.events.iter())
    }
}
