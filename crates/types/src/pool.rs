use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A pool transaction with an open field set.
///
/// Observers return only the fields the caller selected, so the shape is a
/// free-form JSON object rather than a fixed struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WrappedTransaction {
    #[serde(rename = "txFields")]
    pub tx_fields: Map<String, Value>,
}

impl WrappedTransaction {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.tx_fields.get(name)
    }
}

/// One shard's pool snapshot, split by transaction kind.
///
/// Aggregation across shards concatenates each sequence in shard-iteration
/// order; there is no global sort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionsPool {
    #[serde(default, rename = "regularTransactions")]
    pub regular_transactions: Vec<WrappedTransaction>,
    #[serde(default, rename = "smartContractResults")]
    pub smart_contract_results: Vec<WrappedTransaction>,
    #[serde(default)]
    pub rewards: Vec<WrappedTransaction>,
}

impl TransactionsPool {
    /// Append another shard's snapshot, preserving per-kind ordering.
    pub fn extend(&mut self, other: TransactionsPool) {
        self.regular_transactions.extend(other.regular_transactions);
        self.smart_contract_results
            .extend(other.smart_contract_results);
        self.rewards.extend(other.rewards);
    }
}

/// The pool view narrowed to a single sender.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionsPoolForSender {
    #[serde(default)]
    pub transactions: Vec<WrappedTransaction>,
}

/// A missing nonce range in a sender's pending-pool view, as reported by
/// the observer. The gateway passes gaps through without recomputation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceGap {
    pub from: u64,
    pub to: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceGaps {
    #[serde(default)]
    pub gaps: Vec<NonceGap>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapped(sender: &str, nonce: u64, hash: &str) -> WrappedTransaction {
        let mut fields = Map::new();
        fields.insert("sender".into(), Value::from(sender));
        fields.insert("nonce".into(), Value::from(nonce));
        fields.insert("hash".into(), Value::from(hash));
        WrappedTransaction { tx_fields: fields }
    }

    #[test]
    fn extend_concatenates_in_order() {
        let mut merged = TransactionsPool {
            regular_transactions: vec![wrapped("aaaa", 101, "h0")],
            smart_contract_results: vec![wrapped("aaaa", 103, "h1")],
            rewards: vec![],
        };
        merged.extend(TransactionsPool {
            regular_transactions: vec![wrapped("bbbb", 111, "h2")],
            smart_contract_results: vec![],
            rewards: vec![wrapped("bbbb", 112, "h3")],
        });

        assert_eq!(merged.regular_transactions.len(), 2);
        assert_eq!(
            merged.regular_transactions[1].field("hash"),
            Some(&Value::from("h2"))
        );
        assert_eq!(merged.rewards.len(), 1);
    }

    #[test]
    fn nonce_gaps_decode() {
        let gaps: NonceGaps =
            serde_json::from_str(r#"{"gaps":[{"from":0,"to":101},{"from":112,"to":113}]}"#).unwrap();
        assert_eq!(gaps.gaps.len(), 2);
        assert_eq!(gaps.gaps[0], NonceGap { from: 0, to: 101 });
    }
}
