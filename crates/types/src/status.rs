use std::fmt;

use serde::{Deserialize, Serialize};

/// Final classification of a transaction's execution outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// No terminal signal observed yet.
    Pending,
    /// A completion marker was observed and no error signal accompanied it.
    Success,
    /// An error signal was observed, either on the transaction itself or on
    /// one of its derived sub-transactions.
    Fail,
    /// The observer rejected the transaction as not executable.
    Invalid,
    /// The execution trace carries no information to classify.
    Unknown,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Success => "success",
            TxStatus::Fail => "fail",
            TxStatus::Invalid => "invalid",
            TxStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
