use shardgate_types::AddressError;

/// A single failed HTTP round trip to one observer.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The request never produced an HTTP response (connect failure,
    /// timeout, DNS, ...). No status code exists for these.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("observer {url} answered with HTTP {code}")]
    Http { code: u16, url: String },
    /// The observer is reachable but reports itself not running.
    #[error("observer {url} is not running")]
    NotRunning { url: String },
    #[error("cannot decode observer response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors surfaced by the processing layer.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("empty observer list")]
    EmptyObserverList,
    #[error("no observer registered for shard {0}")]
    MissingObserver(u32),
    #[error("invalid shard id {0}")]
    InvalidShardId(u32),
    #[error("cannot compute shard id for address")]
    ComputeShardFailed,
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("transaction has no chainID")]
    NoChainId,
    #[error("transaction has no version")]
    NoVersion,
    #[error("invalid transaction value field")]
    InvalidTransactionValueField,
    #[error("invalid signature bytes: {0}")]
    InvalidSignatureBytes(hex::FromHexError),
    #[error("no valid transaction to send")]
    NoValidTransactionToSend,
    /// An observer produced a definitive non-retryable rejection; its error
    /// message is carried back to the caller verbatim.
    #[error("{message}")]
    Rejected { code: u16, message: String },
    /// Every observer of the target shard was tried without success.
    #[error("sending request error after trying observers {observers:?}: {source}")]
    SendingRequest {
        observers: Vec<String>,
        source: DispatchError,
    },
    #[error("operation not allowed")]
    OperationNotAllowed,
    #[error("heartbeat status not available")]
    HeartbeatNotAvailable,
    #[error("invalid cache validity duration")]
    InvalidCacheValidityDuration,
    #[error("no history data source configured")]
    HistoryNotConfigured,
    #[error("history lookup failed: {0}")]
    History(String),
    #[error("cannot get transaction status")]
    CannotGetTransactionStatus,
    #[error("transaction not found")]
    TransactionNotFound,
    #[error("cannot build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ProcessError {
    /// Whether the failure is the caller's fault. The endpoint layer maps
    /// client errors to HTTP 400 and everything else to HTTP 500.
    pub fn is_client_error(&self) -> bool {
        match self {
            ProcessError::InvalidAddress(_)
            | ProcessError::InvalidShardId(_)
            | ProcessError::NoChainId
            | ProcessError::NoVersion
            | ProcessError::InvalidTransactionValueField
            | ProcessError::InvalidSignatureBytes(_)
            | ProcessError::NoValidTransactionToSend
            | ProcessError::TransactionNotFound => true,
            ProcessError::Rejected { code, .. } => (400..500).contains(code),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_client_errors() {
        assert!(ProcessError::NoChainId.is_client_error());
        assert!(ProcessError::NoValidTransactionToSend.is_client_error());
        assert!(ProcessError::Rejected {
            code: 400,
            message: "bad tx".into()
        }
        .is_client_error());
    }

    #[test]
    fn routing_errors_are_internal() {
        assert!(!ProcessError::EmptyObserverList.is_client_error());
        assert!(!ProcessError::SendingRequest {
            observers: vec!["http://observer:8080".into()],
            source: DispatchError::Transport {
                url: "http://observer:8080/transaction/send".into(),
                message: "connection refused".into(),
            },
        }
        .is_client_error());
        assert!(!ProcessError::Rejected {
            code: 500,
            message: "boom".into()
        }
        .is_client_error());
    }
}
