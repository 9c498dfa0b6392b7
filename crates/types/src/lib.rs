//! Data model for the Shardgate routing gateway.
//!
//! Everything in this crate is plain data: wire shapes exchanged with
//! observer nodes, the transaction submission form and its canonical
//! encoding, and the pool/heartbeat/block views the gateway aggregates.
//! No I/O happens here.

pub mod address;
pub mod api;
pub mod block;
pub mod heartbeat;
pub mod observer;
pub mod pool;
pub mod record;
pub mod status;
pub mod transaction;

pub use address::{decode_address, encode_address, AddressError};
pub use api::{
    ApiResponse, GetTransactionPayload, LastNoncePayload, MultiSendPayload, NonceGapsPayload,
    PoolForSenderPayload, PoolPayload, SendTxPayload, SimulationOutcome, SimulationPayload,
    SimulationResult,
};
pub use block::{ApiBlock, DatabaseTransaction};
pub use heartbeat::{HeartbeatPayload, HeartbeatResponse, PubKeyHeartbeat};
pub use observer::{NodeStatus, Observer};
pub use pool::{NonceGap, NonceGaps, TransactionsPool, TransactionsPoolForSender, WrappedTransaction};
pub use record::{Event, EventLogs, SubTransaction, TransactionRecord};
pub use status::TxStatus;
pub use transaction::{Transaction, WireTransaction};
