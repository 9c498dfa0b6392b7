//! The HTTP surface of the gateway. Routes are thin: extract, delegate to
//! the processors, wrap the outcome in the gateway envelope.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use shardgate_process::{
    HeartbeatProcessor, HistoryReader, NetworkProcessor, ProcessError, TransactionProcessor,
};
use shardgate_types::{DatabaseTransaction, Transaction};

#[derive(Clone)]
pub struct AppState {
    pub transactions: Arc<TransactionProcessor>,
    pub heartbeat: Arc<HeartbeatProcessor>,
    pub network: Arc<NetworkProcessor>,
    pub history: Option<Arc<dyn HistoryReader>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/transaction/send", post(send_transaction))
        .route("/transaction/send-multiple", post(send_multiple_transactions))
        .route("/transaction/simulate", post(simulate_transaction))
        .route("/transaction/pool", get(transactions_pool))
        .route("/transaction/:hash", get(transaction))
        .route("/transaction/:hash/status", get(transaction_status))
        .route("/transaction/:hash/process-status", get(processed_status))
        .route("/node/heartbeatstatus", get(heartbeat_status))
        .route("/network/status/:shard", get(network_status))
        .route("/network/config", get(network_config))
        .route("/block/:shard/by-nonce/:nonce", get(block_by_nonce))
        .route("/address/:address/transactions", get(address_transactions))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---- envelope -----------------------------------------------------------

fn ok_response<T: serde::Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(json!({"data": data, "error": "", "code": "successful"})),
    )
        .into_response()
}

fn err_response(err: ProcessError) -> Response {
    let (status, code) = if err.is_client_error() {
        (StatusCode::BAD_REQUEST, "bad_request")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "internal_issue")
    };
    (
        status,
        Json(json!({"data": null, "error": err.to_string(), "code": code})),
    )
        .into_response()
}

fn respond<T: serde::Serialize>(result: Result<T, ProcessError>) -> Response {
    match result {
        Ok(data) => ok_response(data),
        Err(err) => err_response(err),
    }
}

// ---- transactions -------------------------------------------------------

async fn send_transaction(State(state): State<AppState>, Json(tx): Json<Transaction>) -> Response {
    respond(
        state
            .transactions
            .send_transaction(&tx)
            .await
            .map(|tx_hash| json!({"txHash": tx_hash})),
    )
}

async fn send_multiple_transactions(
    State(state): State<AppState>,
    Json(txs): Json<Vec<Transaction>>,
) -> Response {
    respond(state.transactions.send_multiple_transactions(&txs).await)
}

#[derive(Deserialize)]
struct SimulateQuery {
    #[serde(rename = "checkSignature")]
    check_signature: Option<bool>,
}

async fn simulate_transaction(
    State(state): State<AppState>,
    Query(query): Query<SimulateQuery>,
    Json(tx): Json<Transaction>,
) -> Response {
    respond(
        state
            .transactions
            .simulate_transaction(&tx, query.check_signature.unwrap_or(true))
            .await,
    )
}

#[derive(Deserialize)]
struct TransactionQuery {
    #[serde(rename = "withResults")]
    with_results: Option<bool>,
    sender: Option<String>,
}

async fn transaction(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Query(query): Query<TransactionQuery>,
) -> Response {
    respond(
        state
            .transactions
            .get_transaction(&hash, query.with_results.unwrap_or(false))
            .await
            .map(|transaction| json!({"transaction": transaction})),
    )
}

async fn transaction_status(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Query(query): Query<TransactionQuery>,
) -> Response {
    respond(
        state
            .transactions
            .get_transaction_status(&hash, query.sender.as_deref())
            .await
            .map(|status| json!({"status": status})),
    )
}

async fn processed_status(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    respond(
        state
            .transactions
            .get_processed_transaction_status(&hash)
            .await
            .map(|status| json!({"status": status})),
    )
}

#[derive(Deserialize)]
struct PoolQuery {
    fields: Option<String>,
    #[serde(rename = "shard-id")]
    shard_id: Option<u32>,
    #[serde(rename = "by-sender")]
    by_sender: Option<String>,
    #[serde(rename = "last-nonce")]
    last_nonce: Option<bool>,
    #[serde(rename = "nonce-gaps")]
    nonce_gaps: Option<bool>,
}

async fn transactions_pool(
    State(state): State<AppState>,
    Query(query): Query<PoolQuery>,
) -> Response {
    let txs = &state.transactions;
    let fields = query.fields.as_deref().unwrap_or("");

    if let Some(sender) = query.by_sender.as_deref() {
        if query.last_nonce.unwrap_or(false) {
            return respond(
                txs.get_last_pool_nonce_for_sender(sender)
                    .await
                    .map(|nonce| json!({"nonce": nonce})),
            );
        }
        if query.nonce_gaps.unwrap_or(false) {
            return respond(
                txs.get_transactions_pool_nonce_gaps_for_sender(sender)
                    .await
                    .map(|gaps| json!({"nonceGaps": gaps})),
            );
        }
        return respond(
            txs.get_transactions_pool_for_sender(sender, fields)
                .await
                .map(|pool| json!({"txPool": pool})),
        );
    }

    if let Some(shard) = query.shard_id {
        return respond(
            txs.get_transactions_pool_for_shard(shard, fields)
                .await
                .map(|pool| json!({"txPool": pool})),
        );
    }

    respond(
        txs.get_transactions_pool(fields)
            .await
            .map(|pool| json!({"txPool": pool})),
    )
}

// ---- node / network -----------------------------------------------------

async fn heartbeat_status(State(state): State<AppState>) -> Response {
    respond(state.heartbeat.heartbeat_data().await)
}

async fn network_status(State(state): State<AppState>, Path(shard): Path<u32>) -> Response {
    respond(state.network.network_status(shard).await)
}

async fn network_config(State(state): State<AppState>) -> Response {
    respond(state.network.network_config().await)
}

// ---- history ------------------------------------------------------------

async fn block_by_nonce(
    State(state): State<AppState>,
    Path((shard, nonce)): Path<(u32, u64)>,
) -> Response {
    let Some(history) = state.history.as_ref() else {
        return err_response(ProcessError::HistoryNotConfigured);
    };
    respond(
        history
            .block_by_nonce(shard, nonce)
            .await
            .map(|block| json!({"block": block})),
    )
}

async fn address_transactions(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Response {
    let Some(history) = state.history.as_ref() else {
        return err_response(ProcessError::HistoryNotConfigured);
    };
    respond(
        history
            .transactions_by_address(&address)
            .await
            .map(|transactions| {
                // serve indexed documents in the same shape as live lookups
                let records: Vec<_> = transactions
                    .into_iter()
                    .map(DatabaseTransaction::into_record)
                    .collect();
                json!({"transactions": records})
            }),
    )
}
