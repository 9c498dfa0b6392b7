use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use num_bigint::BigUint;
use serde_json::Value;
use tracing::{debug, warn};

use shardgate_types::{
    decode_address, GetTransactionPayload, LastNoncePayload, MultiSendPayload, NonceGaps,
    NonceGapsPayload, PoolForSenderPayload, PoolPayload, SendTxPayload, SimulationOutcome,
    SimulationPayload, SimulationResult, Transaction, TransactionRecord, TransactionsPool,
    TransactionsPoolForSender, TxStatus, WireTransaction,
};

use crate::base::{
    decode_payload, exhausted, expect_ok, response_error, try_observers, CoreProcessor,
};
use crate::classify::{classify, EventMarkers};
use crate::errors::{DispatchError, ProcessError};

const TX_SEND_PATH: &str = "/transaction/send";
const TX_SEND_MULTIPLE_PATH: &str = "/transaction/send-multiple";
const TX_SIMULATE_PATH: &str = "/transaction/simulate";
const TX_SIMULATE_NO_SIG_CHECK_PATH: &str = "/transaction/simulate?checkSignature=false";
const TX_POOL_PATH: &str = "/transaction/pool";

/// Submission, lookup, status resolution and pool queries for transactions.
pub struct TransactionProcessor {
    proc: Arc<dyn CoreProcessor>,
    markers: EventMarkers,
    pool_queries_enabled: bool,
}

impl TransactionProcessor {
    pub fn new(
        proc: Arc<dyn CoreProcessor>,
        markers: EventMarkers,
        pool_queries_enabled: bool,
    ) -> Self {
        Self {
            proc,
            markers,
            pool_queries_enabled,
        }
    }

    /// Submit one transaction to its sender's shard and return the hash the
    /// accepting observer assigned.
    pub async fn send_transaction(&self, tx: &Transaction) -> Result<String, ProcessError> {
        let sender = self.validate(tx)?;
        let shard = self.proc.compute_shard_id(&sender)?;
        let observers = self.proc.observers(shard)?;
        let body = serde_json::to_value(tx).map_err(DispatchError::from)?;

        let mut last_err = None;
        for observer in &observers {
            match self
                .proc
                .call_post(&observer.address, TX_SEND_PATH, &body)
                .await
            {
                Ok((code, value)) if (200..300).contains(&code) => {
                    let payload: SendTxPayload = decode_payload(value)?;
                    return Ok(payload.tx_hash);
                }
                // the observer understood the request and rejected it;
                // another observer of the same shard will say the same
                Ok((code, value)) if (400..500).contains(&code) => {
                    return Err(ProcessError::Rejected {
                        code,
                        message: response_error(&value),
                    });
                }
                Ok((code, _)) => {
                    last_err = Some(DispatchError::Http {
                        code,
                        url: observer.address.clone(),
                    });
                }
                Err(err) => {
                    debug!(observer = %observer.address, error = %err, "send failed, trying next observer");
                    last_err = Some(err);
                }
            }
        }

        Err(exhausted(&observers, last_err))
    }

    /// Submit a batch, partitioned by sender shard with exactly one POST per
    /// shard. Transactions whose sender cannot be resolved are dropped; the
    /// returned hash map is keyed by position in the *input* list.
    pub async fn send_multiple_transactions(
        &self,
        txs: &[Transaction],
    ) -> Result<MultiSendPayload, ProcessError> {
        let mut by_shard: BTreeMap<u32, Vec<(usize, &Transaction)>> = BTreeMap::new();
        for (idx, tx) in txs.iter().enumerate() {
            let shard = match self.validate(tx) {
                Ok(sender) => match self.proc.compute_shard_id(&sender) {
                    Ok(shard) => shard,
                    Err(err) => {
                        debug!(index = idx, error = %err, "dropping transaction from batch");
                        continue;
                    }
                },
                Err(err) => {
                    debug!(index = idx, error = %err, "dropping transaction from batch");
                    continue;
                }
            };
            by_shard.entry(shard).or_default().push((idx, tx));
        }

        if by_shard.is_empty() {
            return Err(ProcessError::NoValidTransactionToSend);
        }

        let mut num_of_txs = 0u64;
        let mut txs_hashes = HashMap::new();
        for (shard, batch) in by_shard {
            let observers = match self.proc.observers(shard) {
                Ok(observers) => observers,
                Err(err) => {
                    warn!(shard, error = %err, "no observers for batch partition");
                    continue;
                }
            };

            let shard_txs: Vec<&Transaction> = batch.iter().map(|(_, tx)| *tx).collect();
            let body = serde_json::to_value(&shard_txs).map_err(DispatchError::from)?;

            let outcome = try_observers(&observers, |obs| {
                let body = &body;
                async move {
                    let (code, value) = self
                        .proc
                        .call_post(&obs.address, TX_SEND_MULTIPLE_PATH, body)
                        .await?;
                    expect_ok(code, &obs.address)?;
                    decode_payload::<MultiSendPayload>(value)
                }
            })
            .await;

            match outcome {
                Ok(payload) => {
                    num_of_txs += payload.num_of_txs;
                    for (batch_idx, hash) in payload.txs_hashes {
                        if let Some((original_idx, _)) = batch.get(batch_idx) {
                            txs_hashes.insert(*original_idx, hash);
                        }
                    }
                }
                // one shard failing must not sink the rest of the batch
                Err(err) => warn!(shard, error = %err, "batch submission failed for shard"),
            }
        }

        Ok(MultiSendPayload {
            num_of_txs,
            txs_hashes,
        })
    }

    /// Simulate execution without submitting. Cross-shard transactions are
    /// simulated on both legs.
    pub async fn simulate_transaction(
        &self,
        tx: &Transaction,
        check_signature: bool,
    ) -> Result<SimulationOutcome, ProcessError> {
        let sender = self.validate(tx)?;
        let receiver = decode_address(&tx.receiver)?;
        let sender_shard = self.proc.compute_shard_id(&sender)?;
        let receiver_shard = self.proc.compute_shard_id(&receiver)?;

        let path = if check_signature {
            TX_SIMULATE_PATH
        } else {
            TX_SIMULATE_NO_SIG_CHECK_PATH
        };
        let body = serde_json::to_value(tx).map_err(DispatchError::from)?;

        if sender_shard == receiver_shard {
            let result = self.simulate_on_shard(sender_shard, path, &body).await?;
            return Ok(SimulationOutcome::SingleShard { result });
        }

        let sender_leg = self.simulate_on_shard(sender_shard, path, &body).await?;
        let receiver_leg = self.simulate_on_shard(receiver_shard, path, &body).await?;
        Ok(SimulationOutcome::cross_shard(sender_leg, receiver_leg))
    }

    async fn simulate_on_shard(
        &self,
        shard: u32,
        path: &str,
        body: &Value,
    ) -> Result<SimulationResult, ProcessError> {
        let observers = self.proc.observers(shard)?;
        try_observers(&observers, |obs| async move {
            let (code, value) = self.proc.call_post(&obs.address, path, body).await?;
            expect_ok(code, &obs.address)?;
            let payload: SimulationPayload = decode_payload(value)?;
            Ok(payload.result)
        })
        .await
    }

    /// The canonical transaction hash, computed locally without contacting
    /// any observer. Pure given the transaction's field values.
    pub fn compute_transaction_hash(&self, tx: &Transaction) -> Result<String, ProcessError> {
        if tx.chain_id.is_empty() {
            return Err(ProcessError::NoChainId);
        }
        if tx.version == 0 {
            return Err(ProcessError::NoVersion);
        }
        let value = tx
            .value
            .parse::<BigUint>()
            .map_err(|_| ProcessError::InvalidTransactionValueField)?;
        let receiver = decode_address(&tx.receiver)?;
        let sender = decode_address(&tx.sender)?;
        let signature = hex::decode(&tx.signature).map_err(ProcessError::InvalidSignatureBytes)?;

        let wire = WireTransaction {
            nonce: tx.nonce,
            value: value.to_bytes_be(),
            receiver,
            sender,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            data: tx.data.clone(),
            chain_id: tx.chain_id.clone(),
            version: tx.version,
            signature,
            options: tx.options,
        };
        Ok(wire.hash())
    }

    /// The raw status of a transaction, reconciled across shards. The
    /// destination-shard view is preferred when reachable; the sender side
    /// answers alone otherwise.
    pub async fn get_transaction_status(
        &self,
        hash: &str,
        sender: Option<&str>,
    ) -> Result<String, ProcessError> {
        let (shard, record) = self.locate(hash, sender, false).await?;
        let record = self.with_destination_view(shard, record, hash, false).await;
        Ok(record.status)
    }

    /// The full transaction record. With `with_results`, derived
    /// sub-transactions from both sides of a cross-shard execution are
    /// merged, de-duplicated by hash.
    pub async fn get_transaction(
        &self,
        hash: &str,
        with_results: bool,
    ) -> Result<TransactionRecord, ProcessError> {
        let (shard, record) = self.locate(hash, None, with_results).await?;
        Ok(self
            .with_destination_view(shard, record, hash, with_results)
            .await)
    }

    /// The classified outcome computed from the sender-side view only, with
    /// no destination probing. The raw sender-side status can read pending
    /// long after the destination finalized, which is what the classifier
    /// corrects for.
    pub async fn get_processed_transaction_status(
        &self,
        hash: &str,
    ) -> Result<TxStatus, ProcessError> {
        let (_, record) = self.locate(hash, None, true).await?;
        Ok(classify(&record, false, &self.markers))
    }

    fn validate(&self, tx: &Transaction) -> Result<Vec<u8>, ProcessError> {
        let sender = decode_address(&tx.sender)?;
        if tx.chain_id.is_empty() {
            return Err(ProcessError::NoChainId);
        }
        if tx.version == 0 {
            return Err(ProcessError::NoVersion);
        }
        Ok(sender)
    }

    /// Find the shard holding the record. With a sender hint only that
    /// sender's shard is asked; otherwise every shard is probed in order.
    async fn locate(
        &self,
        hash: &str,
        sender: Option<&str>,
        with_results: bool,
    ) -> Result<(u32, TransactionRecord), ProcessError> {
        let shards = match sender {
            Some(address) => {
                let bytes = decode_address(address)?;
                vec![self.proc.compute_shard_id(&bytes)?]
            }
            None => self.proc.shard_ids(),
        };

        for shard in shards {
            match self.scan_shard(shard, hash, with_results).await {
                Ok(Some(record)) => return Ok((shard, record)),
                Ok(None) => continue,
                Err(err) => {
                    if sender.is_some() {
                        return Err(err);
                    }
                    warn!(shard, error = %err, "shard unreachable during lookup");
                }
            }
        }

        Err(ProcessError::TransactionNotFound)
    }

    /// Ask one shard's observers for the record. A healthy observer that
    /// does not know the hash answers 500; the shard shares storage, so that
    /// answer is authoritative and the remaining observers are skipped.
    async fn scan_shard(
        &self,
        shard: u32,
        hash: &str,
        with_results: bool,
    ) -> Result<Option<TransactionRecord>, ProcessError> {
        let observers = self.proc.observers(shard)?;
        let path = format!("/transaction/{hash}?withResults={with_results}");

        let mut last_err = None;
        for observer in &observers {
            match self.proc.call_get(&observer.address, &path).await {
                Ok((code, value)) if (200..300).contains(&code) => {
                    match decode_payload::<GetTransactionPayload>(value) {
                        Ok(payload) => return Ok(Some(payload.transaction)),
                        Err(err) => last_err = Some(err),
                    }
                }
                Ok((500, _)) => return Ok(None),
                Ok((code, _)) => {
                    last_err = Some(DispatchError::Http {
                        code,
                        url: observer.address.clone(),
                    });
                }
                Err(err) => last_err = Some(err),
            }
        }

        match last_err {
            Some(err) => Err(exhausted(&observers, Some(err))),
            // every observer answered a definitive not-found
            None => Ok(None),
        }
    }

    /// Best-effort refinement of a cross-shard record with the destination
    /// shard's view. Failure to reach the destination keeps the sender-side
    /// record; it never fails the call.
    async fn with_destination_view(
        &self,
        found_shard: u32,
        record: TransactionRecord,
        hash: &str,
        with_results: bool,
    ) -> TransactionRecord {
        if !record.is_cross_shard() || found_shard != record.source_shard {
            return record;
        }

        match self
            .scan_shard(record.destination_shard, hash, with_results)
            .await
        {
            Ok(Some(destination)) => merge_records(record, destination),
            Ok(None) => record,
            Err(err) => {
                debug!(error = %err, "destination shard unavailable, keeping sender-side view");
                record
            }
        }
    }

    // ---- pool queries -------------------------------------------------

    /// Pending-pool snapshot across every shard. Shards are queried in
    /// parallel and joined in shard-id order; a shard failure is tolerated
    /// as long as at least one shard answered.
    pub async fn get_transactions_pool(
        &self,
        fields: &str,
    ) -> Result<TransactionsPool, ProcessError> {
        self.ensure_pool_queries_allowed()?;

        let shards = self.proc.shard_ids();
        let path = pool_path(fields);
        let results = join_all(
            shards
                .iter()
                .map(|&shard| self.pool_snapshot_for_shard(shard, &path)),
        )
        .await;

        let mut merged = TransactionsPool::default();
        let mut answered = false;
        let mut last_err = None;
        for (shard, result) in shards.into_iter().zip(results) {
            match result {
                Ok(pool) => {
                    merged.extend(pool);
                    answered = true;
                }
                Err(err) => {
                    warn!(shard, error = %err, "pool snapshot failed for shard");
                    last_err = Some(err);
                }
            }
        }

        match (answered, last_err) {
            (true, _) => Ok(merged),
            (false, Some(err)) => Err(err),
            (false, None) => Err(ProcessError::EmptyObserverList),
        }
    }

    /// Pending-pool snapshot of one shard only.
    pub async fn get_transactions_pool_for_shard(
        &self,
        shard: u32,
        fields: &str,
    ) -> Result<TransactionsPool, ProcessError> {
        self.ensure_pool_queries_allowed()?;
        self.pool_snapshot_for_shard(shard, &pool_path(fields)).await
    }

    async fn pool_snapshot_for_shard(
        &self,
        shard: u32,
        path: &str,
    ) -> Result<TransactionsPool, ProcessError> {
        let observers = self.proc.observers(shard)?;
        try_observers(&observers, |obs| async move {
            let (code, value) = self.proc.call_get(&obs.address, path).await?;
            expect_ok(code, &obs.address)?;
            let payload: PoolPayload = decode_payload(value)?;
            Ok(payload.transactions)
        })
        .await
    }

    /// Pending transactions of one sender, served by the sender's shard.
    pub async fn get_transactions_pool_for_sender(
        &self,
        sender: &str,
        fields: &str,
    ) -> Result<TransactionsPoolForSender, ProcessError> {
        self.ensure_pool_queries_allowed()?;
        let path = format!("{TX_POOL_PATH}?by-sender={sender}&fields={fields}");
        let payload: PoolForSenderPayload = self.sender_pool_query(sender, &path).await?;
        Ok(payload.tx_pool)
    }

    /// Highest nonce currently sitting in the sender's shard pool.
    pub async fn get_last_pool_nonce_for_sender(
        &self,
        sender: &str,
    ) -> Result<u64, ProcessError> {
        self.ensure_pool_queries_allowed()?;
        let path = format!("{TX_POOL_PATH}?by-sender={sender}&last-nonce=true");
        let payload: LastNoncePayload = self.sender_pool_query(sender, &path).await?;
        Ok(payload.nonce)
    }

    /// Nonce gaps as reported by the sender's shard, passed through without
    /// recomputation.
    pub async fn get_transactions_pool_nonce_gaps_for_sender(
        &self,
        sender: &str,
    ) -> Result<NonceGaps, ProcessError> {
        self.ensure_pool_queries_allowed()?;
        let path = format!("{TX_POOL_PATH}?by-sender={sender}&nonce-gaps=true");
        let payload: NonceGapsPayload = self.sender_pool_query(sender, &path).await?;
        Ok(payload.nonce_gaps)
    }

    async fn sender_pool_query<T: serde::de::DeserializeOwned>(
        &self,
        sender: &str,
        path: &str,
    ) -> Result<T, ProcessError> {
        let bytes = decode_address(sender)?;
        let shard = self.proc.compute_shard_id(&bytes)?;
        let observers = self.proc.observers(shard)?;
        try_observers(&observers, |obs| async move {
            let (code, value) = self.proc.call_get(&obs.address, path).await?;
            expect_ok(code, &obs.address)?;
            decode_payload::<T>(value)
        })
        .await
    }

    fn ensure_pool_queries_allowed(&self) -> Result<(), ProcessError> {
        if self.pool_queries_enabled {
            Ok(())
        } else {
            Err(ProcessError::OperationNotAllowed)
        }
    }
}

fn pool_path(fields: &str) -> String {
    if fields.is_empty() {
        TX_POOL_PATH.to_string()
    } else {
        format!("{TX_POOL_PATH}?fields={fields}")
    }
}

fn merge_records(source: TransactionRecord, mut destination: TransactionRecord) -> TransactionRecord {
    for scr in source.smart_contract_results {
        let already_known = destination
            .smart_contract_results
            .iter()
            .any(|existing| existing.hash == scr.hash);
        if !already_known {
            destination.smart_contract_results.push(scr);
        }
    }
    destination
}
