use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use shardgate_types::{ApiBlock, DatabaseTransaction};

use crate::errors::ProcessError;

const TRANSACTIONS_INDEX: &str = "transactions";
const BLOCKS_INDEX: &str = "blocks";
const PAGE_SIZE: u32 = 50;

/// Read-only access to historical data kept in a secondary index. Never on
/// the live request path; the observers stay authoritative for anything
/// still in their storage window.
#[async_trait]
pub trait HistoryReader: Send + Sync {
    async fn transactions_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<DatabaseTransaction>, ProcessError>;

    async fn block_by_nonce(&self, shard: u32, nonce: u64) -> Result<ApiBlock, ProcessError>;

    async fn latest_block_height(&self, shard: u32) -> Result<u64, ProcessError>;
}

/// [`HistoryReader`] against an Elasticsearch-compatible `_search` API.
pub struct ElasticReader {
    client: reqwest::Client,
    base_url: String,
}

impl ElasticReader {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ProcessError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn search(&self, index: &str, query: &Value) -> Result<Value, ProcessError> {
        let url = format!("{}/{}/_search", self.base_url, index);
        let response = self
            .client
            .post(&url)
            .json(query)
            .send()
            .await
            .map_err(|err| ProcessError::History(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProcessError::History(format!(
                "index answered with HTTP {}",
                response.status().as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|err| ProcessError::History(err.to_string()))
    }
}

#[async_trait]
impl HistoryReader for ElasticReader {
    async fn transactions_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<DatabaseTransaction>, ProcessError> {
        let result = self
            .search(TRANSACTIONS_INDEX, &transactions_by_address_query(address))
            .await?;
        Ok(parse_transaction_hits(&result))
    }

    async fn block_by_nonce(&self, shard: u32, nonce: u64) -> Result<ApiBlock, ProcessError> {
        let result = self
            .search(BLOCKS_INDEX, &block_by_nonce_query(shard, nonce))
            .await?;
        let (id, source) = first_hit(&result)
            .ok_or_else(|| ProcessError::History(format!("block {nonce} not indexed")))?;

        let mut block: ApiBlock = serde_json::from_value(source.clone())
            .map_err(|err| ProcessError::History(err.to_string()))?;
        block.hash = id.to_string();
        Ok(block)
    }

    async fn latest_block_height(&self, shard: u32) -> Result<u64, ProcessError> {
        let result = self.search(BLOCKS_INDEX, &latest_block_query(shard)).await?;
        first_hit(&result)
            .and_then(|(_, source)| source.get("nonce"))
            .and_then(Value::as_u64)
            .ok_or_else(|| ProcessError::History(format!("no blocks indexed for shard {shard}")))
    }
}

// Query builders are pure so the wire shape stays testable without a
// running index.

fn transactions_by_address_query(address: &str) -> Value {
    json!({
        "size": PAGE_SIZE,
        "sort": [{"timestamp": {"order": "desc"}}],
        "query": {
            "bool": {
                "should": [
                    {"term": {"sender": address}},
                    {"term": {"receiver": address}}
                ]
            }
        }
    })
}

fn block_by_nonce_query(shard: u32, nonce: u64) -> Value {
    json!({
        "query": {
            "bool": {
                "must": [
                    {"match": {"shardId": shard}},
                    {"match": {"nonce": nonce}}
                ]
            }
        }
    })
}

fn latest_block_query(shard: u32) -> Value {
    json!({
        "size": 1,
        "sort": [{"nonce": {"order": "desc"}}],
        "query": {"match": {"shardId": shard}}
    })
}

fn hits(value: &Value) -> Option<&Vec<Value>> {
    value.get("hits")?.get("hits")?.as_array()
}

fn first_hit(value: &Value) -> Option<(&str, &Value)> {
    let hit = hits(value)?.first()?;
    Some((hit.get("_id")?.as_str()?, hit.get("_source")?))
}

fn parse_transaction_hits(value: &Value) -> Vec<DatabaseTransaction> {
    let Some(hits) = hits(value) else {
        return Vec::new();
    };

    hits.iter()
        .filter_map(|hit| {
            let source = hit.get("_source")?;
            let mut tx: DatabaseTransaction = serde_json::from_value(source.clone()).ok()?;
            // the index keys documents by hash; re-attach it
            tx.hash = hit.get("_id")?.as_str()?.to_string();
            Some(tx)
        })
        .collect()
}
