use std::sync::Arc;

use serde_json::Value;

use crate::base::{decode_payload, expect_ok, try_observers, CoreProcessor};
use crate::errors::ProcessError;

const NETWORK_STATUS_PATH: &str = "/network/status";
const NETWORK_CONFIG_PATH: &str = "/network/config";

/// Passthrough for network-level metrics the observers expose. The payloads
/// are forwarded as raw JSON; the gateway adds routing, not interpretation.
pub struct NetworkProcessor {
    proc: Arc<dyn CoreProcessor>,
}

impl NetworkProcessor {
    pub fn new(proc: Arc<dyn CoreProcessor>) -> Self {
        Self { proc }
    }

    /// Status metrics of one shard.
    pub async fn network_status(&self, shard: u32) -> Result<Value, ProcessError> {
        if !self.proc.shard_ids().contains(&shard) {
            return Err(ProcessError::InvalidShardId(shard));
        }
        let observers = self.proc.observers(shard)?;
        try_observers(&observers, |obs| async move {
            let (code, value) = self.proc.call_get(&obs.address, NETWORK_STATUS_PATH).await?;
            expect_ok(code, &obs.address)?;
            decode_payload::<Value>(value)
        })
        .await
    }

    /// Chain-wide configuration; identical on every shard, so any answering
    /// observer will do.
    pub async fn network_config(&self) -> Result<Value, ProcessError> {
        let observers = self.proc.observers_one_per_shard();
        try_observers(&observers, |obs| async move {
            let (code, value) = self.proc.call_get(&obs.address, NETWORK_CONFIG_PATH).await?;
            expect_ok(code, &obs.address)?;
            decode_payload::<Value>(value)
        })
        .await
    }
}
