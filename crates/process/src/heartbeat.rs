use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, warn};

use shardgate_types::{HeartbeatPayload, HeartbeatResponse, PubKeyHeartbeat};

use crate::base::{decode_payload, expect_ok, try_observers, CoreProcessor};
use crate::errors::ProcessError;

const HEARTBEAT_PATH: &str = "/node/heartbeatstatus";

struct CacheEntry {
    fetched_at: Instant,
    response: HeartbeatResponse,
}

/// Serves the fleet-wide heartbeat list from a time-boxed cache.
///
/// Heartbeat data is expensive to assemble (one round trip per shard) and
/// tolerates staleness, so requests read the cache and only a miss or an
/// expired entry triggers a refresh.
pub struct HeartbeatProcessor {
    proc: Arc<dyn CoreProcessor>,
    cache: RwLock<Option<CacheEntry>>,
    validity: Duration,
}

impl HeartbeatProcessor {
    pub fn new(proc: Arc<dyn CoreProcessor>, validity: Duration) -> Result<Self, ProcessError> {
        if validity.is_zero() {
            return Err(ProcessError::InvalidCacheValidityDuration);
        }
        Ok(Self {
            proc,
            cache: RwLock::new(None),
            validity,
        })
    }

    pub async fn heartbeat_data(&self) -> Result<HeartbeatResponse, ProcessError> {
        if let Some(entry) = self.cache.read().as_ref() {
            if entry.fetched_at.elapsed() < self.validity {
                return Ok(entry.response.clone());
            }
        }

        match self.refresh().await {
            Ok(response) => Ok(response),
            Err(err) => {
                // an expired entry still beats no answer at all
                if let Some(entry) = self.cache.read().as_ref() {
                    warn!(error = %err, "heartbeat refresh failed, serving stale cache");
                    return Ok(entry.response.clone());
                }
                Err(err)
            }
        }
    }

    /// Fetch a fresh heartbeat view and store it in the cache.
    pub async fn refresh(&self) -> Result<HeartbeatResponse, ProcessError> {
        let response = self.fetch_live().await?;
        *self.cache.write() = Some(CacheEntry {
            fetched_at: Instant::now(),
            response: response.clone(),
        });
        Ok(response)
    }

    async fn fetch_live(&self) -> Result<HeartbeatResponse, ProcessError> {
        let mut by_key: BTreeMap<String, PubKeyHeartbeat> = BTreeMap::new();

        for shard in self.proc.shard_ids() {
            let observers = match self.proc.observers(shard) {
                Ok(observers) => observers,
                Err(err) => {
                    debug!(shard, error = %err, "no observers for heartbeat query");
                    continue;
                }
            };

            let outcome = try_observers(&observers, |obs| async move {
                let (code, value) = self.proc.call_get(&obs.address, HEARTBEAT_PATH).await?;
                expect_ok(code, &obs.address)?;
                decode_payload::<HeartbeatPayload>(value)
            })
            .await;

            match outcome {
                Ok(payload) => {
                    // each shard vouches only for the messages it received
                    for heartbeat in payload.heartbeats {
                        if heartbeat.received_shard_id != shard {
                            continue;
                        }
                        by_key
                            .entry(heartbeat.public_key.clone())
                            .or_insert(heartbeat);
                    }
                }
                Err(err) => warn!(shard, error = %err, "heartbeat query failed for shard"),
            }
        }

        if by_key.is_empty() {
            return Err(ProcessError::HeartbeatNotAvailable);
        }

        // BTreeMap iteration yields the list sorted by public key
        Ok(HeartbeatResponse {
            heartbeats: by_key.into_values().collect(),
        })
    }

    /// Background refresh loop at the cache validity period.
    pub fn spawn_cache_update(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.validity);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = self.refresh().await {
                    warn!(error = %err, "periodic heartbeat refresh failed");
                }
            }
        })
    }
}
