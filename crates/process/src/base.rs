use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use shardgate_types::{ApiResponse, NodeStatus, Observer};

use crate::errors::{DispatchError, ProcessError};

const USER_AGENT: &str = concat!("shardgate/", env!("CARGO_PKG_VERSION"));
const NODE_STATUS_PATH: &str = "/node/status";

/// The seam between routing logic and the observer fleet.
///
/// Everything above this trait (transaction pipeline, pool aggregation,
/// heartbeat, network passthrough) is written against it, which is also how
/// the tests substitute observers without a network.
#[async_trait]
pub trait CoreProcessor: Send + Sync {
    /// Deterministic owning shard for a raw address.
    fn compute_shard_id(&self, address_bytes: &[u8]) -> Result<u32, ProcessError>;

    fn shard_ids(&self) -> Vec<u32>;

    /// Observers of one shard, in registration order.
    fn observers(&self, shard_id: u32) -> Result<Vec<Observer>, ProcessError>;

    fn all_observers(&self) -> Vec<Observer>;

    /// The first registered observer of every shard, in shard-id order.
    fn observers_one_per_shard(&self) -> Vec<Observer>;

    /// One GET round trip. Returns the HTTP status and the decoded JSON body
    /// (null when the body is empty or not JSON); only transport-level
    /// failures are errors here, status handling is the caller's business.
    async fn call_get(&self, observer: &str, path: &str) -> Result<(u16, Value), DispatchError>;

    /// One POST round trip with a JSON body. Same contract as [`Self::call_get`].
    async fn call_post(
        &self,
        observer: &str,
        path: &str,
        body: &Value,
    ) -> Result<(u16, Value), DispatchError>;
}

#[derive(Default)]
struct RegistryState {
    shard_count: u32,
    observers: BTreeMap<u32, Vec<Observer>>,
}

/// Observer registry plus the HTTP dispatch layer.
///
/// The registry is read-mostly: a configuration reload builds a fresh state
/// and swaps it under the write lock, so readers never see a partial set.
pub struct BaseProcessor {
    client: reqwest::Client,
    state: RwLock<RegistryState>,
}

impl BaseProcessor {
    pub fn new(request_timeout: Duration) -> Result<Self, ProcessError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            state: RwLock::new(RegistryState::default()),
        })
    }

    /// Replace the observer set atomically. The shard count is derived from
    /// the highest shard id seen, so shard ids are expected to be dense.
    pub fn apply_config(&self, observers: Vec<Observer>) -> Result<(), ProcessError> {
        if observers.is_empty() {
            return Err(ProcessError::EmptyObserverList);
        }

        let mut grouped: BTreeMap<u32, Vec<Observer>> = BTreeMap::new();
        let mut max_shard = 0u32;
        for observer in observers {
            max_shard = max_shard.max(observer.shard_id);
            grouped.entry(observer.shard_id).or_default().push(observer);
        }

        let mut state = self.state.write();
        *state = RegistryState {
            shard_count: max_shard + 1,
            observers: grouped,
        };

        Ok(())
    }

    /// Probe `/node/status` across the fleet and return the first observer
    /// that reports itself running.
    pub async fn first_available_observer(&self) -> Result<Observer, ProcessError> {
        first_running(self).await
    }

    async fn round_trip(
        &self,
        url: String,
        request: reqwest::RequestBuilder,
    ) -> Result<(u16, Value), DispatchError> {
        let response = request
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| DispatchError::Transport {
                url: url.clone(),
                message: err.to_string(),
            })?;

        let code = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| DispatchError::Transport {
                url,
                message: err.to_string(),
            })?;

        // Bodies are opaque here: non-JSON or empty responses decode to null
        // and are judged by the caller against the status code.
        let value = serde_json::from_str(&body).unwrap_or(Value::Null);
        Ok((code, value))
    }
}

#[async_trait]
impl CoreProcessor for BaseProcessor {
    fn compute_shard_id(&self, address_bytes: &[u8]) -> Result<u32, ProcessError> {
        let shard_count = self.state.read().shard_count;
        if shard_count == 0 {
            return Err(ProcessError::EmptyObserverList);
        }
        match address_bytes.last() {
            Some(byte) => Ok(u32::from(*byte) % shard_count),
            None => Err(ProcessError::ComputeShardFailed),
        }
    }

    fn shard_ids(&self) -> Vec<u32> {
        self.state.read().observers.keys().copied().collect()
    }

    fn observers(&self, shard_id: u32) -> Result<Vec<Observer>, ProcessError> {
        self.state
            .read()
            .observers
            .get(&shard_id)
            .cloned()
            .ok_or(ProcessError::MissingObserver(shard_id))
    }

    fn all_observers(&self) -> Vec<Observer> {
        self.state
            .read()
            .observers
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    fn observers_one_per_shard(&self) -> Vec<Observer> {
        self.state
            .read()
            .observers
            .values()
            .filter_map(|list| list.first().cloned())
            .collect()
    }

    async fn call_get(&self, observer: &str, path: &str) -> Result<(u16, Value), DispatchError> {
        let url = join_url(observer, path);
        self.round_trip(url.clone(), self.client.get(&url)).await
    }

    async fn call_post(
        &self,
        observer: &str,
        path: &str,
        body: &Value,
    ) -> Result<(u16, Value), DispatchError> {
        let url = join_url(observer, path);
        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        self.round_trip(url, request).await
    }
}

/// The shared failover policy: try observers in registration order, return
/// the first success, keep the last error and surface it with the list of
/// addresses that were tried.
pub async fn try_observers<T, F, Fut>(
    observers: &[Observer],
    mut op: F,
) -> Result<T, ProcessError>
where
    F: FnMut(Observer) -> Fut,
    Fut: Future<Output = Result<T, DispatchError>>,
{
    let mut last_err = None;
    for observer in observers {
        match op(observer.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!(observer = %observer.address, error = %err, "observer call failed, trying next");
                last_err = Some(err);
            }
        }
    }

    Err(exhausted(observers, last_err))
}

/// The exhaustion tail of the failover policy: every observer of the list
/// was tried, the last error names the reason. An empty list has no error
/// to carry.
pub(crate) fn exhausted(observers: &[Observer], last_err: Option<DispatchError>) -> ProcessError {
    match last_err {
        Some(source) => ProcessError::SendingRequest {
            observers: observers.iter().map(|o| o.address.clone()).collect(),
            source,
        },
        None => ProcessError::EmptyObserverList,
    }
}

/// Walk the whole fleet probing `/node/status` until one observer reports
/// itself running. A reachable observer that answers not-running is skipped
/// and remembered as such.
async fn first_running(proc: &dyn CoreProcessor) -> Result<Observer, ProcessError> {
    let observers = proc.all_observers();

    let mut last_err = None;
    for observer in &observers {
        match proc.call_get(&observer.address, NODE_STATUS_PATH).await {
            Ok((code, body)) if (200..300).contains(&code) => {
                match decode_payload::<NodeStatus>(body) {
                    Ok(status) if status.running => return Ok(observer.clone()),
                    Ok(_) => {
                        last_err = Some(DispatchError::NotRunning {
                            url: observer.address.clone(),
                        });
                    }
                    Err(err) => last_err = Some(err),
                }
            }
            Ok((code, _)) => {
                last_err = Some(DispatchError::Http {
                    code,
                    url: observer.address.clone(),
                });
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(exhausted(&observers, last_err))
}

/// Unwrap the observer response envelope into its typed payload.
pub fn decode_payload<T: DeserializeOwned>(value: Value) -> Result<T, DispatchError> {
    let envelope: ApiResponse<T> = serde_json::from_value(value)?;
    Ok(envelope.data)
}

/// The `error` field of an observer envelope, empty when absent.
pub fn response_error(value: &Value) -> String {
    value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Map a non-2xx status to a dispatch error for the given URL.
pub fn expect_ok(code: u16, url: &str) -> Result<(), DispatchError> {
    if (200..300).contains(&code) {
        Ok(())
    } else {
        Err(DispatchError::Http {
            code,
            url: url.to_string(),
        })
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor_with(observers: Vec<Observer>) -> BaseProcessor {
        let proc = BaseProcessor::new(Duration::from_secs(1)).unwrap();
        proc.apply_config(observers).unwrap();
        proc
    }

    #[test]
    fn apply_config_rejects_empty_list() {
        let proc = BaseProcessor::new(Duration::from_secs(1)).unwrap();
        assert!(matches!(
            proc.apply_config(Vec::new()),
            Err(ProcessError::EmptyObserverList)
        ));
    }

    #[test]
    fn shard_count_follows_highest_shard_id() {
        let proc = processor_with(vec![
            Observer::new("http://a", 0),
            Observer::new("http://b", 2),
        ]);

        // last byte 5 % 3 shards
        assert_eq!(proc.compute_shard_id(&[0x00, 0x05]).unwrap(), 2);
        assert_eq!(proc.shard_ids(), vec![0, 2]);
    }

    #[test]
    fn compute_shard_rejects_empty_address() {
        let proc = processor_with(vec![Observer::new("http://a", 0)]);
        assert!(matches!(
            proc.compute_shard_id(&[]),
            Err(ProcessError::ComputeShardFailed)
        ));
    }

    #[test]
    fn observers_keep_registration_order() {
        let proc = processor_with(vec![
            Observer::new("http://first", 1),
            Observer::new("http://second", 1),
            Observer::new("http://other-shard", 0),
        ]);

        let shard1 = proc.observers(1).unwrap();
        assert_eq!(shard1[0].address, "http://first");
        assert_eq!(shard1[1].address, "http://second");

        assert!(matches!(
            proc.observers(3),
            Err(ProcessError::MissingObserver(3))
        ));
    }

    #[test]
    fn one_per_shard_takes_first_of_each() {
        let proc = processor_with(vec![
            Observer::new("http://s0-a", 0),
            Observer::new("http://s0-b", 0),
            Observer::new("http://s1-a", 1),
        ]);

        let picked = proc.observers_one_per_shard();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].address, "http://s0-a");
        assert_eq!(picked[1].address, "http://s1-a");
    }

    #[test]
    fn reload_replaces_previous_set() {
        let proc = processor_with(vec![Observer::new("http://old", 0)]);
        proc.apply_config(vec![Observer::new("http://new", 1)]).unwrap();

        assert!(proc.observers(0).is_err());
        assert_eq!(proc.observers(1).unwrap()[0].address, "http://new");
    }

    #[tokio::test]
    async fn try_observers_returns_first_success() {
        let observers = vec![
            Observer::new("http://bad", 0),
            Observer::new("http://good", 0),
        ];

        let result = try_observers(&observers, |obs| async move {
            if obs.address.contains("bad") {
                Err(DispatchError::Transport {
                    url: obs.address,
                    message: "connection refused".into(),
                })
            } else {
                Ok(obs.address)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "http://good");
    }

    #[tokio::test]
    async fn try_observers_reports_last_error_and_all_addresses() {
        let observers = vec![
            Observer::new("http://one", 0),
            Observer::new("http://two", 0),
        ];

        let err = try_observers::<(), _, _>(&observers, |obs| async move {
            Err(DispatchError::Transport {
                url: obs.address.clone(),
                message: format!("{} is down", obs.address),
            })
        })
        .await
        .unwrap_err();

        match err {
            ProcessError::SendingRequest { observers, source } => {
                assert_eq!(observers, vec!["http://one", "http://two"]);
                assert!(source.to_string().contains("http://two is down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decode_payload_unwraps_envelope() {
        let value = serde_json::json!({"data": {"running": true}, "error": "", "code": "successful"});
        let status: NodeStatus = decode_payload(value).unwrap();
        assert!(status.running);
    }

    #[test]
    fn join_url_handles_trailing_slash() {
        assert_eq!(
            join_url("http://observer:8080/", "/node/status"),
            "http://observer:8080/node/status"
        );
    }

    struct StatusStub {
        observers: Vec<Observer>,
        on_get: Box<dyn Fn(&str) -> Result<(u16, Value), DispatchError> + Send + Sync>,
    }

    impl StatusStub {
        fn new(
            addresses: &[&str],
            on_get: impl Fn(&str) -> Result<(u16, Value), DispatchError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                observers: addresses
                    .iter()
                    .map(|address| Observer::new(*address, 0))
                    .collect(),
                on_get: Box::new(on_get),
            }
        }
    }

    #[async_trait]
    impl CoreProcessor for StatusStub {
        fn compute_shard_id(&self, _address_bytes: &[u8]) -> Result<u32, ProcessError> {
            Ok(0)
        }

        fn shard_ids(&self) -> Vec<u32> {
            vec![0]
        }

        fn observers(&self, _shard_id: u32) -> Result<Vec<Observer>, ProcessError> {
            Ok(self.observers.clone())
        }

        fn all_observers(&self) -> Vec<Observer> {
            self.observers.clone()
        }

        fn observers_one_per_shard(&self) -> Vec<Observer> {
            self.observers.first().cloned().into_iter().collect()
        }

        async fn call_get(
            &self,
            observer: &str,
            path: &str,
        ) -> Result<(u16, Value), DispatchError> {
            assert_eq!(path, NODE_STATUS_PATH);
            (self.on_get)(observer)
        }

        async fn call_post(
            &self,
            _observer: &str,
            _path: &str,
            _body: &Value,
        ) -> Result<(u16, Value), DispatchError> {
            panic!("status probes never POST");
        }
    }

    fn status_body(running: bool) -> Result<(u16, Value), DispatchError> {
        Ok((
            200,
            serde_json::json!({"data": {"running": running}, "error": "", "code": "successful"}),
        ))
    }

    #[tokio::test]
    async fn first_running_skips_not_running_observers() {
        let stub = StatusStub::new(&["http://idle", "http://live", "http://spare"], |observer| {
            match observer {
                "http://idle" => status_body(false),
                "http://live" => status_body(true),
                other => panic!("observer {other} must not be probed after a hit"),
            }
        });

        let picked = first_running(&stub).await.unwrap();
        assert_eq!(picked.address, "http://live");
    }

    #[tokio::test]
    async fn first_running_names_an_idle_fleet() {
        let stub = StatusStub::new(&["http://a", "http://b"], |_| status_body(false));

        let err = first_running(&stub).await.unwrap_err();
        match err {
            ProcessError::SendingRequest { observers, source } => {
                assert_eq!(observers, vec!["http://a", "http://b"]);
                assert!(matches!(source, DispatchError::NotRunning { .. }));
                assert!(source.to_string().contains("not running"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn first_running_surfaces_transport_failures() {
        let stub = StatusStub::new(&["http://down"], |observer| {
            Err(DispatchError::Transport {
                url: observer.to_string(),
                message: "connection refused".to_string(),
            })
        });

        assert!(matches!(
            first_running(&stub).await,
            Err(ProcessError::SendingRequest { .. })
        ));
    }

    #[tokio::test]
    async fn first_running_with_no_observers_is_an_error() {
        let stub = StatusStub::new(&[], |_| panic!("nothing to probe"));

        assert!(matches!(
            first_running(&stub).await,
            Err(ProcessError::EmptyObserverList)
        ));
    }
}
