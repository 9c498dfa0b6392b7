use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use shardgate_process::EventMarkers;
use shardgate_types::Observer;

fn default_request_timeout() -> u64 {
    10
}

fn default_heartbeat_cache() -> u64 {
    10
}

/// Gateway configuration, loaded from a TOML file.
///
/// ```toml
/// request_timeout_secs = 10
/// allow_pool_queries = true
/// heartbeat_cache_secs = 10
///
/// [[observers]]
/// address = "http://127.0.0.1:8080"
/// shard_id = 0
///
/// [history]
/// url = "http://127.0.0.1:9200"
/// ```
#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub allow_pool_queries: bool,
    #[serde(default = "default_heartbeat_cache")]
    pub heartbeat_cache_secs: u64,
    pub observers: Vec<Observer>,
    #[serde(default)]
    pub history: Option<HistoryConfig>,
    #[serde(default)]
    pub markers: Option<MarkersConfig>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryConfig {
    pub url: String,
}

/// Overrides for the terminal event identifiers the classifier watches.
#[derive(Debug, Deserialize)]
pub struct MarkersConfig {
    pub completed: Vec<String>,
    pub errors: Vec<String>,
}

impl GatewayConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: GatewayConfig = toml::from_str(&text).context("parsing configuration")?;

        if config.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        if config.observers.is_empty() {
            anyhow::bail!("at least one observer must be configured");
        }
        Ok(config)
    }

    pub fn event_markers(&self) -> EventMarkers {
        match &self.markers {
            Some(markers) => EventMarkers {
                completed: markers.completed.clone(),
                errors: markers.errors.clone(),
            },
            None => EventMarkers::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
request_timeout_secs = 5
allow_pool_queries = true

[[observers]]
address = "http://127.0.0.1:8080"
shard_id = 0

[[observers]]
address = "http://127.0.0.1:8081"
shard_id = 1

[history]
url = "http://127.0.0.1:9200"

[markers]
completed = ["done"]
errors = ["boom"]
"#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_a_full_configuration() {
        let file = write_config(SAMPLE);
        let config = GatewayConfig::load(file.path()).unwrap();

        assert_eq!(config.request_timeout_secs, 5);
        assert!(config.allow_pool_queries);
        assert_eq!(config.heartbeat_cache_secs, 10);
        assert_eq!(config.observers.len(), 2);
        assert_eq!(config.observers[1].shard_id, 1);
        assert_eq!(config.history.unwrap().url, "http://127.0.0.1:9200");

        let markers = config.markers.unwrap();
        assert_eq!(markers.completed, vec!["done"]);
        assert_eq!(markers.errors, vec!["boom"]);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let file = write_config(
            "[[observers]]\naddress = \"http://127.0.0.1:8080\"\nshard_id = 0\n",
        );
        let config = GatewayConfig::load(file.path()).unwrap();

        assert_eq!(config.request_timeout_secs, 10);
        assert!(!config.allow_pool_queries);
        assert!(config.history.is_none());

        let markers = config.event_markers();
        assert_eq!(markers.completed, vec!["completedTxEvent"]);
    }

    #[test]
    fn rejects_empty_observer_list() {
        let file = write_config("request_timeout_secs = 5\nobservers = []\n");
        assert!(GatewayConfig::load(file.path()).is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let file = write_config(
            "request_timeout_secs = 0\n[[observers]]\naddress = \"http://a\"\nshard_id = 0\n",
        );
        assert!(GatewayConfig::load(file.path()).is_err());
    }
}
