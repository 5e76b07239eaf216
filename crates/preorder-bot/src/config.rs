//! Application configuration.
//!
//! Read once at startup from TOML. Secrets can be left out of the file and
//! supplied through the environment:
//!
//! | variable                   | overrides            |
//! |----------------------------|----------------------|
//! | `PREORDER_FEED_TOKEN`      | `feed.token`         |
//! | `PREORDER_BROKER_USERNAME` | `broker.username`    |
//! | `PREORDER_BROKER_PASSWORD` | `broker.password`    |
//! | `PREORDER_BROKER_ACCOUNT`  | `broker.account_id`  |
//! | `PREORDER_STORE_PATH`      | `store.path`         |

use crate::error::{AppError, AppResult};
use preorder_executor::{Credentials, EvaluatorConfig, KeepAliveConfig, PaperConfig};
use preorder_feed::AggregatorConfig;
use preorder_ws::ConnectionConfig;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Market data feed configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// WebSocket endpoint.
    pub ws_url: String,
    /// API token, sent as the `token` query parameter.
    pub token: String,
    /// REST quote endpoint used once at startup. Empty disables.
    pub quote_url: String,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    /// Reconnect after this long without a message (0 = never).
    pub idle_timeout_ms: u64,
    /// Capacity of the ingest to aggregator channel.
    pub channel_capacity: usize,
    /// How long ingest waits on a full channel before dropping.
    pub enqueue_timeout_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://ws.finnhub.io".to_string(),
            token: String::new(),
            quote_url: "https://finnhub.io/api/v1/quote".to_string(),
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60_000,
            idle_timeout_ms: 120_000,
            channel_capacity: 1000,
            enqueue_timeout_ms: 100,
        }
    }
}

impl FeedConfig {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.ws_url.clone(),
            token: (!self.token.is_empty()).then(|| self.token.clone()),
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_base_delay_ms: self.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.reconnect_max_delay_ms,
            idle_timeout_ms: self.idle_timeout_ms,
        }
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

/// Price aggregation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Aggregation window (ms).
    pub interval_ms: u64,
    /// Per-read wait while draining (ms).
    pub read_timeout_ms: u64,
    /// Contributions read per window (0 = channel capacity).
    pub max_drain: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            read_timeout_ms: 50,
            max_drain: 0,
        }
    }
}

/// Brokerage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    #[default]
    Paper,
}

/// Brokerage session configuration.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub backend: BrokerBackend,
    pub username: String,
    pub password: String,
    pub account_id: String,
    /// Keep-alive refresh period (s).
    pub refresh_interval_secs: u64,
    /// Full session replacement period (s).
    pub recreate_interval_secs: u64,
    /// Upper bound for each broker call (s).
    pub call_timeout_secs: u64,
    pub paper: PaperConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::Paper,
            username: String::new(),
            password: String::new(),
            account_id: String::new(),
            refresh_interval_secs: 60,
            recreate_interval_secs: 600,
            call_timeout_secs: 30,
            paper: PaperConfig::default(),
        }
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("backend", &self.backend)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .field("recreate_interval_secs", &self.recreate_interval_secs)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field("paper", &self.paper)
            .finish()
    }
}

impl BrokerConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password, &self.account_id)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn keepalive_config(&self) -> KeepAliveConfig {
        KeepAliveConfig {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            recreate_interval: Duration::from_secs(self.recreate_interval_secs),
            call_timeout: self.call_timeout(),
        }
    }

    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            call_timeout: self.call_timeout(),
        }
    }
}

/// Preorder store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding the preorders.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/preorders.json".to_string(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Prometheus `/metrics` port (0 = disabled).
    pub metrics_port: u16,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub aggregation: AggregationConfig,
    pub broker: BrokerConfig,
    pub store: StoreConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load from a specific file, apply environment overrides and validate.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;

        let mut config = Self::from_toml(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without overrides or validation.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Replace secrets and paths with values from `lookup` where present.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let targets: [(&str, &mut String); 5] = [
            ("PREORDER_FEED_TOKEN", &mut self.feed.token),
            ("PREORDER_BROKER_USERNAME", &mut self.broker.username),
            ("PREORDER_BROKER_PASSWORD", &mut self.broker.password),
            ("PREORDER_BROKER_ACCOUNT", &mut self.broker.account_id),
            ("PREORDER_STORE_PATH", &mut self.store.path),
        ];
        for (key, target) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        }
    }

    /// Reject configurations the agent cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        let mut problems = Vec::new();

        if self.feed.ws_url.is_empty() {
            problems.push("feed.ws_url is empty");
        }
        if self.feed.channel_capacity == 0 {
            problems.push("feed.channel_capacity must be > 0");
        }
        if self.aggregation.interval_ms == 0 {
            problems.push("aggregation.interval_ms must be > 0");
        }
        if self.broker.refresh_interval_secs == 0 {
            problems.push("broker.refresh_interval_secs must be > 0");
        }
        if self.broker.recreate_interval_secs == 0 {
            problems.push("broker.recreate_interval_secs must be > 0");
        }
        if self.broker.call_timeout_secs == 0 {
            problems.push("broker.call_timeout_secs must be > 0");
        }
        if !self.broker.credentials().is_complete() {
            problems.push("broker username, password and account_id are required");
        }
        if self.store.path.is_empty() {
            problems.push("store.path is empty");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(problems.join("; ")))
        }
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        let max_drain = match self.aggregation.max_drain {
            0 => self.feed.channel_capacity,
            n => n,
        };
        AggregatorConfig {
            interval: Duration::from_millis(self.aggregation.interval_ms),
            read_timeout: Duration::from_millis(self.aggregation.read_timeout_ms),
            max_drain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[feed]
ws_url = "wss://feed.example.com"
token = "file-token"
quote_url = ""

[aggregation]
interval_ms = 2000

[broker]
username = "trader"
password = "secret"
account_id = "ACC-1"

[broker.paper]
initial_cash = "5000"
confirmation_ttl_secs = 30

[broker.paper.holdings]
"1147582" = 10

[store]
path = "/tmp/preorders.json"
"#;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.broker.refresh_interval_secs, 60);
        assert_eq!(config.broker.recreate_interval_secs, 600);
        assert_eq!(config.aggregation.interval_ms, 5000);
        assert_eq!(config.feed.enqueue_timeout_ms, 100);
        assert_eq!(config.telemetry.metrics_port, 0);
    }

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.feed.ws_url, "wss://feed.example.com");
        assert_eq!(config.aggregation.interval_ms, 2000);
        // unspecified fields keep their defaults
        assert_eq!(config.aggregation.read_timeout_ms, 50);
        assert_eq!(config.broker.paper.holdings.get("1147582"), Some(&10));
        assert_eq!(config.broker.paper.confirmation_ttl_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_replace_secrets() {
        let mut config = AppConfig::from_toml(SAMPLE).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("PREORDER_FEED_TOKEN", "env-token"),
            ("PREORDER_BROKER_PASSWORD", "env-secret"),
            ("PREORDER_STORE_PATH", ""),
        ]);
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.feed.token, "env-token");
        assert_eq!(config.broker.password, "env-secret");
        assert_eq!(config.broker.username, "trader");
        // empty values do not override
        assert_eq!(config.store.path, "/tmp/preorders.json");
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("username, password and account_id"));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = AppConfig::from_toml(SAMPLE).unwrap();
        config.broker.refresh_interval_secs = 0;
        config.feed.channel_capacity = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("refresh_interval_secs"));
        assert!(err.contains("channel_capacity"));
    }

    #[test]
    fn test_max_drain_defaults_to_capacity() {
        let mut config = AppConfig::default();
        config.feed.channel_capacity = 250;
        assert_eq!(config.aggregator_config().max_drain, 250);
        config.aggregation.max_drain = 10;
        assert_eq!(config.aggregator_config().max_drain, 10);
    }

    #[test]
    fn test_broker_debug_redacts_password() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        let printed = format!("{:?}", config.broker);
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn test_connection_config_token() {
        let mut config = AppConfig::default();
        assert!(config.feed.connection_config().token.is_none());
        config.feed.token = "t".to_string();
        assert_eq!(config.feed.connection_config().token.as_deref(), Some("t"));
    }

    #[test]
    fn test_shipped_default_parses() {
        let mut config =
            AppConfig::from_toml(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config.broker.backend, BrokerBackend::Paper);
        assert_eq!(config.telemetry.metrics_port, 9090);
        // secrets come from the environment
        assert!(config.validate().is_err());
        config.apply_overrides(|k| Some(format!("{k}-value")));
        assert!(config.validate().is_ok());
    }
}
