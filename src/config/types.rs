//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Relay configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Control plane.
    #[serde(default)]
    pub api: ApiConfig,
    /// Prometheus endpoint.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Chat platform bridge.
    #[serde(default)]
    pub platform: PlatformConfig,
    /// Event intake API.
    #[serde(default)]
    pub writer: WriterConfig,
    /// Channel registry storage.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Replica identity and shard.
    #[serde(default)]
    pub replica: ReplicaConfig,
    /// Writer cache and retry tuning.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Reconciliation cadence.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Log filter.
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `CHANRELAY_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(v) = get("CHANRELAY_REPLICA_NAME") {
            self.replica.name = v;
        }
        if let Some(v) = get("CHANRELAY_DATABASE_PATH") {
            self.database.path = v;
        }
        if let Some(v) = get("CHANRELAY_PLATFORM_URL") {
            self.platform.url = v;
        }
        if let Some(v) = get("CHANRELAY_WRITER_URL") {
            self.writer.url = v;
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        super::validation::validate(self).map_err(|errors| {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            ConfigError::Invalid(joined)
        })
    }
}

/// Control-plane configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Upper bound on a single control-plane request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Prometheus endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// 0 disables the endpoint.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

/// Chat platform bridge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_platform_url")]
    pub url: String,
    #[serde(default = "default_platform_timeout_ms")]
    pub timeout_ms: u64,
    /// Long-poll duration for `getUpdates`.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            url: default_platform_url(),
            timeout_ms: default_platform_timeout_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

/// Event intake configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WriterConfig {
    #[serde(default = "default_writer_url")]
    pub url: String,
    #[serde(default = "default_writer_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            url: default_writer_url(),
            timeout_ms: default_writer_timeout_ms(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
    /// Channels without a delivery for this long are pruned. 0 disables.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            retention_hours: default_retention_hours(),
        }
    }
}

impl DatabaseConfig {
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_hours > 0).then(|| Duration::from_secs(self.retention_hours * 3600))
    }
}

/// Replica identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaConfig {
    /// Name ending in `-N`, where N is the replica index.
    #[serde(default = "default_replica_name")]
    pub name: String,
    /// Total number of replicas.
    #[serde(default = "default_replica_range")]
    pub range: u32,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            name: default_replica_name(),
            range: default_replica_range(),
        }
    }
}

impl ReplicaConfig {
    /// Index parsed from the segment after the last `-`.
    pub fn index(&self) -> Result<u16, ConfigError> {
        let (_, suffix) = self.name.rsplit_once('-').ok_or_else(|| {
            ConfigError::Invalid(format!("unable to parse the replica name: {}", self.name))
        })?;
        suffix.parse().map_err(|_| {
            ConfigError::Invalid(format!("replica name has no numeric index: {}", self.name))
        })
    }

    /// Shard label for registry filtering. Replica 0 sees every channel.
    pub fn label(&self) -> Result<Option<String>, ConfigError> {
        let index = self.index()?;
        Ok((index > 0).then(|| index.to_string()))
    }
}

/// Writer cache and retry tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_writer_cache_size")]
    pub writer_cache_size: usize,
    /// Idle time after which a cached writer is closed.
    #[serde(default = "default_writer_ttl_secs")]
    pub writer_ttl_secs: u64,
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,
    /// Budget for retrying one event.
    #[serde(default = "default_retry_max_elapsed_ms")]
    pub retry_max_elapsed_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            writer_cache_size: default_writer_cache_size(),
            writer_ttl_secs: default_writer_ttl_secs(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_elapsed_ms: default_retry_max_elapsed_ms(),
        }
    }
}

impl DeliveryConfig {
    pub fn writer_ttl(&self) -> Duration {
        Duration::from_secs(self.writer_ttl_secs)
    }
}

/// Reconciliation cadence.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_reconcile_interval_secs")]
    pub interval_secs: u64,
    /// Cap on joined chats fetched, and the registry page size.
    #[serde(default = "default_list_limit")]
    pub list_limit: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_interval_secs(),
            list_limit: default_list_limit(),
        }
    }
}

impl ReconcileConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}
