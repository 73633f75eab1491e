//! Layered runtime configuration (§6 "Environment configuration").
//!
//! Mirrors the teacher's `durability::database::config::DatabaseConfig`:
//! a plain struct with typed defaults, a builder for tests/embedding, and a
//! `validate()` pass — except here the defaults are overridden from
//! environment variables rather than constructor arguments, since this is
//! the layer a deployed process actually boots from.

use std::env;
use std::time::Duration;

/// Everything a running OMS process reads from its environment at startup.
///
/// Each field documents the environment variable it's sourced from and its
/// typed default when that variable is unset. `OmsConfig::default()` never
/// touches the environment; use [`OmsConfig::from_env`] to load it for real.
#[derive(Debug, Clone)]
pub struct OmsConfig {
    /// `STORE_ENDPOINT` — where the durable commit log lives.
    pub store_endpoint: String,
    /// `STORE_USER`, unset for an unauthenticated local store.
    pub store_user: Option<String>,
    /// `STORE_KEY`, unset for an unauthenticated local store.
    pub store_key: Option<String>,
    /// `STORE_DB` — logical database/namespace name.
    pub store_db: String,
    /// `CACHE_SIZE` — max entries held in the in-process LRU tier.
    pub cache_size: usize,
    /// `CACHE_TTL_SECONDS` — age after which a cached entry is stale.
    pub cache_ttl: Duration,
    /// `BUS_URL`, unset when the message-bus target is disabled.
    pub bus_url: Option<String>,
    /// `BUS_STREAM_NAME`, unset when the message-bus target is disabled.
    pub bus_stream_name: Option<String>,
    /// `CLOUD_BUS_NAME`, unset when the cloud-bus target is disabled.
    pub cloud_bus_name: Option<String>,
    /// `CLOUD_BUS_REGION`, unset when the cloud-bus target is disabled.
    pub cloud_bus_region: Option<String>,
    /// `OUTBOX_BATCH_SIZE` (default 100).
    pub outbox_batch_size: usize,
    /// `OUTBOX_POLL_INTERVAL_MS` (default 500).
    pub outbox_poll_interval: Duration,
    /// `VALIDATION_TIMEOUT_SECONDS` (default 30).
    pub validation_timeout: Duration,
    /// `MULTI_PLATFORM_ROUTING` — fan out to every healthy target instead of
    /// the first, per §4.7's routing strategy.
    pub multi_platform_routing: bool,
    /// `MTLS_ENABLED` — whether outbound publish targets require mTLS.
    pub mtls_enabled: bool,
}

impl Default for OmsConfig {
    fn default() -> Self {
        OmsConfig {
            store_endpoint: "local://oms-data".to_string(),
            store_user: None,
            store_key: None,
            store_db: "oms".to_string(),
            cache_size: 1_000,
            cache_ttl: Duration::from_secs(3_600),
            bus_url: None,
            bus_stream_name: None,
            cloud_bus_name: None,
            cloud_bus_region: None,
            outbox_batch_size: 100,
            outbox_poll_interval: Duration::from_millis(500),
            validation_timeout: Duration::from_secs(30),
            multi_platform_routing: false,
            mtls_enabled: false,
        }
    }
}

impl OmsConfig {
    /// Load configuration, overriding typed defaults with whatever of the
    /// §6-enumerated environment variables are set. Unset variables keep
    /// their default; malformed ones (a non-numeric `CACHE_SIZE`, etc.) are
    /// rejected rather than silently falling back.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = OmsConfig::default();
        let config = OmsConfig {
            store_endpoint: env_string("STORE_ENDPOINT", defaults.store_endpoint),
            store_user: env_opt_string("STORE_USER"),
            store_key: env_opt_string("STORE_KEY"),
            store_db: env_string("STORE_DB", defaults.store_db),
            cache_size: env_parsed("CACHE_SIZE", defaults.cache_size)?,
            cache_ttl: Duration::from_secs(env_parsed("CACHE_TTL_SECONDS", defaults.cache_ttl.as_secs())?),
            bus_url: env_opt_string("BUS_URL"),
            bus_stream_name: env_opt_string("BUS_STREAM_NAME"),
            cloud_bus_name: env_opt_string("CLOUD_BUS_NAME"),
            cloud_bus_region: env_opt_string("CLOUD_BUS_REGION"),
            outbox_batch_size: env_parsed("OUTBOX_BATCH_SIZE", defaults.outbox_batch_size)?,
            outbox_poll_interval: Duration::from_millis(env_parsed(
                "OUTBOX_POLL_INTERVAL_MS",
                defaults.outbox_poll_interval.as_millis() as u64,
            )?),
            validation_timeout: Duration::from_secs(env_parsed(
                "VALIDATION_TIMEOUT_SECONDS",
                defaults.validation_timeout.as_secs(),
            )?),
            multi_platform_routing: env_bool("MULTI_PLATFORM_ROUTING", defaults.multi_platform_routing)?,
            mtls_enabled: env_bool("MTLS_ENABLED", defaults.mtls_enabled)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would silently misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_size == 0 {
            return Err(ConfigError::OutOfRange("CACHE_SIZE must be at least 1".to_string()));
        }
        if self.outbox_batch_size == 0 {
            return Err(ConfigError::OutOfRange("OUTBOX_BATCH_SIZE must be at least 1".to_string()));
        }
        if self.mtls_enabled && self.bus_url.is_none() && self.cloud_bus_name.is_none() {
            return Err(ConfigError::OutOfRange(
                "MTLS_ENABLED requires at least one of BUS_URL or CLOUD_BUS_NAME".to_string(),
            ));
        }
        Ok(())
    }

    /// Override the store endpoint (tests, or a CLI `--data-dir` flag taking
    /// precedence over the environment).
    pub fn with_store_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.store_endpoint = endpoint.into();
        self
    }
}

/// Errors from loading or validating an [`OmsConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set but couldn't be parsed as its
    /// expected type.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue {
        /// The environment variable name.
        var: &'static str,
        /// The value it held.
        value: String,
    },
    /// A value parsed fine but fails a cross-field or range invariant.
    #[error("{0}")]
    OutOfRange(String),
}

fn env_string(var: &'static str, default: String) -> String {
    env::var(var).unwrap_or(default)
}

fn env_opt_string(var: &'static str) -> Option<String> {
    env::var(var).ok()
}

fn env_parsed<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(default),
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

fn env_bool(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(default),
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue { var, value }),
        },
    }
}
