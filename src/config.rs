//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//!
//! The override names for the brokers match the ones the stadium
//! deployment already sets (`SIMULATOR_*` upstream, `MQTT_*` downstream).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::link::{BackoffPolicy, Credentials, Endpoint};
use crate::store::PublishPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub downstream: DownstreamConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Broker the congestion events come from
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_upstream_port")]
    pub port: u16,

    #[serde(default = "default_upstream_topic")]
    pub topic: String,

    #[serde(default = "default_upstream_client_id")]
    pub client_id: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_upstream_port() -> u16 {
    1883
}

fn default_upstream_topic() -> String {
    "stadium/events/congestion".to_string()
}

fn default_upstream_client_id() -> String {
    "congestion-relay-in".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_upstream_port(),
            topic: default_upstream_topic(),
            client_id: default_upstream_client_id(),
            keep_alive_secs: default_keep_alive(),
            username: None,
            password: None,
        }
    }
}

impl UpstreamConfig {
    pub fn endpoint(&self, relay: &RelayConfig) -> Endpoint {
        endpoint(
            &self.host,
            self.port,
            self.keep_alive_secs,
            credentials(&self.username, &self.password),
            relay,
        )
    }
}

/// Broker the relay republishes state changes to
#[derive(Debug, Clone, Deserialize)]
pub struct DownstreamConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_downstream_port")]
    pub port: u16,

    #[serde(default = "default_downstream_topic")]
    pub topic: String,

    #[serde(default = "default_downstream_client_id")]
    pub client_id: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_downstream_port() -> u16 {
    1885
}

fn default_downstream_topic() -> String {
    "stadium/services/congestion".to_string()
}

fn default_downstream_client_id() -> String {
    "congestion-relay-out".to_string()
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_downstream_port(),
            topic: default_downstream_topic(),
            client_id: default_downstream_client_id(),
            keep_alive_secs: default_keep_alive(),
            username: None,
            password: None,
        }
    }
}

impl DownstreamConfig {
    pub fn endpoint(&self, relay: &RelayConfig) -> Endpoint {
        endpoint(
            &self.host,
            self.port,
            self.keep_alive_secs,
            credentials(&self.username, &self.password),
            relay,
        )
    }
}

fn credentials(username: &Option<String>, password: &Option<String>) -> Option<Credentials> {
    username.as_ref().map(|user| Credentials {
        username: user.clone(),
        password: password.clone().unwrap_or_default(),
    })
}

fn endpoint(
    host: &str,
    port: u16,
    keep_alive_secs: u64,
    credentials: Option<Credentials>,
    relay: &RelayConfig,
) -> Endpoint {
    Endpoint {
        host: host.to_string(),
        port,
        keep_alive: Duration::from_secs(keep_alive_secs),
        connect_timeout: Duration::from_secs(relay.connect_timeout_secs),
        credentials,
    }
}

/// Relay behaviour shared by both links
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub publish_policy: PublishPolicy,

    #[serde(default)]
    pub strict_bounds: bool,

    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,

    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_ms: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

fn default_reconnect_base_delay() -> u64 {
    1000
}

fn default_reconnect_max_delay() -> u64 {
    60_000
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_outbound_queue_capacity() -> usize {
    1024
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            publish_policy: PublishPolicy::default(),
            strict_bounds: false,
            reconnect_base_delay_ms: default_reconnect_base_delay(),
            reconnect_max_delay_ms: default_reconnect_max_delay(),
            connect_timeout_secs: default_connect_timeout(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}

impl RelayConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.reconnect_base_delay_ms),
            Duration::from_millis(self.reconnect_max_delay_ms),
        )
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, for development
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Invalid log format: {}. Use pretty or json", other)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("congestion-relay").join("config.toml")),
            Some(PathBuf::from("/etc/congestion-relay/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "relay.outbound_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.relay.reconnect_base_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "relay.reconnect_base_delay_ms must be at least 1".to_string(),
            ));
        }
        if self.relay.reconnect_base_delay_ms > self.relay.reconnect_max_delay_ms {
            return Err(ConfigError::Invalid(
                "relay.reconnect_base_delay_ms exceeds relay.reconnect_max_delay_ms".to_string(),
            ));
        }
        if self.upstream.keep_alive_secs == 0 || self.downstream.keep_alive_secs == 0 {
            return Err(ConfigError::Invalid(
                "keep_alive_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Upstream (simulator) broker
        if let Some(host) = lookup("SIMULATOR_BROKER") {
            self.upstream.host = host;
        }
        if let Some(port) = parse_override(&lookup, "SIMULATOR_PORT") {
            self.upstream.port = port;
        }
        if let Some(topic) = lookup("SIMULATOR_TOPIC") {
            self.upstream.topic = topic;
        }

        // Downstream (client-facing) broker
        if let Some(host) = lookup("MQTT_BROKER") {
            self.downstream.host = host;
        }
        if let Some(port) = parse_override(&lookup, "MQTT_PORT") {
            self.downstream.port = port;
        }
        if let Some(topic) = lookup("CLIENT_TOPIC") {
            self.downstream.topic = topic;
        }

        // API overrides
        if let Some(host) = lookup("CONGESTION_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = parse_override(&lookup, "CONGESTION_API_PORT") {
            self.api.port = port;
        }

        // Relay overrides
        if let Some(policy) = parse_override(&lookup, "CONGESTION_PUBLISH_POLICY") {
            self.relay.publish_policy = policy;
        }

        // Logging overrides
        if let Some(level) = lookup("CONGESTION_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = parse_override(&lookup, "CONGESTION_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Parse an override, ignoring unparseable values with a warning
fn parse_override<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Congestion Relay Configuration
#
# Environment variables override these settings:
# - SIMULATOR_BROKER, SIMULATOR_PORT, SIMULATOR_TOPIC   (upstream)
# - MQTT_BROKER, MQTT_PORT, CLIENT_TOPIC                (downstream)
# - CONGESTION_API_HOST
# - CONGESTION_API_PORT
# - CONGESTION_PUBLISH_POLICY
# - CONGESTION_LOG_LEVEL
# - CONGESTION_LOG_FORMAT

[upstream]
# Broker publishing raw congestion events
host = "localhost"
port = 1883
topic = "stadium/events/congestion"

# Prefix for the MQTT client id (a random suffix is appended)
client_id = "congestion-relay-in"
keep_alive_secs = 60

# Leave unset to connect anonymously
# username = ""
# password = ""

[downstream]
# Broker clients subscribe to for state changes
host = "localhost"
port = 1885
topic = "stadium/services/congestion"
client_id = "congestion-relay-out"
keep_alive_secs = 60

[relay]
# on_change: republish only new cells and changed levels
# always: republish every accepted update
publish_policy = "on_change"

# Drop readings outside [0.0, 1.0] instead of accepting and counting them
strict_bounds = false

# Reconnect backoff (doubles per failed attempt up to the max)
reconnect_base_delay_ms = 1000
reconnect_max_delay_ms = 60000

# How long to wait for a broker to acknowledge a connection
connect_timeout_secs = 10

# State changes buffered for the downstream broker
outbound_queue_capacity = 1024

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
