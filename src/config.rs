use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::blockchain::SelfTransferPolicy;
use crate::error::ConfigError;
use crate::retry::RetryConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub processing: ProcessingConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

/// RPC client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum number of attempts per RPC call
    pub max_retries: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Idle time between successful poll cycles in milliseconds
    pub poll_interval_ms: u64,
    /// First idle delay after a failed cycle in milliseconds
    pub retry_delay_ms: u64,
    /// Upper bound for the failure backoff in milliseconds
    pub max_retry_delay_ms: u64,
    /// Upper bound for a single height or block fetch, retries included
    pub fetch_timeout_seconds: u64,
    /// Resume after this block instead of starting at the chain tip
    pub start_block: Option<u64>,
    /// How to record a transfer whose sender and recipient are the same
    pub self_transfer_policy: SelfTransferPolicy,
    /// Addresses subscribed at startup
    pub addresses: Vec<String>,
}

/// HTTP query API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Enable HTTP API server
    pub enabled: bool,
    /// Server host/bind address
    pub host: String,
    /// Server port
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://cloudflare-eth.com".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_ms: 500,
            max_retry_delay_ms: 5_000,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            retry_delay_ms: 1_000,
            max_retry_delay_ms: 60_000,
            fetch_timeout_seconds: 120,
            start_block: None,
            self_transfer_policy: SelfTransferPolicy::default(),
            addresses: Vec::new(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl RpcConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retries,
            initial_delay_ms: self.retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            ..RetryConfig::for_rpc()
        }
    }
}

impl ProcessingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

impl AppConfig {
    /// Load configuration from file and environment variables.
    /// Environment variables take precedence over file values.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the TOML file named by `CONFIG_FILE`
    /// (default `config.toml`). A missing file yields the defaults.
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // RPC configuration
        if let Ok(endpoint) = env::var("ETH_RPC_URL") {
            self.rpc.endpoint = endpoint;
        }
        if let Ok(timeout) = env::var("RPC_TIMEOUT_SECONDS") {
            self.rpc.timeout_seconds = parse_env("RPC_TIMEOUT_SECONDS", timeout)?;
        }
        if let Ok(retries) = env::var("RPC_MAX_RETRIES") {
            self.rpc.max_retries = parse_env("RPC_MAX_RETRIES", retries)?;
        }

        // Processing configuration
        if let Ok(interval) = env::var("BLOCK_POLL_INTERVAL_MS") {
            self.processing.poll_interval_ms = parse_env("BLOCK_POLL_INTERVAL_MS", interval)?;
        }
        if let Ok(start_block) = env::var("START_BLOCK") {
            self.processing.start_block = Some(parse_env("START_BLOCK", start_block)?);
        }
        if let Ok(addresses) = env::var("SUBSCRIBE_ADDRESSES") {
            self.processing.addresses = addresses
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect();
        }

        // API configuration
        if let Ok(enabled) = env::var("API_ENABLED") {
            self.api.enabled = parse_env("API_ENABLED", enabled)?;
        }
        if let Ok(host) = env::var("API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = env::var("API_PORT") {
            self.api.port = parse_env("API_PORT", port)?;
        }

        // Logging configuration
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc.endpoint.starts_with("http://") && !self.rpc.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.rpc.endpoint.clone()));
        }

        if self.rpc.timeout_seconds == 0 || self.rpc.timeout_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "rpc.timeout_seconds".to_string(),
                value: self.rpc.timeout_seconds.to_string(),
            });
        }

        if self.rpc.max_retries == 0 || self.rpc.max_retries > 20 {
            return Err(ConfigError::InvalidValue {
                key: "rpc.max_retries".to_string(),
                value: self.rpc.max_retries.to_string(),
            });
        }

        if self.processing.poll_interval_ms == 0 || self.processing.poll_interval_ms > 300_000 {
            return Err(ConfigError::InvalidValue {
                key: "processing.poll_interval_ms".to_string(),
                value: self.processing.poll_interval_ms.to_string(),
            });
        }

        // failure delay must be non-zero and within its cap
        if self.processing.retry_delay_ms == 0
            || self.processing.retry_delay_ms > self.processing.max_retry_delay_ms
        {
            return Err(ConfigError::InvalidValue {
                key: "processing.retry_delay_ms".to_string(),
                value: self.processing.retry_delay_ms.to_string(),
            });
        }

        if self.processing.fetch_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "processing.fetch_timeout_seconds".to_string(),
                value: self.processing.fetch_timeout_seconds.to_string(),
            });
        }

        if let Some(address) = self.processing.addresses.iter().find(|a| a.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "processing.addresses".to_string(),
                value: address.clone(),
            });
        }

        if self.api.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.port".to_string(),
                value: self.api.port.to_string(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}
