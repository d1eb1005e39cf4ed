use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Common Kafka producer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Bootstrap broker addresses (e.g. "localhost:9092").
    #[serde(default)]
    pub brokers: Vec<String>,

    /// Topic every device update is written to.
    #[serde(default)]
    pub topic: String,

    /// Delay between connection attempts at startup, in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Maximum time to wait for a single message to be acknowledged.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,

    /// Maximum size of a produced message in bytes.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_flush_timeout_ms() -> u64 {
    3000
}

fn default_max_request_size() -> usize {
    16_000_000
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            topic: String::new(),
            retry_delay_secs: default_retry_delay_secs(),
            flush_timeout_ms: default_flush_timeout_ms(),
            max_request_size: default_max_request_size(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
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

/// Load a configuration file in JSON5 format.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    json5::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}
