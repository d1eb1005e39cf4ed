//! Configuration for the cache forwarder.

use serde::{Deserialize, Serialize};

use forwarder_framework::{
    BridgeConfig, BridgeError, KafkaConfig, LoggingConfig, Result, validate_kafka,
};

use crate::filter::{DeviceFilter, FilterConfig};

/// Complete forwarder configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwarderConfig {
    /// Kafka producer settings
    #[serde(default)]
    pub kafka: KafkaConfig,

    /// NICOS cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Device name filter
    #[serde(default)]
    pub filter: FilterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NICOS cache connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache server address as `host:port`
    #[serde(default = "default_address")]
    pub address: String,

    /// Key namespace holding the devices (default: "nicos")
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Interval between device list polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after a failed device scan in milliseconds
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Connect and request timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Delay before re-opening a lost subscription connection in milliseconds
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_address() -> String {
    "localhost:14869".to_string()
}

fn default_prefix() -> String {
    "nicos".to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_error_backoff_ms() -> u64 {
    1000
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            prefix: default_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl BridgeConfig for ForwarderConfig {
    fn kafka(&self) -> &KafkaConfig {
        &self.kafka
    }

    fn kafka_mut(&mut self) -> &mut KafkaConfig {
        &mut self.kafka
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> Result<()> {
        validate_kafka(&self.kafka)?;

        if self.cache.address.trim().is_empty() {
            return Err(BridgeError::validation("Cache address cannot be empty"));
        }
        if self.cache.prefix.trim_matches('/').is_empty() {
            return Err(BridgeError::validation("Cache prefix cannot be empty"));
        }
        if self.cache.poll_interval_ms == 0 {
            return Err(BridgeError::validation("poll_interval_ms must be positive"));
        }
        if self.cache.connect_timeout_ms == 0 {
            return Err(BridgeError::validation(
                "connect_timeout_ms must be positive",
            ));
        }

        DeviceFilter::new(&self.filter)
            .map_err(|e| BridgeError::validation(format!("Invalid filter pattern: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forwarder_framework::LogFormat;

    #[test]
    fn test_parse_full_config() {
        let config: ForwarderConfig = json5::from_str(
            r#"{
                kafka: { brokers: ["kafka1:9092", "kafka2:9092"], topic: "ymir_devices" },
                cache: { address: "cache.example:14869", poll_interval_ms: 250 },
                filter: { exclude: ["sim_*"] },
                logging: { level: "debug", format: "json" },
            }"#,
        )
        .unwrap();

        assert_eq!(config.kafka.brokers.len(), 2);
        assert_eq!(config.kafka.retry_delay_secs, 5);
        assert_eq!(config.cache.address, "cache.example:14869");
        assert_eq!(config.cache.prefix, "nicos");
        assert_eq!(config.cache.poll_interval_ms, 250);
        assert_eq!(config.filter.exclude, vec!["sim_*".to_string()]);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config: ForwarderConfig = json5::from_str("{}").unwrap();

        assert_eq!(config.cache.address, "localhost:14869");
        assert_eq!(config.cache.error_backoff_ms, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation() {
        let mut config = ForwarderConfig::default();
        assert!(config.validate().is_err());

        config.kafka.brokers = vec!["localhost:9092".to_string()];
        config.kafka.topic = "devices".to_string();
        assert!(config.validate().is_ok());

        config.cache.poll_interval_ms = 0;
        assert!(config.validate().is_err());
        config.cache.poll_interval_ms = 100;

        config.filter.include = vec!["[".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        use forwarder_framework::BridgeArgs;
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ kafka: {{ brokers: ["file:9092"], topic: "from_file" }}, cache: {{ prefix: "ymir" }} }}"#
        )
        .unwrap();

        let args = BridgeArgs {
            config: Some(file.path().to_path_buf()),
            topic: Some("from_cli".to_string()),
            ..BridgeArgs::default()
        };
        let config = ForwarderConfig::from_args(&args).unwrap();

        assert_eq!(config.kafka.brokers, vec!["file:9092".to_string()]);
        assert_eq!(config.kafka.topic, "from_cli");
        assert_eq!(config.cache.prefix, "ymir");
    }
}
