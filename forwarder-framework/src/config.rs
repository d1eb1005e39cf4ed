//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::BridgeArgs;
use crate::error::{BridgeError, Result};
use crate::{KafkaConfig, LoggingConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, CLI overrides, validation, and access to common
/// config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use forwarder_framework::{BridgeConfig, KafkaConfig, LoggingConfig};
///
/// #[derive(Debug, Default, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub kafka: KafkaConfig,
///     pub logging: LoggingConfig,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn kafka(&self) -> &KafkaConfig {
///         &self.kafka
///     }
///
///     fn kafka_mut(&mut self) -> &mut KafkaConfig {
///         &mut self.kafka
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + Default + DeserializeOwned {
    /// Get the Kafka configuration.
    fn kafka(&self) -> &KafkaConfig;

    /// Get mutable access to the Kafka configuration.
    fn kafka_mut(&mut self) -> &mut KafkaConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Validate the configuration.
    ///
    /// The default checks the Kafka section. Override to add custom
    /// validation, calling [`validate_kafka`] to keep the base checks.
    fn validate(&self) -> Result<()> {
        validate_kafka(self.kafka())
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Does not validate: CLI overrides may still
    /// supply required fields.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;

        Ok(config)
    }

    /// Build the configuration from CLI arguments.
    ///
    /// Loads `--config` if given (defaults otherwise), applies the CLI
    /// broker/topic overrides, then validates.
    fn from_args(args: &BridgeArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        let kafka = config.kafka_mut();
        if !args.brokers.is_empty() {
            kafka.brokers = args.brokers.clone();
        }
        if let Some(topic) = &args.topic {
            kafka.topic = topic.clone();
        }

        config.validate()?;

        Ok(config)
    }
}

/// Validate the Kafka section shared by every bridge.
pub fn validate_kafka(kafka: &KafkaConfig) -> Result<()> {
    if kafka.brokers.is_empty() {
        return Err(BridgeError::validation(
            "At least one Kafka broker is required (--brokers)",
        ));
    }
    if kafka.brokers.iter().any(|b| b.trim().is_empty()) {
        return Err(BridgeError::validation("Kafka broker address must not be empty"));
    }
    if kafka.topic.trim().is_empty() {
        return Err(BridgeError::validation("A Kafka topic is required (--topic)"));
    }
    if kafka.flush_timeout_ms == 0 {
        return Err(BridgeError::validation("flush_timeout_ms must be positive"));
    }
    Ok(())
}
