//! Error types for the forwarder framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Broker connection error.
    #[error("Broker connection error: {0}")]
    BrokerConnection(String),

    /// Encoding error.
    #[error("Failed to encode message for {device}: {message}")]
    Encode { device: String, message: String },

    /// Publishing error.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// The broker did not acknowledge a message in time.
    #[error("Timed out after {timeout_ms} ms waiting for {topic} to acknowledge")]
    Timeout { topic: String, timeout_ms: u64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a broker connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::BrokerConnection(msg.into())
    }

    /// Create a publish error.
    pub fn publish(topic: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: msg.into(),
        }
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<rdkafka::error::KafkaError> for BridgeError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::BrokerConnection(err.to_string())
    }
}
