//! Forwarder Common Library
//!
//! This crate provides shared types and utilities for the cache-to-Kafka forwarder:
//!
//! - [`serialization`] - f142 `LogData` flatbuffer encoding (`LogData`, `AlarmSeverity`)
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`telemetry`] - Timestamp helpers
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod serialization;
pub mod telemetry;

// Re-export commonly used types at the crate root
pub use config::{KafkaConfig, LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use serialization::{AlarmSeverity, AlarmStatus, LogData, encode_f142};
pub use telemetry::{current_timestamp_nanos, seconds_to_nanos};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
