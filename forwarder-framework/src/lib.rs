//! Forwarder Bridge Framework
//!
//! Common abstractions for building bridges that forward device updates to Kafka.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading, CLI overrides and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`ConnectionManager`] for the blocking connect-with-retry and bounded publish
//! - [`Publisher`] for encoding device updates as f142 and sending them
//! - [`BridgeArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use forwarder_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[derive(Parser)]
//! struct Cli {
//!     #[command(flatten)]
//!     bridge: BridgeArgs,
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = Cli::parse();
//!     let config = MyBridgeConfig::from_args(&cli.bridge)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&cli.bridge)).await?;
//!
//!     // Spawn protocol-specific workers
//!     runner.spawn(my_worker(runner.publisher()));
//!
//!     // Run until Ctrl+C
//!     Ok(runner.run().await?)
//! }
//! ```

mod args;
mod config;
mod connection;
mod error;
mod kafka;
mod publisher;
mod runner;

pub use args::BridgeArgs;
pub use config::{BridgeConfig, validate_kafka};
pub use connection::{Broker, BrokerConnector, ConnectionManager};
pub use error::{BridgeError, Result};
pub use kafka::{KafkaClient, KafkaConnector};
pub use publisher::{DeviceUpdate, PublishOutcome, Publisher};
pub use runner::BridgeRunner;

// Re-export commonly used types from forwarder-common
pub use forwarder_common::{AlarmSeverity, KafkaConfig, LogFormat, LoggingConfig};
