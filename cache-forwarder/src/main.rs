//! NICOS cache to Kafka forwarder.
//!
//! Watches the devices in a NICOS cache and forwards their values and alarm
//! severities to a Kafka topic as f142 messages.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use forwarder_framework::{BridgeArgs, BridgeConfig, BridgeRunner};

use cache_forwarder::{CacheClient, ForwarderConfig};

/// Forwards NICOS cache device values to Kafka.
#[derive(Parser, Debug)]
#[command(name = "cache-forwarder")]
#[command(about = "Forwards NICOS cache device values to Kafka as f142 LogData")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    bridge: BridgeArgs,

    /// NICOS cache address (host:port), default localhost:14869.
    #[arg(short = 'c', long = "cache")]
    cache: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        ForwarderConfig::from_args(&cli.bridge).context("Invalid forwarder configuration")?;
    if let Some(address) = cli.cache {
        config.cache.address = address;
        config
            .validate()
            .context("Invalid forwarder configuration")?;
    }

    // Blocks until a Kafka broker answers
    let mut runner = BridgeRunner::new_with_args("cache-forwarder", config, Some(&cli.bridge))
        .await
        .context("Failed to start forwarder")?;

    let cache = &runner.config().cache;
    tracing::info!(
        cache = %cache.address,
        prefix = %cache.prefix,
        "Connecting to NICOS cache"
    );
    let source = Arc::new(CacheClient::new(cache));

    cache_forwarder::start(&mut runner, source).context("Failed to start forwarder")?;

    runner.run().await.context("Forwarder stopped with an error")
}
