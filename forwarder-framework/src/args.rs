//! CLI argument parsing for bridges.

use std::path::PathBuf;

use clap::Args;

/// Common CLI arguments for all bridges.
///
/// Flatten into a binary's own parser with `#[command(flatten)]`. Values
/// given here override the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct BridgeArgs {
    /// Path to an optional JSON5 configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The Kafka broker addresses.
    #[arg(short, long, num_args = 1..)]
    pub brokers: Vec<String>,

    /// The topic to write device data to.
    #[arg(short, long)]
    pub topic: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}
