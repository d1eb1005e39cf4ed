//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use forwarder_common::{LoggingConfig, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::connection::{Broker, BrokerConnector, ConnectionManager};
use crate::error::{BridgeError, Result};
use crate::kafka::{KafkaClient, KafkaConnector};
use crate::publisher::Publisher;

/// Bridge runner that manages the lifecycle of a forwarding bridge.
///
/// Handles:
/// - Logging initialization
/// - Kafka connection (blocking, retried until it succeeds)
/// - Task spawning and management
/// - Shutdown signalling and graceful stop on Ctrl+C
///
/// A runner only exists once the broker connection is up, so workers
/// spawned on it never run against a missing broker.
///
/// # Example
///
/// ```ignore
/// use forwarder_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = MyBridgeConfig::from_args(&args)?;
///
///     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
///
///     let publisher = runner.publisher();
///     let shutdown = runner.shutdown_signal();
///     runner.spawn(async move {
///         // Worker logic here
///     });
///
///     runner.run().await
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig, B: Broker = KafkaClient> {
    /// Bridge name for logging.
    name: String,
    /// The loaded configuration.
    config: C,
    /// Broker connection shared by all publishers.
    connection: Arc<ConnectionManager<B>>,
    /// Publisher for device updates.
    publisher: Publisher<B>,
    /// Shutdown flag observed by workers.
    shutdown_tx: watch::Sender<bool>,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a Kafka bridge runner with CLI args for log level override.
    ///
    /// This will:
    /// 1. Initialize logging based on config (with optional CLI override)
    /// 2. Connect to Kafka, retrying until a connection succeeds
    /// 3. Create the publisher
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();

        // Initialize logging with optional CLI override
        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..config.logging().clone()
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(
            bridge = %name,
            version = env!("CARGO_PKG_VERSION"),
            "Starting bridge"
        );

        let connector = KafkaConnector::new(config.kafka());
        Ok(Self::connect(name, config, &connector).await)
    }
}

impl<C: BridgeConfig, B: Broker> BridgeRunner<C, B> {
    /// Connect through `connector`, retrying until it succeeds, and build
    /// the runner around the resulting client.
    pub async fn connect<K>(name: impl Into<String>, config: C, connector: &K) -> Self
    where
        K: BrokerConnector<Client = B>,
    {
        let kafka = config.kafka();
        let connection = Arc::new(
            ConnectionManager::connect(
                connector,
                &kafka.brokers,
                Duration::from_secs(kafka.retry_delay_secs),
                Duration::from_millis(kafka.flush_timeout_ms),
            )
            .await,
        );

        let publisher = Publisher::new(connection.clone(), kafka.topic.clone());
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            name: name.into(),
            config,
            connection,
            publisher,
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher<B> {
        self.publisher.clone()
    }

    /// Subscribe to the shutdown flag.
    ///
    /// The flag flips to `true` once Ctrl+C was received; workers may check
    /// it to exit instead of restarting after an error.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Run the bridge until Ctrl+C is received.
    ///
    /// This will:
    /// 1. Wait for Ctrl+C signal
    /// 2. Raise the shutdown flag and give workers a moment to notice
    /// 3. Abort all spawned tasks
    /// 4. Flush messages still queued in the producer
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            bridge = %self.name,
            topic = %self.publisher.topic(),
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        // Wait for shutdown signal
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        self.shutdown_tx.send_replace(true);

        // Wait briefly for tasks to clean up
        tokio::time::sleep(Duration::from_millis(100)).await;

        for task in &self.tasks {
            task.abort();
        }

        if let Err(e) = self
            .connection
            .client()
            .flush(self.connection.flush_timeout())
            .await
        {
            tracing::warn!(error = %e, "Error flushing producer");
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}
