//! Broker connection lifecycle.
//!
//! [`ConnectionManager::connect`] blocks until a broker client exists,
//! retrying forever with a fixed delay. After that the manager only bounds
//! each publish with a timeout; reconnecting mid-run is left to the
//! underlying client.

use std::future::Future;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// A connected broker client able to deliver a payload to a topic.
pub trait Broker: Send + Sync + 'static {
    /// Send one payload and resolve once the broker acknowledged it.
    fn send(&self, topic: &str, payload: Vec<u8>) -> impl Future<Output = Result<()>> + Send;

    /// Wait for messages still in flight, up to `timeout`.
    fn flush(&self, _timeout: Duration) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

/// Factory producing a [`Broker`] from a list of bootstrap addresses.
pub trait BrokerConnector {
    type Client: Broker;

    /// Attempt a single connection.
    fn connect(&self, brokers: &[String]) -> impl Future<Output = Result<Self::Client>> + Send;
}

/// Owns the broker client and applies the per-publish timeout.
#[derive(Debug)]
pub struct ConnectionManager<B: Broker> {
    client: B,
    flush_timeout: Duration,
}

impl<B: Broker> ConnectionManager<B> {
    /// Wrap an already connected client.
    pub fn new(client: B, flush_timeout: Duration) -> Self {
        Self {
            client,
            flush_timeout,
        }
    }

    /// Connect to the brokers, retrying indefinitely.
    ///
    /// Every failed attempt is logged and followed by `retry_delay`. Only
    /// returns once a client handle exists.
    pub async fn connect<C>(
        connector: &C,
        brokers: &[String],
        retry_delay: Duration,
        flush_timeout: Duration,
    ) -> Self
    where
        C: BrokerConnector<Client = B>,
    {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match connector.connect(brokers).await {
                Ok(client) => {
                    tracing::info!(brokers = ?brokers, attempt, "Connected to Kafka brokers");
                    return Self::new(client, flush_timeout);
                }
                Err(e) => {
                    tracing::warn!(
                        brokers = ?brokers,
                        attempt,
                        error = %e,
                        "Could not connect to Kafka - will try again in {:?}",
                        retry_delay
                    );
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    /// Get a reference to the broker client.
    pub fn client(&self) -> &B {
        &self.client
    }

    /// Get the per-publish timeout.
    pub fn flush_timeout(&self) -> Duration {
        self.flush_timeout
    }

    /// Publish a payload, waiting at most the flush timeout for the ack.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        match tokio::time::timeout(self.flush_timeout, self.client.send(topic, payload)).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout {
                topic: topic.to_string(),
                timeout_ms: self.flush_timeout.as_millis() as u64,
            }),
        }
    }
}
