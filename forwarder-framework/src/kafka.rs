//! Kafka broker client built on `rdkafka`.

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use crate::KafkaConfig;
use crate::connection::{Broker, BrokerConnector};
use crate::error::{BridgeError, Result};

/// How long a connection attempt waits for cluster metadata.
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected Kafka producer.
#[derive(Clone)]
pub struct KafkaClient {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl std::fmt::Debug for KafkaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaClient")
            .field("queue_timeout", &self.queue_timeout)
            .finish_non_exhaustive()
    }
}

impl Broker for KafkaClient {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let record = FutureRecord::<(), [u8]>::to(topic).payload(&payload);

        self.producer
            .send(record, Timeout::After(self.queue_timeout))
            .await
            .map(|_| ())
            .map_err(|(e, _message)| BridgeError::publish(topic, e.to_string()))
    }

    async fn flush(&self, timeout: Duration) -> Result<()> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| BridgeError::connection(e.to_string()))?
            .map_err(BridgeError::from)
    }
}

/// Creates [`KafkaClient`]s and checks the cluster is reachable.
#[derive(Debug, Clone)]
pub struct KafkaConnector {
    flush_timeout: Duration,
    max_request_size: usize,
}

impl KafkaConnector {
    /// Create a connector from the Kafka configuration section.
    pub fn new(config: &KafkaConfig) -> Self {
        Self {
            flush_timeout: Duration::from_millis(config.flush_timeout_ms),
            max_request_size: config.max_request_size,
        }
    }

    fn client_config(&self, brokers: &[String]) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", brokers.join(","))
            .set("message.timeout.ms", self.flush_timeout.as_millis().to_string())
            .set("message.max.bytes", self.max_request_size.to_string());
        config
    }
}

impl BrokerConnector for KafkaConnector {
    type Client = KafkaClient;

    async fn connect(&self, brokers: &[String]) -> Result<KafkaClient> {
        let producer: FutureProducer = self.client_config(brokers).create()?;

        // Creating the producer never touches the network; ask for metadata
        // so an unreachable cluster fails here rather than on first publish.
        let metadata_client = producer.clone();
        tokio::task::spawn_blocking(move || {
            metadata_client
                .client()
                .fetch_metadata(None, METADATA_TIMEOUT)
                .map(|_| ())
        })
        .await
        .map_err(|e| BridgeError::connection(e.to_string()))??;

        Ok(KafkaClient {
            producer,
            queue_timeout: self.flush_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_from_kafka_section() {
        let connector = KafkaConnector::new(&KafkaConfig {
            brokers: vec!["a:9092".to_string(), "b:9092".to_string()],
            topic: "devices".to_string(),
            flush_timeout_ms: 3000,
            max_request_size: 1024,
            ..Default::default()
        });

        let config = connector.client_config(&["a:9092".to_string(), "b:9092".to_string()]);

        assert_eq!(config.get("bootstrap.servers"), Some("a:9092,b:9092"));
        assert_eq!(config.get("message.timeout.ms"), Some("3000"));
        assert_eq!(config.get("message.max.bytes"), Some("1024"));
    }
}
