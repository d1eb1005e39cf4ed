//! Device update publisher.

use std::sync::Arc;

use forwarder_common::{AlarmSeverity, LogData, encode_f142};

use crate::connection::{Broker, ConnectionManager};
use crate::error::{BridgeError, Result};

/// What happened to a single publish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The message was encoded and acknowledged by the broker.
    Sent,
    /// The value was not numeric, nothing was sent.
    Skipped,
}

/// Publisher for sending device updates to the broker.
///
/// Wraps a [`ConnectionManager`] and a fixed topic, encoding every update as
/// an f142 record. Errors are returned to the caller, which logs them and
/// carries on with the next update.
pub struct Publisher<B: Broker> {
    connection: Arc<ConnectionManager<B>>,
    topic: String,
}

impl<B: Broker> Clone for Publisher<B> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            topic: self.topic.clone(),
        }
    }
}

impl<B: Broker> std::fmt::Debug for Publisher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl<B: Broker> Publisher<B> {
    /// Create a new publisher.
    pub fn new(connection: Arc<ConnectionManager<B>>, topic: impl Into<String>) -> Self {
        Self {
            connection,
            topic: topic.into(),
        }
    }

    /// Get the output topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish one device update.
    ///
    /// `value` is `None` when the device's reading is not numeric; the call
    /// is then a no-op returning [`PublishOutcome::Skipped`].
    pub async fn publish(
        &self,
        device: &str,
        value: Option<f64>,
        timestamp_ns: i64,
        severity: AlarmSeverity,
    ) -> Result<PublishOutcome> {
        let Some(value) = value else {
            return Ok(PublishOutcome::Skipped);
        };

        let record = LogData::new(device, value, timestamp_ns, severity);
        let payload = encode_f142(&record).map_err(|e| BridgeError::Encode {
            device: device.to_string(),
            message: e.to_string(),
        })?;

        self.connection.publish(&self.topic, payload).await?;

        tracing::trace!(device, value, %severity, "Published device update");

        Ok(PublishOutcome::Sent)
    }
}

/// A device reading waiting to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpdate {
    pub device: String,
    pub value: Option<f64>,
    pub timestamp_ns: i64,
    pub severity: AlarmSeverity,
}
