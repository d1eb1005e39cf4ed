//! Turns cache change notifications into broker messages.

use std::sync::Arc;

use forwarder_common::{AlarmSeverity, seconds_to_nanos};
use forwarder_framework::{Broker, DeviceUpdate, PublishOutcome, Publisher};

use crate::cache::CacheValue;
use crate::source::{CacheUpdate, Parameter, SourceEvent, UpdateStream};
use crate::status::severity_of;
use crate::store::{SeverityChange, StateStore};

/// Handles value and status notifications for watched devices.
///
/// Value changes are always forwarded with [`AlarmSeverity::NoChange`].
/// Status changes are forwarded only when the mapped severity differs from
/// the last one sent. Snapshots queued by reconciliation are sent as they
/// are. The dispatcher is the only sender, so messages for a device leave
/// in queue order. Failures are logged per message.
pub struct ChangeDispatcher<B: Broker> {
    store: Arc<StateStore>,
    publisher: Publisher<B>,
}

impl<B: Broker> ChangeDispatcher<B> {
    pub fn new(store: Arc<StateStore>, publisher: Publisher<B>) -> Self {
        Self { store, publisher }
    }

    /// Consume events until every sender is gone.
    pub async fn run(self, mut events: UpdateStream) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        tracing::debug!("Update stream closed, dispatcher stopping");
    }

    pub async fn handle(&self, event: SourceEvent) {
        match event {
            SourceEvent::Update(update) => self.on_update(update).await,
            SourceEvent::Snapshot(snapshot) => self.on_snapshot(snapshot).await,
        }
    }

    async fn on_update(&self, update: CacheUpdate) {
        match update.parameter {
            Parameter::Value => {
                self.on_value(&update.device, &update.value, update.timestamp)
                    .await
            }
            Parameter::Status => {
                self.on_status(&update.device, &update.value, update.timestamp)
                    .await
            }
        }
    }

    /// Send the state a device had when it was subscribed.
    pub async fn on_snapshot(&self, snapshot: DeviceUpdate) {
        self.send(
            &snapshot.device,
            snapshot.value,
            snapshot.timestamp_ns,
            snapshot.severity,
        )
        .await;
    }

    /// A device's value changed.
    pub async fn on_value(&self, device: &str, value: &CacheValue, timestamp: f64) {
        let Some(value) = value.as_f64() else {
            tracing::trace!(device, value = %value, "Ignoring non-numeric value");
            return;
        };

        if !self.store.record_value(device, value).await {
            tracing::debug!(device, "Dropping value update for unwatched device");
            return;
        }

        self.send(
            device,
            Some(value),
            seconds_to_nanos(timestamp),
            AlarmSeverity::NoChange,
        )
        .await;
    }

    /// A device's status changed.
    pub async fn on_status(&self, device: &str, status: &CacheValue, timestamp: f64) {
        let severity = severity_of(status);

        match self.store.record_severity(device, severity).await {
            SeverityChange::Changed { value } => {
                self.send(device, Some(value), seconds_to_nanos(timestamp), severity)
                    .await;
            }
            SeverityChange::Unchanged => {}
            SeverityChange::NoValue => {
                tracing::debug!(device, %severity, "No numeric value to send with new severity");
            }
            SeverityChange::Unknown => {
                tracing::debug!(device, "Dropping status update for unwatched device");
            }
        }
    }

    async fn send(
        &self,
        device: &str,
        value: Option<f64>,
        timestamp_ns: i64,
        severity: AlarmSeverity,
    ) {
        let result = self
            .publisher
            .publish(device, value, timestamp_ns, severity)
            .await;

        match result {
            Ok(PublishOutcome::Sent) => {
                tracing::debug!(device, ?value, %severity, "Forwarded update");
            }
            Ok(PublishOutcome::Skipped) => {
                tracing::trace!(device, "Nothing numeric to forward");
            }
            Err(e) => {
                tracing::warn!(device, error = %e, "Could not forward update");
            }
        }
    }
}
