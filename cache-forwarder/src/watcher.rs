//! Device discovery and subscription management.
//!
//! The watcher polls the source for the device list. Whenever the list
//! differs from the watched set it rebuilds everything under the store lock:
//! all subscriptions are dropped, and every device is read, queued as a
//! snapshot for the dispatcher and subscribed again.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use forwarder_common::current_timestamp_nanos;
use forwarder_framework::DeviceUpdate;

use crate::cache::CacheValue;
use crate::filter::DeviceFilter;
use crate::source::{ObservationSource, Parameter, SourceError, SourceEvent, UpdateSink};
use crate::status::severity_of;
use crate::store::{EntityState, StateStore};

/// Default interval between device list polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default pause after a failed scan.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Keeps the set of subscriptions in line with the devices in the cache.
pub struct EntityWatcher<S: ObservationSource> {
    source: Arc<S>,
    store: Arc<StateStore>,
    sink: UpdateSink,
    filter: DeviceFilter,
    poll_interval: Duration,
    error_backoff: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<S: ObservationSource> EntityWatcher<S> {
    /// Create a watcher delivering snapshots and subscription updates to
    /// `sink`.
    pub fn new(
        source: Arc<S>,
        store: Arc<StateStore>,
        sink: UpdateSink,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            filter: DeviceFilter::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            shutdown,
        }
    }

    pub fn with_filter(mut self, filter: DeviceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Block until the source lists at least one device.
    pub async fn wait_for_entities(&self) -> BTreeSet<String> {
        let mut reported = false;
        loop {
            match self.scan().await {
                Ok(devices) if !devices.is_empty() => return devices,
                Ok(_) => {}
                Err(e) if !reported => {
                    tracing::warn!(error = %e, "Waiting for the cache to come up");
                    reported = true;
                }
                Err(e) => tracing::debug!(error = %e, "Cache still unavailable"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Poll forever, rebuilding subscriptions when the device list changes.
    ///
    /// Scan errors are logged and retried after the error backoff; once the
    /// shutdown flag is raised an error ends the loop instead.
    pub async fn run(self) {
        tracing::info!(interval = ?self.poll_interval, "Watching cache for devices");

        loop {
            match self.poll_once().await {
                Ok(_) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    tracing::error!(error = %e, "Device scan failed");
                    if *self.shutdown.borrow() {
                        tracing::info!("Shutdown requested, watcher stopping");
                        return;
                    }
                    tokio::time::sleep(self.error_backoff).await;
                }
            }
        }
    }

    /// Scan once and reconcile if the device list changed.
    ///
    /// Returns whether a rebuild happened.
    pub async fn poll_once(&self) -> Result<bool, SourceError> {
        let devices = self.scan().await?;
        if devices == self.store.watched().await {
            return Ok(false);
        }
        self.reconcile(devices).await?;
        Ok(true)
    }

    /// Replace every subscription with a fresh set for `devices`.
    ///
    /// Each device's snapshot is queued for the dispatcher before its
    /// subscriptions exist, so it goes out ahead of any later change. A
    /// device whose key cannot be read is skipped until the device list
    /// changes again. If the cache itself stops answering the pass ends
    /// early with the error and the watched set only holds the devices
    /// subscribed so far, so the next scan rebuilds.
    ///
    /// Returns the number of subscribed devices.
    pub async fn reconcile(&self, devices: BTreeSet<String>) -> Result<usize, SourceError> {
        let mut guard = self.store.lock().await;

        for handle in guard.teardown() {
            self.source.unsubscribe(&handle);
        }

        let mut subscribed = BTreeSet::new();
        for device in &devices {
            let (value, status) = match self.read_device(device).await {
                Ok(snapshot) => snapshot,
                Err(e) if e.is_connection() => {
                    tracing::warn!(
                        device = %device,
                        error = %e,
                        subscribed = subscribed.len(),
                        "Cache stopped answering during rebuild"
                    );
                    guard.set_watched(subscribed);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(device = %device, error = %e, "Could not read device, skipping");
                    continue;
                }
            };

            let state = EntityState {
                value: value.as_f64(),
                severity: severity_of(&status),
            };

            let snapshot = DeviceUpdate {
                device: device.clone(),
                value: state.value,
                timestamp_ns: current_timestamp_nanos(),
                severity: state.severity,
            };
            if self.sink.send(SourceEvent::Snapshot(snapshot)).is_err() {
                tracing::debug!(device = %device, "Dispatcher gone, snapshot dropped");
            }

            let subscriptions = vec![
                self.source
                    .subscribe(device, Parameter::Value, self.sink.clone()),
                self.source
                    .subscribe(device, Parameter::Status, self.sink.clone()),
            ];
            guard.insert(device.clone(), state, subscriptions);
            subscribed.insert(device.clone());
        }

        tracing::info!(
            devices = subscribed.len(),
            skipped = devices.len() - subscribed.len(),
            "Subscribed to devices"
        );
        guard.set_watched(devices);

        Ok(subscribed.len())
    }

    async fn scan(&self) -> Result<BTreeSet<String>, SourceError> {
        Ok(self.filter.apply(self.source.list_entities().await?))
    }

    async fn read_device(&self, device: &str) -> Result<(CacheValue, CacheValue), SourceError> {
        let value = self.source.read(device, Parameter::Value).await?;
        let status = self.source.read(device, Parameter::Status).await?;
        Ok((value, status))
    }
}
