//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use flatbuffers::{ForwardsUOffset, Table};
use parking_lot::Mutex;
use tokio::sync::{Notify, watch};

use cache_forwarder::{
    CacheUpdate, CacheValue, ChangeDispatcher, DeviceFilter, EntityWatcher, ObservationSource,
    Parameter, SourceError, SourceEvent, StateStore, SubscriptionHandle, UpdateSink, UpdateStream,
    update_channel,
};
use forwarder_common::AlarmSeverity;
use forwarder_framework::{Broker, BridgeError, ConnectionManager, Publisher};

/// In-memory observation source.
#[derive(Default)]
pub struct MockSource {
    devices: Mutex<BTreeSet<String>>,
    values: Mutex<HashMap<(String, Parameter), CacheValue>>,
    unreadable: Mutex<HashSet<String>>,
    unreachable: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    scans: AtomicUsize,
    reads: AtomicUsize,
    subscriptions: Mutex<Vec<(SubscriptionHandle, UpdateSink)>>,
    next_id: AtomicU64,
}

impl MockSource {
    pub fn set_devices(&self, devices: &[&str]) {
        *self.devices.lock() = devices.iter().map(|d| d.to_string()).collect();
    }

    pub fn set(&self, device: &str, parameter: Parameter, value: CacheValue) {
        self.values
            .lock()
            .insert((device.to_string(), parameter), value);
    }

    /// Make point reads of `device` fail with a per-key error.
    pub fn make_unreadable(&self, device: &str) {
        self.unreadable.lock().insert(device.to_string());
    }

    /// Make point reads of `device` time out, as if the cache hung.
    pub fn make_unreachable(&self, device: &str) {
        self.unreachable.lock().insert(device.to_string());
    }

    /// Let `device` be read again.
    pub fn restore(&self, device: &str) {
        self.unreadable.lock().remove(device);
        self.unreachable.lock().remove(device);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Store a value and notify its subscribers.
    pub fn push(&self, device: &str, parameter: Parameter, value: CacheValue, timestamp: f64) {
        self.set(device, parameter, value.clone());
        for (handle, sink) in self.subscriptions.lock().iter() {
            if handle.device() == device && handle.parameter() == parameter {
                let _ = sink.send(SourceEvent::Update(CacheUpdate {
                    device: device.to_string(),
                    parameter,
                    value: value.clone(),
                    timestamp,
                }));
            }
        }
    }

    /// Number of device list requests served.
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Number of point reads attempted.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn subscribed(&self, device: &str) -> Vec<Parameter> {
        let mut parameters: Vec<_> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|(handle, _)| handle.device() == device)
            .map(|(handle, _)| handle.parameter())
            .collect();
        parameters.sort();
        parameters
    }

    pub fn handle_ids(&self) -> Vec<u64> {
        self.subscriptions
            .lock()
            .iter()
            .map(|(handle, _)| handle.id())
            .collect()
    }
}

impl ObservationSource for MockSource {
    async fn list_entities(&self) -> Result<BTreeSet<String>, SourceError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable {
                address: "mock".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.devices.lock().clone())
    }

    async fn read(&self, device: &str, parameter: Parameter) -> Result<CacheValue, SourceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.lock().contains(device) {
            return Err(SourceError::Timeout(5000));
        }
        if self.unreadable.lock().contains(device) {
            return Err(SourceError::Protocol(format!("bad reply for {}", device)));
        }
        Ok(self
            .values
            .lock()
            .get(&(device.to_string(), parameter))
            .cloned()
            .unwrap_or(CacheValue::None))
    }

    fn subscribe(
        &self,
        device: &str,
        parameter: Parameter,
        sink: UpdateSink,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = SubscriptionHandle::new(id, device, parameter);
        self.subscriptions.lock().push((handle.clone(), sink));
        handle
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.subscriptions.lock().retain(|(h, _)| h != handle);
    }
}

/// A decoded f142 message.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub device: String,
    pub value: f64,
    pub timestamp_ns: u64,
    pub severity: AlarmSeverity,
}

/// Decode the fields of an f142 `LogData` buffer.
pub fn decode(buf: &[u8]) -> Record {
    const SLOT_SOURCE_NAME: u16 = 4;
    const SLOT_VALUE: u16 = 8;
    const SLOT_TIMESTAMP: u16 = 10;
    const SLOT_SEVERITY: u16 = 14;
    const SLOT_DOUBLE_VALUE: u16 = 4;

    assert!(flatbuffers::buffer_has_identifier(buf, "f142", false));

    // SAFETY: buffers come from our own encoder.
    unsafe {
        let table = flatbuffers::root_unchecked::<Table>(buf);
        let device = table
            .get::<ForwardsUOffset<&str>>(SLOT_SOURCE_NAME, None)
            .unwrap()
            .to_string();
        let value = table
            .get::<ForwardsUOffset<Table>>(SLOT_VALUE, None)
            .unwrap()
            .get::<f64>(SLOT_DOUBLE_VALUE, Some(0.0))
            .unwrap();
        let timestamp_ns = table.get::<u64>(SLOT_TIMESTAMP, Some(0)).unwrap();
        let severity = table.get::<u16>(SLOT_SEVERITY, Some(u16::MAX)).unwrap();
        Record {
            device,
            value,
            timestamp_ns,
            severity: AlarmSeverity::from_u16(severity).unwrap(),
        }
    }
}

/// Broker decoding and recording every message.
#[derive(Clone, Default)]
pub struct RecordingBroker {
    records: Arc<Mutex<Vec<Record>>>,
    reject: Arc<AtomicBool>,
    held: Arc<AtomicBool>,
    gate: Arc<Notify>,
}

impl RecordingBroker {
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Return and forget everything recorded so far.
    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock())
    }

    pub fn set_rejecting(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Make sends wait until [`RecordingBroker::release`].
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.notify_one();
    }

    /// Wait until at least `count` messages were recorded.
    pub async fn wait_for(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.records.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("broker never received the messages");
    }
}

impl Broker for RecordingBroker {
    async fn send(&self, topic: &str, payload: Vec<u8>) -> forwarder_framework::Result<()> {
        if self.held.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(BridgeError::publish(topic, "broker unavailable"));
        }
        self.records.lock().push(decode(&payload));
        Ok(())
    }
}

/// Watcher and dispatcher wired to in-memory doubles.
///
/// Events are not processed in the background; call [`Harness::drain`] to
/// hand everything queued so far to the dispatcher.
pub struct Harness {
    pub source: Arc<MockSource>,
    pub store: Arc<StateStore>,
    pub broker: RecordingBroker,
    pub watcher: EntityWatcher<MockSource>,
    pub dispatcher: ChangeDispatcher<RecordingBroker>,
    pub updates: UpdateStream,
    pub shutdown: watch::Sender<bool>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_filter(DeviceFilter::default())
    }

    pub fn with_filter(filter: DeviceFilter) -> Self {
        let source = Arc::new(MockSource::default());
        let store = Arc::new(StateStore::new());
        let broker = RecordingBroker::default();
        let connection = Arc::new(ConnectionManager::new(
            broker.clone(),
            Duration::from_secs(3),
        ));
        let publisher = Publisher::new(connection, "nicos_devices");
        let (sink, updates) = update_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let watcher = EntityWatcher::new(source.clone(), store.clone(), sink, shutdown_rx)
            .with_filter(filter)
            .with_poll_interval(Duration::from_millis(100))
            .with_error_backoff(Duration::from_secs(1));
        let dispatcher = ChangeDispatcher::new(store.clone(), publisher);

        Self {
            source,
            store,
            broker,
            watcher,
            dispatcher,
            updates,
            shutdown,
        }
    }

    /// Add a device with an initial value and status.
    pub fn device(&self, name: &str, value: &str, status: &str) {
        self.source.set(name, Parameter::Value, CacheValue::parse(value));
        self.source
            .set(name, Parameter::Status, CacheValue::parse(status));
    }

    /// Dispatch every queued event.
    pub async fn drain(&mut self) {
        while let Ok(event) = self.updates.try_recv() {
            self.dispatcher.handle(event).await;
        }
    }

    /// Scan once, then dispatch whatever the scan queued.
    pub async fn poll(&mut self) -> Result<bool, SourceError> {
        let rebuilt = self.watcher.poll_once().await;
        self.drain().await;
        rebuilt
    }
}
