//! The observation source seam.
//!
//! The forwarder only needs four things from the store it watches: the list
//! of devices, a point read, and subscribe/unsubscribe for change
//! notifications. [`ObservationSource`] captures that surface so the watcher
//! and dispatcher can run against the real NICOS cache or an in-memory
//! stand-in.

use std::collections::BTreeSet;
use std::future::Future;

use tokio::sync::mpsc;

use forwarder_framework::DeviceUpdate;

use crate::cache::CacheValue;

/// Errors from the observation source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Cache unavailable at {address}: {message}")]
    Unavailable { address: String, message: String },
    #[error("Timed out talking to the cache after {0} ms")]
    Timeout(u64),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Whether the source as a whole is unreachable, as opposed to one key
    /// being unreadable.
    pub fn is_connection(&self) -> bool {
        !matches!(self, SourceError::Protocol(_))
    }
}

/// The two per-device parameters the forwarder follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    Value,
    Status,
}

impl Parameter {
    pub fn as_str(self) -> &'static str {
        match self {
            Parameter::Value => "value",
            Parameter::Status => "status",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "value" => Some(Parameter::Value),
            "status" => Some(Parameter::Status),
            _ => None,
        }
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change notification for one device parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheUpdate {
    pub device: String,
    pub parameter: Parameter,
    pub value: CacheValue,
    /// Source timestamp in seconds since the epoch.
    pub timestamp: f64,
}

/// One item on the dispatcher's queue.
///
/// Snapshots and subscription updates share a queue so that everything sent
/// for a device leaves in the order it was queued.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// A subscribed parameter changed.
    Update(CacheUpdate),
    /// A device's state as read when it was subscribed.
    Snapshot(DeviceUpdate),
}

impl From<CacheUpdate> for SourceEvent {
    fn from(update: CacheUpdate) -> Self {
        SourceEvent::Update(update)
    }
}

/// Where subscriptions and reconciliation deliver their events.
pub type UpdateSink = mpsc::UnboundedSender<SourceEvent>;

/// Receiving half matching [`UpdateSink`].
pub type UpdateStream = mpsc::UnboundedReceiver<SourceEvent>;

/// Create a connected sink/stream pair.
pub fn update_channel() -> (UpdateSink, UpdateStream) {
    mpsc::unbounded_channel()
}

/// Identifies one registered subscription; pass it back to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    device: String,
    parameter: Parameter,
}

impl SubscriptionHandle {
    pub fn new(id: u64, device: impl Into<String>, parameter: Parameter) -> Self {
        Self {
            id,
            device: device.into(),
            parameter,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn parameter(&self) -> Parameter {
        self.parameter
    }
}

/// A store of device values that can be listed, read and watched.
pub trait ObservationSource: Send + Sync + 'static {
    /// Names of every device currently known under the source's namespace.
    fn list_entities(&self) -> impl Future<Output = Result<BTreeSet<String>, SourceError>> + Send;

    /// Read the current value of one device parameter.
    ///
    /// A parameter the source does not know reads as [`CacheValue::None`].
    fn read(
        &self,
        device: &str,
        parameter: Parameter,
    ) -> impl Future<Output = Result<CacheValue, SourceError>> + Send;

    /// Deliver every future change of `device`/`parameter` to `sink`.
    fn subscribe(&self, device: &str, parameter: Parameter, sink: UpdateSink)
    -> SubscriptionHandle;

    /// Stop a subscription. Unknown handles are ignored.
    fn unsubscribe(&self, handle: &SubscriptionHandle);
}
