//! Shared per-device state.
//!
//! One async mutex guards the watched set together with every device's last
//! value, last forwarded severity and subscription handles. Callers only get
//! atomic operations; reconciliation holds a [`StoreGuard`] for the whole
//! teardown and rebuild so the dispatcher never sees a half-built set.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::{Mutex, MutexGuard};

use forwarder_common::AlarmSeverity;

use crate::source::SubscriptionHandle;

/// Last known state of a watched device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    /// Last numeric value seen.
    pub value: Option<f64>,
    /// Last severity sent on the alarm channel.
    pub severity: AlarmSeverity,
}

/// Result of [`StateStore::record_severity`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeverityChange {
    /// The device is not watched.
    Unknown,
    /// Same severity as last sent; nothing to do.
    Unchanged,
    /// The severity changed but the device has no numeric value to send
    /// with it. The stored severity is left as it was.
    NoValue,
    /// The severity was stored; forward it with `value`.
    Changed { value: f64 },
}

#[derive(Debug)]
struct WatchedEntity {
    state: EntityState,
    subscriptions: Vec<SubscriptionHandle>,
}

#[derive(Debug, Default)]
struct StoreInner {
    watched: BTreeSet<String>,
    entities: HashMap<String, WatchedEntity>,
}

/// The single lock around all forwarding state.
#[derive(Debug, Default)]
pub struct StateStore {
    inner: Mutex<StoreInner>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new numeric value.
    ///
    /// Returns `false` if the device is not watched.
    pub async fn record_value(&self, device: &str, value: f64) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.entities.get_mut(device) {
            Some(entity) => {
                entity.state.value = Some(value);
                true
            }
            None => false,
        }
    }

    /// Compare a severity against the last one sent and store it if it
    /// changed and can be sent.
    pub async fn record_severity(&self, device: &str, severity: AlarmSeverity) -> SeverityChange {
        let mut inner = self.inner.lock().await;
        let Some(entity) = inner.entities.get_mut(device) else {
            return SeverityChange::Unknown;
        };

        if entity.state.severity == severity {
            return SeverityChange::Unchanged;
        }

        match entity.state.value {
            Some(value) => {
                entity.state.severity = severity;
                SeverityChange::Changed { value }
            }
            None => SeverityChange::NoValue,
        }
    }

    /// Snapshot of one device's state.
    pub async fn state(&self, device: &str) -> Option<EntityState> {
        self.inner
            .lock()
            .await
            .entities
            .get(device)
            .map(|entity| entity.state)
    }

    /// Copy of the watched set.
    pub async fn watched(&self) -> BTreeSet<String> {
        self.inner.lock().await.watched.clone()
    }

    /// Take the lock for a reconciliation pass.
    pub async fn lock(&self) -> StoreGuard<'_> {
        StoreGuard {
            inner: self.inner.lock().await,
        }
    }
}

/// Exclusive access to the store during reconciliation.
pub struct StoreGuard<'a> {
    inner: MutexGuard<'a, StoreInner>,
}

impl StoreGuard<'_> {
    pub fn watched(&self) -> &BTreeSet<String> {
        &self.inner.watched
    }

    /// Drop every device's state and hand back their subscriptions.
    pub fn teardown(&mut self) -> Vec<SubscriptionHandle> {
        self.inner.watched.clear();
        self.inner
            .entities
            .drain()
            .flat_map(|(_, entity)| entity.subscriptions)
            .collect()
    }

    /// Start tracking a device.
    pub fn insert(
        &mut self,
        device: impl Into<String>,
        state: EntityState,
        subscriptions: Vec<SubscriptionHandle>,
    ) {
        self.inner.entities.insert(
            device.into(),
            WatchedEntity {
                state,
                subscriptions,
            },
        );
    }

    pub fn set_watched(&mut self, watched: BTreeSet<String>) {
        self.inner.watched = watched;
    }
}
