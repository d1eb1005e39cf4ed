//! TCP client for the NICOS cache.
//!
//! Two connections are used. The request connection carries wildcard
//! listings and point reads; each request is terminated with the end marker
//! and answered up to the server's end marker. The subscription connection
//! is owned by a reader task that subscribes to the whole prefix once and
//! routes every update to the sinks registered for its key. When that
//! connection drops the reader reconnects and resubscribes; registered
//! sinks are kept.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use forwarder_common::current_timestamp_nanos;

use super::protocol::{self, CacheMessage, CacheOp};
use super::value::CacheValue;
use crate::config::CacheConfig;
use crate::source::{
    CacheUpdate, ObservationSource, Parameter, SourceError, SourceEvent, SubscriptionHandle,
    UpdateSink,
};

type Sinks = HashMap<String, Vec<(u64, UpdateSink)>>;

/// NICOS cache client implementing [`ObservationSource`].
///
/// Must be created inside a Tokio runtime; the subscription reader task is
/// spawned immediately and stopped when the client is dropped.
pub struct CacheClient {
    shared: Arc<Shared>,
    request: tokio::sync::Mutex<Option<BufReader<TcpStream>>>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

/// State shared with the subscription reader task.
struct Shared {
    address: String,
    /// Key prefix including the trailing slash.
    prefix: String,
    timeout: Duration,
    reconnect_delay: Duration,
    sinks: Mutex<Sinks>,
}

impl CacheClient {
    /// Create a client for the configured cache.
    ///
    /// Connections are opened lazily, so this succeeds even while the cache
    /// is down; the first request reports the failure.
    pub fn new(config: &CacheConfig) -> Self {
        let shared = Arc::new(Shared {
            address: config.address.clone(),
            prefix: format!("{}/", config.prefix.trim_end_matches('/')),
            timeout: Duration::from_millis(config.connect_timeout_ms),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            sinks: Mutex::new(HashMap::new()),
        });

        let reader = tokio::spawn(run_subscription(shared.clone()));

        Self {
            shared,
            request: tokio::sync::Mutex::new(None),
            next_id: AtomicU64::new(1),
            reader,
        }
    }

    /// Address of the cache server.
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.sinks.lock().values().map(Vec::len).sum()
    }

    /// Send one request batch and collect the replies.
    ///
    /// The request connection is dropped after any failure and reopened by
    /// the next call.
    async fn request(&self, request: &str) -> Result<Vec<CacheMessage>, SourceError> {
        let mut slot = self.request.lock().await;

        let result = tokio::time::timeout(
            self.shared.timeout,
            exchange(&self.shared, &mut *slot, request),
        )
        .await;

        match result {
            Ok(Ok(replies)) => Ok(replies),
            Ok(Err(e)) => {
                *slot = None;
                Err(e)
            }
            Err(_) => {
                *slot = None;
                Err(SourceError::Timeout(self.shared.timeout.as_millis() as u64))
            }
        }
    }

    fn key(&self, device: &str, parameter: Parameter) -> String {
        format!("{}{}/{}", self.shared.prefix, device, parameter)
    }
}

impl Drop for CacheClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl ObservationSource for CacheClient {
    async fn list_entities(&self) -> Result<BTreeSet<String>, SourceError> {
        let replies = self.request(&protocol::wildcard(&self.shared.prefix)).await?;

        let devices = replies
            .iter()
            .filter(|msg| matches!(msg.op, CacheOp::Tell | CacheOp::TellOld))
            .filter(|msg| !msg.value.is_empty())
            .filter_map(|msg| self.shared.split_key(&msg.key))
            .filter(|(_, parameter)| *parameter == Parameter::Value)
            .map(|(device, _)| device.to_string())
            .collect();

        Ok(devices)
    }

    async fn read(&self, device: &str, parameter: Parameter) -> Result<CacheValue, SourceError> {
        let key = self.key(device, parameter);
        let replies = self.request(&protocol::ask(&key)).await?;

        Ok(replies
            .iter()
            .find(|msg| msg.key == key)
            .map(|msg| CacheValue::parse(&msg.value))
            .unwrap_or(CacheValue::None))
    }

    fn subscribe(
        &self,
        device: &str,
        parameter: Parameter,
        sink: UpdateSink,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared
            .sinks
            .lock()
            .entry(sink_key(device, parameter))
            .or_default()
            .push((id, sink));

        SubscriptionHandle::new(id, device, parameter)
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let key = sink_key(handle.device(), handle.parameter());
        let mut sinks = self.shared.sinks.lock();
        if let Some(entries) = sinks.get_mut(&key) {
            entries.retain(|(id, _)| *id != handle.id());
            if entries.is_empty() {
                sinks.remove(&key);
            }
        }
    }
}

impl Shared {
    /// Split `<prefix><device>/<parameter>` into its parts.
    fn split_key<'a>(&self, key: &'a str) -> Option<(&'a str, Parameter)> {
        let (device, parameter) = key.strip_prefix(&self.prefix)?.split_once('/')?;
        if device.is_empty() {
            return None;
        }
        Some((device, Parameter::from_name(parameter)?))
    }

    /// Deliver an update line to every sink registered for its key.
    fn route(&self, msg: &CacheMessage) {
        if !matches!(msg.op, CacheOp::Tell | CacheOp::TellOld) {
            return;
        }
        let Some((device, parameter)) = self.split_key(&msg.key) else {
            return;
        };

        let sinks = self.sinks.lock();
        let Some(entries) = sinks.get(&sink_key(device, parameter)) else {
            return;
        };

        let update = CacheUpdate {
            device: device.to_string(),
            parameter,
            value: CacheValue::parse(&msg.value),
            timestamp: msg
                .time
                .unwrap_or_else(|| current_timestamp_nanos() as f64 / 1e9),
        };

        for (_, sink) in entries {
            // A closed sink belongs to a stopped consumer; nothing to do.
            let _ = sink.send(SourceEvent::Update(update.clone()));
        }
    }
}

fn sink_key(device: &str, parameter: Parameter) -> String {
    format!("{}/{}", device, parameter)
}

async fn open(shared: &Shared) -> Result<TcpStream, SourceError> {
    match tokio::time::timeout(shared.timeout, TcpStream::connect(shared.address.as_str())).await {
        Ok(Ok(stream)) => {
            stream.set_nodelay(true)?;
            Ok(stream)
        }
        Ok(Err(e)) => Err(SourceError::Unavailable {
            address: shared.address.clone(),
            message: e.to_string(),
        }),
        Err(_) => Err(SourceError::Timeout(shared.timeout.as_millis() as u64)),
    }
}

async fn exchange(
    shared: &Shared,
    slot: &mut Option<BufReader<TcpStream>>,
    request: &str,
) -> Result<Vec<CacheMessage>, SourceError> {
    if slot.is_none() {
        let stream = open(shared).await?;
        tracing::debug!(address = %shared.address, "Opened cache request connection");
        *slot = Some(BufReader::new(stream));
    }
    let conn = slot
        .as_mut()
        .ok_or_else(|| SourceError::Protocol("request connection missing".to_string()))?;

    let mut payload = String::with_capacity(request.len() + 5);
    payload.push_str(request);
    payload.push_str(&protocol::end_request());
    conn.get_mut().write_all(payload.as_bytes()).await?;

    let mut replies = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if conn.read_line(&mut line).await? == 0 {
            return Err(SourceError::Unavailable {
                address: shared.address.clone(),
                message: "connection closed mid-reply".to_string(),
            });
        }
        match CacheMessage::parse(&line) {
            Some(msg) if msg.is_end_marker() => return Ok(replies),
            Some(msg) => replies.push(msg),
            None => tracing::debug!(line = line.trim(), "Ignoring malformed cache line"),
        }
    }
}

/// Subscription reader loop; runs until the client is dropped.
async fn run_subscription(shared: Arc<Shared>) {
    loop {
        match subscription_session(&shared).await {
            Ok(()) => tracing::warn!(
                address = %shared.address,
                "Cache closed the subscription connection"
            ),
            Err(e) => tracing::warn!(
                address = %shared.address,
                error = %e,
                "Cache subscription connection failed"
            ),
        }
        tokio::time::sleep(shared.reconnect_delay).await;
    }
}

async fn subscription_session(shared: &Shared) -> Result<(), SourceError> {
    let mut stream = open(shared).await?;
    stream
        .write_all(protocol::subscribe(&shared.prefix).as_bytes())
        .await?;

    tracing::info!(address = %shared.address, prefix = %shared.prefix, "Subscribed to cache updates");

    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        match CacheMessage::parse(&line) {
            Some(msg) => shared.route(&msg),
            None => tracing::debug!(line = %line, "Ignoring malformed cache line"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Shared {
        Shared {
            address: "localhost:14869".to_string(),
            prefix: "nicos/".to_string(),
            timeout: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(1),
            sinks: Mutex::new(HashMap::new()),
        }
    }

    #[test]
    fn test_split_key() {
        let shared = shared();
        assert_eq!(
            shared.split_key("nicos/t1/value"),
            Some(("t1", Parameter::Value))
        );
        assert_eq!(
            shared.split_key("nicos/t1/status"),
            Some(("t1", Parameter::Status))
        );
        assert_eq!(shared.split_key("nicos/t1/target"), None);
        assert_eq!(shared.split_key("other/t1/value"), None);
        assert_eq!(shared.split_key("nicos//value"), None);
    }

    #[test]
    fn test_route_delivers_to_matching_sinks() {
        let shared = shared();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        shared
            .sinks
            .lock()
            .insert(sink_key("t1", Parameter::Value), vec![(1, tx)]);

        let msg = CacheMessage::parse("1700000000.5@nicos/t1/value=10.5").unwrap();
        shared.route(&msg);
        let other = CacheMessage::parse("1700000000.5@nicos/t2/value=3").unwrap();
        shared.route(&other);

        let Ok(SourceEvent::Update(update)) = rx.try_recv() else {
            panic!("expected an update for t1");
        };
        assert_eq!(update.device, "t1");
        assert_eq!(update.parameter, Parameter::Value);
        assert_eq!(update.value, CacheValue::Float(10.5));
        assert_eq!(update.timestamp, 1_700_000_000.5);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_route_ignores_requests() {
        let shared = shared();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        shared
            .sinks
            .lock()
            .insert(sink_key("t1", Parameter::Value), vec![(1, tx)]);

        shared.route(&CacheMessage::parse("@nicos/t1/value?").unwrap());

        assert!(rx.try_recv().is_err());
    }
}
