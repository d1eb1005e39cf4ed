//! Forwarder startup.

use std::sync::Arc;
use std::time::Duration;

use forwarder_framework::{Broker, BridgeError, BridgeRunner};

use crate::config::ForwarderConfig;
use crate::dispatcher::ChangeDispatcher;
use crate::filter::DeviceFilter;
use crate::source::{ObservationSource, update_channel};
use crate::store::StateStore;
use crate::watcher::EntityWatcher;

/// Spawn the dispatcher and the watcher on a connected runner.
///
/// The runner only exists once the broker answered, so the cache is not
/// polled before then. The watcher waits for the first non-empty device
/// list before it starts reconciling.
pub fn start<S, B>(
    runner: &mut BridgeRunner<ForwarderConfig, B>,
    source: Arc<S>,
) -> Result<(), BridgeError>
where
    S: ObservationSource,
    B: Broker,
{
    let config = runner.config();
    let filter = DeviceFilter::new(&config.filter)
        .map_err(|e| BridgeError::validation(format!("Invalid filter pattern: {}", e)))?;
    let poll_interval = Duration::from_millis(config.cache.poll_interval_ms);
    let error_backoff = Duration::from_millis(config.cache.error_backoff_ms);

    let store = Arc::new(StateStore::new());
    let (sink, events) = update_channel();

    let dispatcher = ChangeDispatcher::new(store.clone(), runner.publisher());
    runner.spawn(dispatcher.run(events));

    let watcher = EntityWatcher::new(source, store, sink, runner.shutdown_signal())
        .with_filter(filter)
        .with_poll_interval(poll_interval)
        .with_error_backoff(error_backoff);

    runner.spawn(async move {
        let devices = watcher.wait_for_entities().await;
        tracing::info!(devices = devices.len(), "Cache lists devices, starting watcher");
        watcher.run().await;
    });

    Ok(())
}
