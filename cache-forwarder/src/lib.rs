//! NICOS cache to Kafka forwarder.
//!
//! Watches the devices published in a NICOS cache and forwards their numeric
//! values and alarm severities to a Kafka topic as f142 `LogData` messages.
//!
//! # Data flow
//!
//! ```text
//! cache ──list/read──> EntityWatcher ──snapshots──┐
//!   │                       │ subscribe           v
//!   └──updates──────────────┴──────────> UpdateSink ──> ChangeDispatcher ──> Kafka
//! ```
//!
//! Both the watcher and the dispatcher go through the single
//! [`StateStore`](store::StateStore) lock, so a subscription rebuild is atomic
//! with respect to incoming updates. Only the dispatcher publishes, in queue
//! order.

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod filter;
pub mod pipeline;
pub mod source;
pub mod status;
pub mod store;
pub mod watcher;

pub use cache::{CacheClient, CacheValue};
pub use config::{CacheConfig, ForwarderConfig};
pub use dispatcher::ChangeDispatcher;
pub use filter::{DeviceFilter, FilterConfig};
pub use pipeline::start;
pub use source::{
    CacheUpdate, ObservationSource, Parameter, SourceError, SourceEvent, SubscriptionHandle,
    UpdateSink, UpdateStream, update_channel,
};
pub use store::{EntityState, SeverityChange, StateStore};
pub use watcher::EntityWatcher;
