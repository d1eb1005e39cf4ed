//! NICOS cache access: line protocol, value literals and the TCP client.

mod client;
pub mod protocol;
mod value;

pub use client::CacheClient;
pub use protocol::{CacheMessage, CacheOp};
pub use value::CacheValue;
