use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Message;

/// Stable identifier assigned to a client when its connection is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next process-wide unique id
    pub fn generate() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Send half of a client connection.
///
/// The registry only ever holds this capability, so it can write to a client
/// but never close it; closing belongs to the task that owns the read half.
/// Several broadcasts may call `send` on the same sink at once, so
/// implementations must serialize their own writes.
#[async_trait]
pub trait ClientSink: Send + Sync {
    async fn send(&self, message: &Message) -> Result<()>;
}
