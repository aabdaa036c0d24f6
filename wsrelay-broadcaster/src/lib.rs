//! Connection registry and fan-out broadcast for the wsrelay chat relay
//!
//! This crate tracks live client connections and delivers each relayed
//! message to all of them. It knows nothing about HTTP or WebSocket framing:
//! the transport hands it a [`ClientSink`] per connection and calls
//! [`BroadcastCoordinator::broadcast`] for every inbound payload.
//!
//! # Features
//!
//! - Concurrency-safe registry keyed by [`ConnectionId`]
//! - Registry lock is never held across a network write
//! - Per-client failure isolation: one broken client never blocks the rest
//! - Concurrent (task per recipient) or sequential fan-out
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use wsrelay_broadcaster::{
//!     BroadcastCoordinator, ClientSink, ConnectionId, ConnectionRegistry, FanoutStrategy,
//! };
//!
//! # async fn run(sink: Arc<dyn ClientSink>) {
//! let registry = Arc::new(ConnectionRegistry::new());
//! let coordinator = BroadcastCoordinator::new(Arc::clone(&registry), FanoutStrategy::Concurrent);
//!
//! let id = ConnectionId::generate();
//! registry.add(id, sink).await;
//!
//! coordinator.broadcast("hello").await;
//!
//! registry.remove(id).await;
//! # }
//! ```

pub mod broadcaster;
pub mod client;
pub mod error;
pub mod message;
pub mod registry;

// Re-exports
pub use broadcaster::{BroadcastCoordinator, DeliveryReport, FanoutStrategy};
pub use client::{ClientSink, ConnectionId};
pub use error::{BroadcasterError, Result};
pub use message::Message;
pub use registry::ConnectionRegistry;
