use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::client::{ClientSink, ConnectionId};
use crate::message::Message;
use crate::registry::ConnectionRegistry;

/// How a single broadcast reaches its recipients
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanoutStrategy {
    /// One task per recipient; a stalled client delays nobody else
    #[default]
    Concurrent,
    /// Recipients are written to one after another within the call
    Sequential,
}

impl std::str::FromStr for FanoutStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "concurrent" => Ok(Self::Concurrent),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!("unknown fan-out strategy: {}", other)),
        }
    }
}

/// Outcome of [`BroadcastCoordinator::broadcast_and_wait`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Fans a message out to every client in the registry.
///
/// Each delivery is isolated: a failed write is logged and forgotten. The
/// client stays registered until its own read loop notices the broken
/// connection and removes it.
#[derive(Clone)]
pub struct BroadcastCoordinator {
    registry: Arc<ConnectionRegistry>,
    strategy: FanoutStrategy,
}

impl BroadcastCoordinator {
    pub fn new(registry: Arc<ConnectionRegistry>, strategy: FanoutStrategy) -> Self {
        Self { registry, strategy }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn strategy(&self) -> FanoutStrategy {
        self.strategy
    }

    /// Best-effort delivery to every registered client.
    ///
    /// With [`FanoutStrategy::Concurrent`] the deliveries are detached tasks
    /// that may still be running when this returns. Returns the number of
    /// clients in the snapshot.
    pub async fn broadcast(&self, message: impl Into<Message>) -> usize {
        let message = message.into();
        let recipients = self.registry.snapshot().await;
        let count = recipients.len();

        match self.strategy {
            FanoutStrategy::Concurrent => {
                for (id, sink) in recipients {
                    let message = message.clone();
                    tokio::spawn(async move {
                        deliver(id, sink, message).await;
                    });
                }
            }
            FanoutStrategy::Sequential => {
                for (id, sink) in recipients {
                    deliver(id, sink, message.clone()).await;
                }
            }
        }

        tracing::debug!(recipients = count, bytes = message.len(), "Broadcast dispatched");
        count
    }

    /// Like [`broadcast`](Self::broadcast), but returns once every delivery
    /// has been attempted.
    pub async fn broadcast_and_wait(&self, message: impl Into<Message>) -> DeliveryReport {
        let message = message.into();
        let recipients = self.registry.snapshot().await;
        let mut report = DeliveryReport::default();

        match self.strategy {
            FanoutStrategy::Concurrent => {
                let mut deliveries = JoinSet::new();
                for (id, sink) in recipients {
                    deliveries.spawn(deliver(id, sink, message.clone()));
                }

                while let Some(result) = deliveries.join_next().await {
                    match result {
                        Ok(true) => report.delivered += 1,
                        Ok(false) => report.failed += 1,
                        Err(e) => {
                            tracing::error!(error = %e, "Delivery task aborted");
                            report.failed += 1;
                        }
                    }
                }
            }
            FanoutStrategy::Sequential => {
                for (id, sink) in recipients {
                    if deliver(id, sink, message.clone()).await {
                        report.delivered += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::debug!(
            attempted = report.attempted(),
            failed = report.failed,
            "Broadcast completed"
        );
        report
    }
}

async fn deliver(id: ConnectionId, sink: Arc<dyn ClientSink>, message: Message) -> bool {
    match sink.send(&message).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(%id, error = %e, "Failed to send to client");
            false
        }
    }
}
