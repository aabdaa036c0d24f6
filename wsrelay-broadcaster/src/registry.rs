use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::Mutex;

use crate::client::{ClientSink, ConnectionId};

struct Entry {
    sink: Arc<dyn ClientSink>,
    connected_at: DateTime<Local>,
}

/// Thread-safe set of live client connections
///
/// The lock only guards membership. Callers iterate a [`snapshot`] so that
/// network writes never happen while it is held.
///
/// [`snapshot`]: ConnectionRegistry::snapshot
pub struct ConnectionRegistry {
    clients: Mutex<HashMap<ConnectionId, Entry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Register a client. Returns `false` if `id` was already registered,
    /// in which case the existing entry is left untouched.
    pub async fn add(&self, id: ConnectionId, sink: Arc<dyn ClientSink>) -> bool {
        let mut clients = self.clients.lock().await;
        if clients.contains_key(&id) {
            tracing::debug!(%id, "Client already registered");
            return false;
        }

        clients.insert(
            id,
            Entry {
                sink,
                connected_at: Local::now(),
            },
        );
        tracing::info!(%id, "New client connected. Total clients: {}", clients.len());
        true
    }

    /// Deregister a client. Removing an unknown id is a no-op.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let mut clients = self.clients.lock().await;
        match clients.remove(&id) {
            Some(entry) => {
                let connected_for = Local::now() - entry.connected_at;
                tracing::info!(
                    %id,
                    connected_secs = connected_for.num_seconds(),
                    "Client removed. Remaining: {}",
                    clients.len()
                );
                true
            }
            None => false,
        }
    }

    /// Membership at the instant of the call
    pub async fn snapshot(&self) -> Vec<(ConnectionId, Arc<dyn ClientSink>)> {
        self.clients
            .lock()
            .await
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(&entry.sink)))
            .collect()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }

    /// Get current client count
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
