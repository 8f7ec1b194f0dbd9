//! Keyed collections of live connections and best-effort fan-out.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::ServerMessage;

use super::connection::Connection;

/// All connections plus the host subset, keyed by connection id. A host
/// connection appears in both maps at once.
pub struct Registry {
    connections: DashMap<Uuid, Arc<Connection>>,
    hosts: DashMap<Uuid, Arc<Connection>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            hosts: DashMap::new(),
        }
    }

    pub fn register(&self, connection: Arc<Connection>) {
        self.connections.insert(connection.id, connection);
    }

    /// Move an existing connection into the host set as well.
    pub fn promote_to_host(&self, id: Uuid) {
        if let Some(connection) = self.connections.get(&id) {
            connection.mark_host();
            self.hosts.insert(id, Arc::clone(connection.value()));
        }
    }

    /// Remove from both collections; idempotent.
    pub fn remove(&self, id: Uuid) {
        self.connections.remove(&id);
        self.hosts.remove(&id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Fan out to every connection.
    pub async fn broadcast_all(&self, message: &ServerMessage) {
        self.broadcast(&self.connections, message).await;
    }

    /// Fan out to host connections only.
    pub async fn broadcast_hosts(&self, message: &ServerMessage) {
        self.broadcast(&self.hosts, message).await;
    }

    /// Reply to one connection, with the same eviction-on-failure rule as
    /// a broadcast.
    pub async fn send(&self, connection: &Connection, message: &ServerMessage) {
        if let Err(e) = connection.send(message).await {
            debug!(conn_id = %connection.id, error = %e, "dropping connection after failed send");
            self.remove(connection.id);
        }
    }

    /// Serialize once and deliver best-effort: a failed send evicts that
    /// connection and never blocks delivery to the rest or surfaces to the
    /// caller.
    async fn broadcast(&self, targets: &DashMap<Uuid, Arc<Connection>>, message: &ServerMessage) {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize broadcast message");
                return;
            }
        };
        let recipients: Vec<Arc<Connection>> =
            targets.iter().map(|entry| Arc::clone(entry.value())).collect();
        for connection in recipients {
            if let Err(e) = connection.send_text(&json).await {
                debug!(conn_id = %connection.id, error = %e, "dropping connection after failed send");
                self.remove(connection.id);
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
