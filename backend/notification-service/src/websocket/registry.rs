/// WebSocket Connection Registry
///
/// Maps a user id to the set of that user's live connection handles.
/// Supports:
/// - Multiple concurrent connections per user (tabs, devices)
/// - Idempotent removal of a single connection
/// - Snapshot enumeration for the heartbeat monitor
///
/// The registry only holds membership; closing sockets is the gateway's job.
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::handle::{ConnectionHandle, ConnectionId};
use crate::metrics;

type UserConnections = HashMap<ConnectionId, ConnectionHandle>;

/// Thread-safe registry of live connections
///
/// Every operation takes the lock for the duration of one map update or one
/// snapshot copy and never across an await point.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    /// Map of user_id -> that user's connections keyed by connection id
    connections: Arc<RwLock<HashMap<String, UserConnections>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle to its owner's set, creating the set if absent
    pub fn register(&self, handle: ConnectionHandle) {
        let mut connections = self.connections.write();

        connections
            .entry(handle.user_id().to_string())
            .or_default()
            .insert(handle.id(), handle.clone());

        tracing::debug!(
            user_id = %handle.user_id(),
            connection_id = %handle.id(),
            user_connections = connections.get(handle.user_id()).map(|c| c.len()).unwrap_or(0),
            "Registered connection"
        );
        Self::publish_gauges(&connections);
    }

    /// Remove a handle from its owner's set
    ///
    /// Drops the user entry once its set is empty. Removing a handle that is
    /// not registered is a no-op; returns whether anything was removed.
    pub fn deregister(&self, handle: &ConnectionHandle) -> bool {
        let mut connections = self.connections.write();

        let removed = match connections.get_mut(handle.user_id()) {
            Some(user_connections) => {
                let removed = user_connections.remove(&handle.id()).is_some();
                if user_connections.is_empty() {
                    connections.remove(handle.user_id());
                }
                removed
            }
            None => false,
        };

        if removed {
            tracing::debug!(
                user_id = %handle.user_id(),
                connection_id = %handle.id(),
                "Deregistered connection"
            );
            Self::publish_gauges(&connections);
        }
        removed
    }

    /// Snapshot of the live handles for a user; empty when the user is offline
    pub fn connections_for(&self, user_id: &str) -> Vec<ConnectionHandle> {
        let connections = self.connections.read();
        connections
            .get(user_id)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of every registered handle
    pub fn all_handles(&self) -> Vec<ConnectionHandle> {
        let connections = self.connections.read();
        connections
            .values()
            .flat_map(|c| c.values().cloned())
            .collect()
    }

    /// Get the number of active connections for a user
    pub fn connection_count(&self, user_id: &str) -> usize {
        let connections = self.connections.read();
        connections.get(user_id).map(|c| c.len()).unwrap_or(0)
    }

    /// Get the total number of active connections
    pub fn total_connections(&self) -> usize {
        let connections = self.connections.read();
        connections.values().map(|c| c.len()).sum()
    }

    /// Get the number of connected users
    pub fn connected_users_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Get list of all connected user IDs
    pub fn connected_user_ids(&self) -> Vec<String> {
        self.connections.read().keys().cloned().collect()
    }

    /// Empty the registry, returning what it held (shutdown)
    pub fn drain(&self) -> Vec<ConnectionHandle> {
        let mut connections = self.connections.write();
        let drained: Vec<ConnectionHandle> = connections
            .drain()
            .flat_map(|(_, c)| c.into_values())
            .collect();
        Self::publish_gauges(&connections);
        drained
    }

    fn publish_gauges(connections: &HashMap<String, UserConnections>) {
        let total = connections.values().map(|c| c.len()).sum();
        metrics::set_connection_gauges(total, connections.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn handle(user_id: &str) -> ConnectionHandle {
        ConnectionHandle::channel(user_id).0
    }

    fn ids(handles: &[ConnectionHandle]) -> HashSet<ConnectionId> {
        handles.iter().map(|h| h.id()).collect()
    }

    #[test]
    fn test_registry_creation() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.total_connections(), 0);
        assert_eq!(registry.connected_users_count(), 0);
        assert!(registry.connections_for("nobody").is_empty());
    }

    #[test]
    fn test_multiple_connections_same_user() {
        let registry = ConnectionRegistry::new();
        for _ in 0..3 {
            registry.register(handle("alice"));
        }

        assert_eq!(registry.connection_count("alice"), 3);
        assert_eq!(registry.total_connections(), 3);
        assert_eq!(registry.connected_users_count(), 1);
    }

    #[test]
    fn test_register_same_handle_twice_is_one_member() {
        let registry = ConnectionRegistry::new();
        let h = handle("alice");
        registry.register(h.clone());
        registry.register(h);
        assert_eq!(registry.connection_count("alice"), 1);
    }

    #[test]
    fn test_deregister_removes_only_that_handle() {
        let registry = ConnectionRegistry::new();
        let a1 = handle("alice");
        let a2 = handle("alice");
        registry.register(a1.clone());
        registry.register(a2.clone());

        assert!(registry.deregister(&a1));
        assert_eq!(ids(&registry.connections_for("alice")), ids(&[a2.clone()]));

        assert!(registry.deregister(&a2));
        assert_eq!(registry.connected_users_count(), 0);
        assert!(registry.connected_user_ids().is_empty());
    }

    #[test]
    fn test_deregister_unknown_handle_is_noop() {
        let registry = ConnectionRegistry::new();
        let bob = handle("bob");
        registry.register(bob.clone());

        assert!(!registry.deregister(&handle("carol")));
        assert!(!registry.deregister(&handle("bob")));
        assert!(registry.deregister(&bob));
        assert!(!registry.deregister(&bob));
        assert_eq!(registry.total_connections(), 0);
    }

    #[test]
    fn test_register_deregister_sequences_match_model() {
        let registry = ConnectionRegistry::new();
        let users = ["u1", "u2", "u3"];
        let handles: Vec<ConnectionHandle> = (0..12).map(|i| handle(users[i % 3])).collect();
        let mut model: HashSet<ConnectionId> = HashSet::new();

        // deterministic interleaving of registers and deregisters
        for (step, h) in handles.iter().enumerate() {
            registry.register(h.clone());
            model.insert(h.id());
            if step % 4 == 3 {
                let victim = &handles[step - 2];
                registry.deregister(victim);
                model.remove(&victim.id());
            }
        }
        registry.deregister(&handles[0]);
        model.remove(&handles[0].id());

        for user in users {
            let expected: HashSet<ConnectionId> = handles
                .iter()
                .filter(|h| h.user_id() == user && model.contains(&h.id()))
                .map(|h| h.id())
                .collect();
            assert_eq!(ids(&registry.connections_for(user)), expected);
        }
        assert_eq!(ids(&registry.all_handles()), model);
    }

    #[test]
    fn test_drain_empties_registry() {
        let registry = ConnectionRegistry::new();
        registry.register(handle("alice"));
        registry.register(handle("bob"));

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(registry.total_connections(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let registry = ConnectionRegistry::new();
        let clone = registry.clone();
        clone.register(handle("alice"));
        assert_eq!(registry.connection_count("alice"), 1);
    }
}
