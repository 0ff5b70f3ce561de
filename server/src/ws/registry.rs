//! The set of live sockets, keyed by connection and tagged with the role each
//! one was accepted under.
//!
//! One mutex guards the whole map. Removal and closing happen inside the same
//! critical section, so a broadcaster taking a snapshot never sees a connection
//! that is registered but already closed by someone else's cleanup.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Connection, ConnectionId, Role};

#[derive(Debug)]
struct Entry {
    role: Role,
    connection: Connection,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<ConnectionId, Entry>>,
}

/// Connection counts by role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub facade_viewers: usize,
    pub monitors: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // The map is consistent after every single insert/remove, so a panic in
    // another holder cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `connection` under `role`. Re-registering the same connection moves
    /// it to the new role.
    pub fn register(&self, connection: Connection, role: Role) {
        let id = connection.id();
        let total = {
            let mut entries = self.lock();
            entries.insert(id, Entry { role, connection });
            entries.len()
        };

        tracing::debug!(
            connection_id = %id,
            role = %role,
            connections = total,
            "Connection registered"
        );
    }

    /// Remove and close the connection. Calling it again is a no-op.
    /// Returns true if this call did the removal.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = {
            let mut entries = self.lock();
            let removed = entries.remove(&id);
            if let Some(entry) = &removed {
                entry.connection.close();
            }
            removed
        };

        match removed {
            Some(entry) => {
                tracing::debug!(
                    connection_id = %id,
                    role = %entry.role,
                    "Connection unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of the connections registered under `filter`.
    pub fn snapshot(&self, filter: &Role) -> Vec<Connection> {
        self.lock()
            .values()
            .filter(|entry| entry.role == *filter)
            .map(|entry| entry.connection.clone())
            .collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RegistryStats {
        let entries = self.lock();
        let monitors = entries
            .values()
            .filter(|entry| entry.role == Role::Monitor)
            .count();
        RegistryStats {
            total: entries.len(),
            facade_viewers: entries.len() - monitors,
            monitors,
        }
    }

    /// Remove and close everything. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        for (_, entry) in entries.drain() {
            entry.connection.close();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_register_and_snapshot_by_role() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = Connection::new(1);
        let (b, _rb) = Connection::new(1);
        let (m, _rm) = Connection::new(1);

        registry.register(a.clone(), Role::FacadeViewer(7));
        registry.register(b.clone(), Role::FacadeViewer(8));
        registry.register(m.clone(), Role::Monitor);

        let facade7: Vec<_> = registry
            .snapshot(&Role::FacadeViewer(7))
            .iter()
            .map(Connection::id)
            .collect();
        assert_eq!(facade7, vec![a.id()]);

        let monitors: Vec<_> = registry
            .snapshot(&Role::Monitor)
            .iter()
            .map(Connection::id)
            .collect();
        assert_eq!(monitors, vec![m.id()]);

        assert_eq!(
            registry.stats(),
            RegistryStats { total: 3, facade_viewers: 2, monitors: 1 }
        );
    }

    #[test]
    fn test_unregister_closes_and_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = Connection::new(1);
        registry.register(conn.clone(), Role::FacadeViewer(1));

        assert!(registry.unregister(conn.id()));
        assert!(!conn.is_open());
        assert!(!registry.unregister(conn.id()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregister_moves_identity() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = Connection::new(1);
        registry.register(conn.clone(), Role::FacadeViewer(1));
        registry.register(conn.clone(), Role::FacadeViewer(2));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot(&Role::FacadeViewer(2)).len(), 1);
        assert!(registry.snapshot(&Role::FacadeViewer(1)).is_empty());
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_changes() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = Connection::new(1);
        registry.register(a.clone(), Role::Monitor);

        let snapshot = registry.snapshot(&Role::Monitor);
        let (b, _rb) = Connection::new(1);
        registry.register(b, Role::Monitor);
        registry.unregister(a.id());

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), a.id());
    }

    #[test]
    fn test_close_all_empties_registry() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = Connection::new(1);
        let (b, _rb) = Connection::new(1);
        registry.register(a.clone(), Role::Monitor);
        registry.register(b.clone(), Role::FacadeViewer(3));

        assert_eq!(registry.close_all(), 2);
        assert!(registry.is_empty());
        assert!(!a.is_open());
        assert!(!b.is_open());
    }

    #[test]
    fn test_concurrent_register_unregister_has_no_lost_updates() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();

        for worker in 0..8i64 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                let mut kept = Vec::new();
                for i in 0..200 {
                    let (conn, _rx) = Connection::new(1);
                    registry.register(conn.clone(), Role::FacadeViewer(worker));
                    if i % 2 == 0 {
                        registry.unregister(conn.id());
                        registry.unregister(conn.id());
                    } else {
                        kept.push(conn.id());
                    }
                }
                kept
            }));
        }

        let mut expected = HashSet::new();
        for handle in handles {
            expected.extend(handle.join().unwrap());
        }

        assert_eq!(registry.len(), expected.len());
        let mut seen = HashSet::new();
        for worker in 0..8 {
            for conn in registry.snapshot(&Role::FacadeViewer(worker)) {
                assert!(conn.is_open());
                assert!(seen.insert(conn.id()), "duplicate entry");
            }
        }
        assert_eq!(seen, expected);
    }
}
