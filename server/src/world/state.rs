//! Shared registry of sessions, live connections and map membership.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use log::debug;
use parking_lot::RwLock;

use super::session::{Session, Spawn};
use crate::network::Connection;

/// Everything guarded by the single world lock
#[derive(Default)]
struct Registry {
    sessions: HashMap<u32, Session>,
    connections: HashMap<u32, Connection>,
    /// Connection id to the user bound to it
    bound: HashMap<u64, u32>,
    maps: HashMap<u32, HashSet<u32>>,
}

impl Registry {
    fn bind(&mut self, user_id: u32, conn: Connection) -> Option<Connection> {
        if let Some(other) = self.bound.insert(conn.id(), user_id) {
            if other != user_id {
                self.connections.remove(&other);
            }
        }
        let connection_id = conn.id();
        let previous = self.connections.insert(user_id, conn)?;
        if previous.id() != connection_id {
            self.bound.remove(&previous.id());
        }
        Some(previous)
    }

    fn is_bound_to(&self, user_id: u32, connection_id: u64) -> bool {
        self.connections.get(&user_id).map(|c| c.id()) == Some(connection_id)
    }

    fn unbind(&mut self, user_id: u32) {
        if let Some(conn) = self.connections.remove(&user_id) {
            self.bound.remove(&conn.id());
        }
    }

    fn session_entry(&mut self, user_id: u32, spawn: Spawn) -> &mut Session {
        let Registry { sessions, maps, .. } = self;
        sessions.entry(user_id).or_insert_with(|| {
            if spawn.map_id != 0 {
                maps.entry(spawn.map_id).or_default().insert(user_id);
            }
            Session::new(user_id, spawn)
        })
    }

    /// Move `user_id` between map sets. Map 0 means "in no map".
    fn relocate(&mut self, user_id: u32, from: u32, to: u32) {
        if from != 0 {
            if let Some(set) = self.maps.get_mut(&from) {
                set.remove(&user_id);
                if set.is_empty() {
                    self.maps.remove(&from);
                }
            }
        }
        if to != 0 {
            self.maps.entry(to).or_default().insert(user_id);
        }
    }
}

/// Concurrency-safe world model shared by every connection.
///
/// One lock covers sessions, the connection index and the map index so a map
/// change updates the session field and the index together.
pub struct WorldState {
    registry: RwLock<Registry>,
    spawn: Spawn,
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new(Spawn::default())
    }
}

impl WorldState {
    pub fn new(spawn: Spawn) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            spawn,
        }
    }

    // =========================================================================
    // Connections
    // =========================================================================

    /// Bind `user_id` to `conn`, returning the binding it replaced
    pub fn register_connection(&self, user_id: u32, conn: Connection) -> Option<Connection> {
        self.registry.write().bind(user_id, conn)
    }

    /// Drop the binding only if it still points at `connection_id`.
    ///
    /// A reconnect that already replaced the binding is left alone.
    pub fn unregister_connection(&self, user_id: u32, connection_id: u64) -> bool {
        let mut registry = self.registry.write();
        if !registry.is_bound_to(user_id, connection_id) {
            return false;
        }
        registry.unbind(user_id);
        true
    }

    /// Remove whichever user is bound to `connection_id`
    pub fn unbind_connection(&self, connection_id: u64) -> Option<u32> {
        let mut registry = self.registry.write();
        let user_id = registry.bound.get(&connection_id).copied()?;
        registry.unbind(user_id);
        Some(user_id)
    }

    pub fn connection(&self, user_id: u32) -> Option<Connection> {
        self.registry.read().connections.get(&user_id).cloned()
    }

    /// Number of users with a live connection
    pub fn online_count(&self) -> usize {
        self.registry.read().connections.len()
    }

    /// Users with a live connection, in no particular order
    pub fn online_users(&self) -> Vec<u32> {
        self.registry.read().connections.keys().copied().collect()
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Snapshot of the session for `user_id`, creating it with defaults if needed
    pub fn get_or_create_session(&self, user_id: u32) -> Session {
        self.registry.write().session_entry(user_id, self.spawn).clone()
    }

    /// Snapshot of an existing session
    pub fn session(&self, user_id: u32) -> Option<Session> {
        self.registry.read().sessions.get(&user_id).cloned()
    }

    /// Run `f` on the session under the write lock, creating the session if needed.
    ///
    /// `f` must not call back into the world state.
    pub fn with_session<R>(&self, user_id: u32, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut registry = self.registry.write();
        f(registry.session_entry(user_id, self.spawn))
    }

    /// Replace a session's persisted fields and place it on `map_id`
    pub fn hydrate_session(&self, user_id: u32, map_id: u32, apply: impl FnOnce(&mut Session)) {
        let mut registry = self.registry.write();
        let session = registry.session_entry(user_id, self.spawn);
        apply(session);
        let from = session.map_id();
        session.set_map_id(map_id);
        registry.relocate(user_id, from, map_id);
    }

    pub fn session_count(&self) -> usize {
        self.registry.read().sessions.len()
    }

    // =========================================================================
    // Maps
    // =========================================================================

    /// Move a user to `map_id`; 0 takes them out of every map.
    ///
    /// Returns false when the user has no session.
    pub fn update_map(&self, user_id: u32, map_id: u32) -> bool {
        let mut registry = self.registry.write();
        let Some(session) = registry.sessions.get_mut(&user_id) else {
            return false;
        };
        let from = session.map_id();
        session.set_map_id(map_id);
        registry.relocate(user_id, from, map_id);
        true
    }

    /// Users currently on `map_id`, in no particular order
    pub fn players_in_map(&self, map_id: u32) -> Vec<u32> {
        self.registry
            .read()
            .maps
            .get(&map_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Population per occupied map
    pub fn map_counts(&self) -> HashMap<u32, usize> {
        self.registry
            .read()
            .maps
            .iter()
            .map(|(map_id, set)| (*map_id, set.len()))
            .collect()
    }

    /// Write `payload` to every connected user on `map_id`.
    ///
    /// Targets are snapshotted under the lock and written after it is released.
    /// Users without a live connection are skipped. Returns the number of
    /// successful writes.
    pub async fn broadcast(&self, map_id: u32, payload: &[u8]) -> usize {
        let targets: Vec<Connection> = {
            let registry = self.registry.read();
            match registry.maps.get(&map_id) {
                Some(set) => set
                    .iter()
                    .filter_map(|user_id| registry.connections.get(user_id).cloned())
                    .collect(),
                None => Vec::new(),
            }
        };

        let delivered = join_all(targets.iter().map(|conn| conn.send_quiet(payload)))
            .await
            .into_iter()
            .filter(|ok| *ok)
            .count();
        debug!("Broadcast {} bytes to map {} ({} delivered)", payload.len(), map_id, delivered);
        delivered
    }
}
