//! Registry engine
//!
//! Concurrency notes:
//! - The API is synchronous and meant to sit behind one lock per worker
//!   (`Arc<Mutex<Registry>>`); that single lock guards both indexes.
//! - Closing connections are not swept in the background. A dead member stays
//!   indexed until `unregister` is called for it or until a pruning pass sees
//!   its status.

use std::collections::HashMap;

use tracing::debug;

use crate::connection::{Connection, ConnectionId};
use crate::registry::group::TokenGroup;

#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    groups: HashMap<String, TokenGroup>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly accepted connection. It belongs to no group yet.
    pub fn register(&mut self, connection: Connection) {
        debug!(conn = %connection.id, peer = ?connection.remote_addr, "connection registered");
        self.connections.insert(connection.id.clone(), connection);
    }

    /// Bind `token` to the connection and index it under that token.
    ///
    /// Only the first bind for a connection has any effect; later calls leave
    /// both the connection's token and the group index untouched. Returns
    /// `true` when this call performed the bind.
    pub fn bind_token(&mut self, id: &ConnectionId, token: &str) -> bool {
        let Some(connection) = self.connections.get_mut(id) else {
            debug!(conn = %id, "bind for unknown connection ignored");
            return false;
        };
        if !connection.assign_token(token) {
            debug!(conn = %id, token, "connection already bound, keeping first token");
            return false;
        }

        self.groups
            .entry(token.to_string())
            .or_insert_with(|| TokenGroup::new(token))
            .join(id.clone());
        debug!(conn = %id, token, "connection bound to token");
        true
    }

    /// Forget a connection: drop it from the connection index and from the
    /// group it was bound to, if any.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(id)?;
        if let Some(token) = connection.token() {
            self.leave_group(token, id);
        }
        debug!(conn = %id, "connection unregistered");
        Some(connection)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn group(&self, token: &str) -> Option<&TokenGroup> {
        self.groups.get(token)
    }

    /// Registered connections currently indexed under `token`.
    pub fn connections_for_token(&self, token: &str) -> Vec<&Connection> {
        self.groups
            .get(token)
            .map(|group| {
                group
                    .members
                    .iter()
                    .filter_map(|id| self.connections.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn all_connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Tokens that currently have a group.
    pub fn tokens(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    /// Evict group members whose transport is closing or closed, or which are
    /// no longer registered at all. Returns the evicted ids.
    ///
    /// Eviction only touches the group index; the connection index is left to
    /// `unregister`.
    pub fn prune_dead_in_group(&mut self, token: &str) -> Vec<ConnectionId> {
        let Some(group) = self.groups.get_mut(token) else {
            return Vec::new();
        };

        let connections = &self.connections;
        let dead: Vec<ConnectionId> = group
            .members
            .iter()
            .filter(|id| connections.get(*id).is_none_or(Connection::is_closed))
            .cloned()
            .collect();

        for id in &dead {
            group.leave(id);
            debug!(conn = %id, token, "evicted dead connection from group");
        }
        if group.is_empty() {
            self.groups.remove(token);
        }
        dead
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn leave_group(&mut self, token: &str, id: &ConnectionId) {
        if let Some(group) = self.groups.get_mut(token) {
            group.leave(id);
            if group.is_empty() {
                self.groups.remove(token);
            }
        }
    }
}
