//! Token groups
//!
//! A `TokenGroup` holds the ids of the connections that announced the same
//! token. Members are stored in a `HashSet`, so announcing twice is a no-op.

use std::collections::HashSet;

use crate::connection::ConnectionId;

#[derive(Debug, Default)]
pub struct TokenGroup {
    pub token: String,
    pub members: HashSet<ConnectionId>,
}

impl TokenGroup {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            members: HashSet::new(),
        }
    }

    /// Add a member. Duplicate adds are ignored.
    pub fn join(&mut self, id: ConnectionId) {
        self.members.insert(id);
    }

    pub fn leave(&mut self, id: &ConnectionId) -> bool {
        self.members.remove(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.members.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }
}
