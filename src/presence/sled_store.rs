//! Presence store backed by `sled`
//!
//! Records live in a dedicated `presence` tree keyed by the big-endian uid,
//! so a scan returns users in uid order. Marking a user online again
//! refreshes `since`.

use std::path::Path;

use chrono::Utc;
use sled::{Db, Tree};

use crate::presence::store::{PresenceRecord, PresenceStore};
use crate::utils::error::Result;

const PRESENCE_TREE: &str = "presence";

#[derive(Clone)]
pub struct SledPresenceStore {
    db: Db,
    tree: Tree,
}

impl SledPresenceStore {
    /// Open or create the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree(PRESENCE_TREE)?;
        Ok(Self { db, tree })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl PresenceStore for SledPresenceStore {
    fn set_online(&self, uid: u64) -> Result<()> {
        let record = PresenceRecord {
            uid,
            since: Utc::now().timestamp_millis(),
        };
        let serialized = serde_json::to_vec(&record)?;
        self.tree.insert(uid.to_be_bytes(), serialized)?;
        Ok(())
    }

    fn set_offline(&self, uid: u64) -> Result<()> {
        self.tree.remove(uid.to_be_bytes())?;
        Ok(())
    }

    fn is_online(&self, uid: u64) -> Result<bool> {
        Ok(self.tree.contains_key(uid.to_be_bytes())?)
    }

    fn online_users(&self) -> Result<Vec<PresenceRecord>> {
        let mut records = Vec::new();
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

impl std::fmt::Debug for SledPresenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledPresenceStore")
            .field("db", &"sled::Db")
            .field("online", &self.tree.len())
            .finish()
    }
}
