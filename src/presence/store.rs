use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// One online user. `since` is milliseconds since the UNIX epoch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    pub uid: u64,
    pub since: i64,
}

pub trait PresenceStore: Send + Sync {
    fn set_online(&self, uid: u64) -> Result<()>;

    /// Removing a user that is not online is not an error.
    fn set_offline(&self, uid: u64) -> Result<()>;

    fn is_online(&self, uid: u64) -> Result<bool>;

    /// Online users ordered by uid.
    fn online_users(&self) -> Result<Vec<PresenceRecord>>;
}
