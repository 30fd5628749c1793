//! The `presence` module records which users are currently online.
//!
//! The relay itself only reports lifecycle events (a user authenticated, a
//! user went offline). Storage sits behind `PresenceStore`; the shipped
//! implementation keeps one record per user in a `sled` tree.

pub mod sled_store;
pub mod store;

pub use sled_store::SledPresenceStore;
pub use store::{PresenceRecord, PresenceStore};
