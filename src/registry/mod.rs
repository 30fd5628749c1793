//! The `registry` module holds the in-memory index of live connections.
//!
//! Two indexes are kept: every registered connection by id, and the
//! connections grouped by the token they announced. The registry performs no
//! I/O; callers that share it between tasks wrap it in a lock.

pub mod engine;
pub mod group;

pub use engine::Registry;
pub use group::TokenGroup;
