//! The `connection` module defines one live client session as seen by the relay.
//!
//! A `Connection` pairs a process-unique identifier with the sending side of
//! the per-connection outbound channel, the token the connection announced
//! (if any) and a transport status shared with the listener that owns the
//! socket.

pub mod connection;
pub use connection::{Connection, ConnectionId, ConnectionStatus, StatusHandle};
