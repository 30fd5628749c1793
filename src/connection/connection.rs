use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::error::SendError;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

pub type ConnectionId = String;

/// Transport-level state of a connection.
///
/// Transitions only move forward: `Open` -> `Closing` -> `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionStatus {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

impl ConnectionStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionStatus::Open,
            1 => ConnectionStatus::Closing,
            _ => ConnectionStatus::Closed,
        }
    }
}

/// Shared view of a connection's status.
///
/// The listener that owns the socket writes it; the registry only reads it
/// when deciding whether an indexed connection is still worth keeping.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle(Arc<AtomicU8>);

impl StatusHandle {
    pub fn get(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Advance the status. Attempts to move backwards are ignored.
    pub fn set(&self, status: ConnectionStatus) {
        self.0.fetch_max(status as u8, Ordering::AcqRel);
    }
}

/// A connected client.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Unique identifier, assigned at accept time.
    pub id: ConnectionId,

    /// Peer address, for logging only.
    pub remote_addr: Option<SocketAddr>,

    /// Channel to the task writing frames to this client's socket.
    pub sender: UnboundedSender<WsMessage>,

    token: Option<String>,
    status: StatusHandle,
}

impl Connection {
    /// Create an open, token-less connection around an outbound channel.
    pub fn new(sender: UnboundedSender<WsMessage>, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            remote_addr,
            sender,
            token: None,
            status: StatusHandle::default(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Set the token if none is set yet. Returns `true` when this call set it.
    pub(crate) fn assign_token(&mut self, token: &str) -> bool {
        if self.token.is_some() {
            return false;
        }
        self.token = Some(token.to_string());
        true
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.get()
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    /// A connection is considered dead once the transport started closing it
    /// or once its writer task has gone away.
    pub fn is_closed(&self) -> bool {
        self.status.get() != ConnectionStatus::Open || self.sender.is_closed()
    }

    /// Queue a frame for this connection. Never blocks.
    pub fn send(&self, frame: WsMessage) -> Result<(), SendError<WsMessage>> {
        self.sender.send(frame)
    }
}
