//! The `transport` module owns the relay's two listeners.
//!
//! - `websocket`: the client-facing WebSocket listener. Every accepted
//!   socket becomes a `Connection` on one worker.
//! - `bridge`: the backend listener. Trusted upstream services write
//!   newline-delimited JSON messages; each one is handed to every worker.
//!
//! Both listeners decode frames into `Message`s and leave every routing
//! decision to the `Router`.

pub mod bridge;
pub mod websocket;

use tokio::net::TcpListener;
use tracing::info;

use crate::utils::error::{RelayError, Result};

/// Bind a TCP listener, naming the address in the error on failure.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| RelayError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!(addr = %listener.local_addr()?, "listener bound");
    Ok(listener)
}


#[cfg(test)]
mod websocket_tests;
