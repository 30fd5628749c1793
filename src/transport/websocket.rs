//! Client WebSocket listener
//!
//! Each accepted socket is registered as a `Connection` on the worker the
//! pool picks for it, then served by two halves:
//! - a writer task draining the connection's channel into the socket
//! - the read loop, decoding text frames and handing them to the router
//!
//! The read loop owns cleanup. Whatever ends it, the connection is marked
//! closing and unregistered before the handler returns.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::config::ServerSettings;
use crate::connection::{Connection, ConnectionId, ConnectionStatus};
use crate::router::{Message, Origin, Router};
use crate::worker::WorkerPool;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Sockets accepted but not yet registered, so that the connection limit
/// also covers clients still in the WebSocket handshake.
#[derive(Debug, Clone, Default)]
pub struct PendingHandshakes(Arc<AtomicUsize>);

impl PendingHandshakes {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Count one more pending socket until the returned guard is dropped.
    pub fn enter(&self) -> HandshakeGuard {
        self.0.fetch_add(1, Ordering::AcqRel);
        HandshakeGuard(self.0.clone())
    }
}

pub struct HandshakeGuard(Arc<AtomicUsize>);

impl Drop for HandshakeGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Accept client sockets until the task is dropped.
pub async fn start_websocket_server(
    listener: TcpListener,
    pool: Arc<WorkerPool>,
    settings: ServerSettings,
) {
    if let Ok(addr) = listener.local_addr() {
        info!("WebSocket server listening on ws://{addr}");
    }

    let pending = PendingHandshakes::default();

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "failed to accept client connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        if pool.connection_count() + pending.count() >= settings.max_connections {
            warn!(%peer, limit = settings.max_connections, "connection limit reached, refusing client");
            continue;
        }

        let worker = pool.assign();
        debug!(%peer, worker = worker.index, "client assigned to worker");
        let guard = pending.enter();
        tokio::spawn(handle_connection(stream, peer, worker.router().clone(), guard));
    }
}

/// Serve one client socket to completion. `pending` is released once the
/// connection is registered or the handshake fails.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    pending: HandshakeGuard,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(%peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let connection = Connection::new(tx, Some(peer));
    let conn_id = connection.id.clone();
    let status = connection.status_handle();
    router.lock_registry().register(connection);
    drop(pending);

    let writer = {
        let conn_id = conn_id.clone();
        let status = status.clone();
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = ws_sender.send(frame).await {
                    debug!(conn = %conn_id, error = %e, "write failed, closing writer");
                    break;
                }
            }
            status.set(ConnectionStatus::Closed);
            let _ = ws_sender.close().await;
        })
    };

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                handle_text_frame(&router, &conn_id, text.as_str());
            }
            Ok(WsMessage::Close(_)) => {
                status.set(ConnectionStatus::Closing);
                break;
            }
            // Pings are answered by tungstenite; binary frames carry no messages.
            Ok(_) => {}
            Err(e) => {
                debug!(conn = %conn_id, error = %e, "read failed");
                break;
            }
        }
    }

    status.set(ConnectionStatus::Closing);
    // Dropping the registry's sender lets the writer drain and finish.
    router.lock_registry().unregister(&conn_id);
    let _ = writer.await;
    info!(conn = %conn_id, %peer, "client disconnected");
}

/// Decode one text frame and route it. Undecodable frames are dropped.
/// Returns how many frames the router queued.
pub fn handle_text_frame(router: &Router, conn_id: &ConnectionId, text: &str) -> usize {
    match Message::decode(text) {
        Ok(message) => router.route(&Origin::Client(conn_id.clone()), message),
        Err(e) => {
            debug!(
                conn = %conn_id,
                error = %e,
                frame = %text.chars().take(100).collect::<String>(),
                "dropping malformed client frame"
            );
            0
        }
    }
}
