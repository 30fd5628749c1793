//! Backend bridge listener
//!
//! Upstream services connect over plain TCP and write one JSON message per
//! line. Nothing is ever written back. Every decoded message is handed to
//! every worker as a backend-originated message.
//!
//! Bad input never closes a bridge connection: undecodable lines and lines
//! longer than `bridge.max_frame_bytes` are dropped and reading continues.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::config::BridgeSettings;
use crate::router::Message;
use crate::utils::error::RelayError;
use crate::worker::WorkerPool;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// One unit read off a bridge connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeFrame {
    Line(String),
    /// A line longer than the configured limit. Its bytes were discarded.
    Oversized,
}

/// `LinesCodec` that reports over-long lines as frames instead of errors,
/// so that a `FramedRead` over it keeps going after one.
#[derive(Debug)]
pub struct BridgeCodec {
    lines: LinesCodec,
}

impl BridgeCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_frame_bytes),
        }
    }

    fn wrap(
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<BridgeFrame>, LinesCodecError> {
        match result {
            Ok(line) => Ok(line.map(BridgeFrame::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(BridgeFrame::Oversized)),
            Err(e) => Err(e),
        }
    }
}

impl Decoder for BridgeCodec {
    type Item = BridgeFrame;
    type Error = LinesCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Self::wrap(self.lines.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Self::wrap(self.lines.decode_eof(src))
    }
}

/// Accept bridge connections until the task is dropped.
pub async fn start_bridge_server(
    listener: TcpListener,
    pool: Arc<WorkerPool>,
    settings: BridgeSettings,
) {
    if let Ok(addr) = listener.local_addr() {
        info!("Backend bridge listening on tcp://{addr}");
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "failed to accept bridge connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        if !settings.is_allowed(peer.ip()) {
            warn!(%peer, "bridge peer not in allowed_peers, refusing");
            continue;
        }

        info!(%peer, "bridge peer connected");
        tokio::spawn(handle_bridge_connection(
            stream,
            peer,
            pool.clone(),
            settings.max_frame_bytes,
        ));
    }
}

/// Read frames from one upstream until it disconnects.
pub async fn handle_bridge_connection(
    stream: TcpStream,
    peer: SocketAddr,
    pool: Arc<WorkerPool>,
    max_frame_bytes: usize,
) {
    let mut frames = FramedRead::new(stream, BridgeCodec::new(max_frame_bytes));

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(BridgeFrame::Line(line)) => {
                handle_bridge_line(&pool, &line);
            }
            Ok(BridgeFrame::Oversized) => {
                debug!(%peer, limit = max_frame_bytes, "dropping oversized bridge frame");
            }
            Err(e) => {
                warn!(%peer, error = %e, "bridge read failed");
                break;
            }
        }
    }
    info!(%peer, "bridge peer disconnected");
}

/// Decode one bridge line and route it through every worker. Blank and
/// undecodable lines are dropped. Returns how many frames were queued.
pub fn handle_bridge_line(pool: &WorkerPool, line: &str) -> usize {
    let line = line.trim();
    if line.is_empty() {
        return 0;
    }
    match Message::decode(line) {
        Ok(message) => pool.route_backend(&message),
        Err(e) => {
            debug!(
                error = %e,
                frame = %line.chars().take(100).collect::<String>(),
                "dropping malformed bridge frame"
            );
            0
        }
    }
}

/// Write one message to a bridge at `addr` and close the connection.
pub async fn emit(addr: &str, message: &Message) -> Result<(), RelayError> {
    let stream = TcpStream::connect(addr).await?;
    let mut frames = FramedWrite::new(stream, LinesCodec::new());
    frames.send(message.encode()?).await?;
    SinkExt::<String>::close(&mut frames).await?;
    Ok(())
}
