use crate::config::Settings;
use crate::handler::HandlerRegistry;
use crate::router::{CLIENT_ID, Message};
use crate::transport::bind;
use crate::transport::bridge::{emit, start_bridge_server};
use crate::transport::websocket::start_websocket_server;
use crate::worker::WorkerPool;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Relay {
    pool: Arc<WorkerPool>,
    ws_addr: SocketAddr,
    bridge_addr: SocketAddr,
}

async fn start_relay(max_connections: usize) -> Relay {
    let mut settings = Settings::default();
    settings.server.max_connections = max_connections;
    let pool = Arc::new(WorkerPool::new(1, Arc::new(HandlerRegistry::new())));

    let ws_listener = bind("127.0.0.1:0").await.unwrap();
    let bridge_listener = bind("127.0.0.1:0").await.unwrap();
    let ws_addr = ws_listener.local_addr().unwrap();
    let bridge_addr = bridge_listener.local_addr().unwrap();

    tokio::spawn(start_websocket_server(
        ws_listener,
        pool.clone(),
        settings.server.clone(),
    ));
    tokio::spawn(start_bridge_server(
        bridge_listener,
        pool.clone(),
        settings.bridge.clone(),
    ));

    Relay {
        pool,
        ws_addr,
        bridge_addr,
    }
}

async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}

impl Relay {
    fn group_size(&self, token: &str) -> usize {
        self.pool.workers()[0]
            .router()
            .lock_registry()
            .connections_for_token(token)
            .len()
    }

    async fn client(&self, token: &str) -> Client {
        let (mut ws, _) = connect_async(format!("ws://{}", self.ws_addr))
            .await
            .expect("WebSocket handshake failed");
        let before = self.group_size(token);
        send(&mut ws, &Message::new(CLIENT_ID, token)).await;
        eventually("registration", || self.group_size(token) > before).await;
        ws
    }
}

async fn send(ws: &mut Client, message: &Message) {
    ws.send(WsMessage::text(message.encode().unwrap()))
        .await
        .unwrap();
}

async fn recv(ws: &mut Client) -> Message {
    let frame = timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("no frame within timeout")
        .unwrap()
        .unwrap();
    Message::decode(frame.to_text().unwrap()).unwrap()
}

async fn assert_nothing(ws: &mut Client) {
    let next = timeout(Duration::from_millis(200), ws.next()).await;
    assert!(next.is_err(), "unexpected frame: {next:?}");
}

#[tokio::test]
async fn test_chat_reaches_other_groups_only() {
    let relay = start_relay(100).await;
    let mut a = relay.client("T1").await;
    let mut b = relay.client("T1").await;
    let mut c = relay.client("T2").await;

    let chat = Message::new("chat", "T2").with_field("text", "hello");
    send(&mut c, &chat).await;

    assert_eq!(recv(&mut a).await, chat);
    assert_eq!(recv(&mut b).await, chat);
    assert_nothing(&mut c).await;
}

#[tokio::test]
async fn test_bridge_event_is_retagged_per_destination() {
    let relay = start_relay(100).await;
    let mut a = relay.client("T1").await;
    let mut c = relay.client("T2").await;
    let mut d = relay.client("T3").await;

    let mut upstream = TcpStream::connect(relay.bridge_addr).await.unwrap();
    upstream
        .write_all(b"garbage\n{\"Type\":\"event\",\"AuthToken\":\"T1\",\"seq\":7}\n")
        .await
        .unwrap();

    for (ws, token) in [(&mut c, "T2"), (&mut d, "T3")] {
        let event = recv(ws).await;
        assert_eq!(event.message_type(), Some("event"));
        assert_eq!(event.token(), Some(token));
        assert_eq!(event.fields["seq"], 7);
    }
    assert_nothing(&mut a).await;
}

#[tokio::test]
async fn test_disconnect_unregisters() {
    let relay = start_relay(100).await;
    let mut a = relay.client("T1").await;
    assert_eq!(relay.pool.connection_count(), 1);

    a.close(None).await.unwrap();

    eventually("unregister", || relay.pool.connection_count() == 0).await;
    assert_eq!(relay.group_size("T1"), 0);
}

#[tokio::test]
async fn test_connection_limit_refuses_extra_clients() {
    let relay = start_relay(1).await;
    let _a = relay.client("T1").await;

    let refused = connect_async(format!("ws://{}", relay.ws_addr)).await;

    assert!(refused.is_err());
    assert_eq!(relay.pool.connection_count(), 1);
}

#[tokio::test]
async fn test_connection_limit_counts_pending_handshakes() {
    let relay = start_relay(1).await;

    // Accepted by the relay but never upgraded.
    let _stalled = TcpStream::connect(relay.ws_addr).await.unwrap();
    let refused = timeout(
        Duration::from_secs(2),
        connect_async(format!("ws://{}", relay.ws_addr)),
    )
    .await
    .expect("refused client should fail fast");

    assert!(refused.is_err());
    assert_eq!(relay.pool.connection_count(), 0);
}

#[tokio::test]
async fn test_emit_delivers_through_bridge() {
    let relay = start_relay(100).await;
    let _a = relay.client("T1").await;
    let mut c = relay.client("T2").await;

    let event = Message::new("event", "T1").with_field("seq", 1);
    emit(&relay.bridge_addr.to_string(), &event).await.unwrap();

    let received = recv(&mut c).await;
    assert_eq!(received.message_type(), Some("event"));
    assert_eq!(received.token(), Some("T2"));
    assert_eq!(received.fields["seq"], 1);
}
