//! End-to-end tests: a real relay on a random port, real WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parley::{
    ClientRegistry, MemoryStore, MessageStore, PersistenceGateway, RelayError,
    RelayServerBuilder, SqliteStore, StoredMessage,
};
use parley_transport::WebSocketConnection;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

type Registry = Arc<ClientRegistry<WebSocketConnection>>;

/// Starts a relay on a random port and returns its address and registry.
async fn start_server<S: MessageStore>(gateway: PersistenceGateway<S>) -> (String, Registry) {
    let server = RelayServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(gateway)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let registry = server.registry();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, registry)
}

async fn start_plain_server() -> (String, Registry) {
    start_server(PersistenceGateway::<MemoryStore>::disabled()).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

async fn login(ws: &mut ClientWs, name: &str) {
    send_json(ws, json!({"type": "login", "text": name})).await;
}

async fn say(ws: &mut ClientWs, text: &str) {
    send_json(ws, json!({"type": "textmsg", "text": text})).await;
}

/// Reads the next text frame as JSON, failing after a second.
async fn recv_json(ws: &mut ClientWs) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(1), ws.next())
        .await
        .expect("timed out waiting for a message")
        .expect("stream ended")
        .expect("recv");
    match msg {
        Message::Text(text) => serde_json::from_str(&text).expect("valid json"),
        other => panic!("expected text frame, got {other:?}"),
    }
}

/// Asserts nothing arrives within a short window.
async fn assert_silent(ws: &mut ClientWs) {
    let res = tokio::time::timeout(Duration::from_millis(100), ws.next()).await;
    assert!(res.is_err(), "expected no message, got {res:?}");
}

/// Polls the registry until it holds `n` clients.
async fn wait_for_clients(registry: &Registry, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while registry.len().await != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("registry never reached {n} clients"));
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_text_message_reaches_every_client_including_sender() {
    let (addr, registry) = start_plain_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;
    login(&mut alice, "alice").await;
    login(&mut bob, "bob").await;
    wait_for_clients(&registry, 2).await;

    say(&mut alice, "hello").await;

    for ws in [&mut alice, &mut bob] {
        let msg = recv_json(ws).await;
        assert_eq!(msg["type"], "textmsg");
        assert_eq!(msg["text"], "hello");
        assert_eq!(msg["sender"], "alice");
        let date: u64 = msg["date"].as_str().unwrap().parse().unwrap();
        assert!(date > 0);
    }
}

#[tokio::test]
async fn test_message_before_login_uses_default_nickname() {
    let (addr, registry) = start_plain_server().await;
    let mut anon = connect(&addr).await;
    wait_for_clients(&registry, 1).await;

    say(&mut anon, "who am i").await;

    let msg = recv_json(&mut anon).await;
    assert_eq!(msg["sender"], "Unknown");
    assert_eq!(msg["text"], "who am i");
}

#[tokio::test]
async fn test_client_supplied_sender_is_overwritten() {
    let (addr, registry) = start_plain_server().await;
    let mut alice = connect(&addr).await;
    login(&mut alice, "alice").await;
    wait_for_clients(&registry, 1).await;

    send_json(
        &mut alice,
        json!({"type": "textmsg", "text": "hi", "sender": "mallory", "date": "1"}),
    )
    .await;

    let msg = recv_json(&mut alice).await;
    assert_eq!(msg["sender"], "alice");
    assert_ne!(msg["date"], "1");
}

#[tokio::test]
async fn test_malformed_and_binary_frames_are_dropped() {
    let (addr, registry) = start_plain_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;
    wait_for_clients(&registry, 2).await;

    alice
        .send(Message::Text("not json".into()))
        .await
        .expect("send");
    alice
        .send(Message::Binary(vec![1, 2, 3].into()))
        .await
        .expect("send");
    send_json(&mut alice, json!({"type": "shout", "text": "x"})).await;

    assert_silent(&mut bob).await;

    // The connection survives and still relays.
    say(&mut alice, "still here").await;
    assert_eq!(recv_json(&mut bob).await["text"], "still here");
    assert_eq!(registry.len().await, 2);
}

#[tokio::test]
async fn test_login_produces_no_broadcast() {
    let (addr, registry) = start_plain_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;
    wait_for_clients(&registry, 2).await;

    login(&mut alice, "alice").await;

    assert_silent(&mut bob).await;
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_disconnect_removes_client_from_broadcasts() {
    let (addr, registry) = start_plain_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;
    wait_for_clients(&registry, 2).await;

    alice.close(None).await.expect("close");
    drop(alice);
    wait_for_clients(&registry, 1).await;

    say(&mut bob, "anyone?").await;
    assert_eq!(recv_json(&mut bob).await["text"], "anyone?");
}

#[tokio::test]
async fn test_abrupt_drop_removes_client() {
    let (addr, registry) = start_plain_server().await;
    let alice = connect(&addr).await;
    wait_for_clients(&registry, 1).await;

    // No close frame: the TCP stream just goes away.
    drop(alice);

    wait_for_clients(&registry, 0).await;
}

#[tokio::test]
async fn test_handshake_in_progress_survives_another_client_leaving() {
    let (addr, registry) = start_plain_server().await;
    let mut alice = connect(&addr).await;
    wait_for_clients(&registry, 1).await;

    // bob's TCP connection is accepted but his upgrade has not started.
    let bob_tcp = tokio::net::TcpStream::connect(&addr)
        .await
        .expect("tcp connect");
    tokio::time::sleep(Duration::from_millis(20)).await;

    alice.close(None).await.expect("close");
    drop(alice);
    wait_for_clients(&registry, 0).await;

    let (mut bob, _) = tokio_tungstenite::client_async(
        format!("ws://{addr}"),
        tokio_tungstenite::MaybeTlsStream::Plain(bob_tcp),
    )
    .await
    .expect("bob's handshake should complete");
    wait_for_clients(&registry, 1).await;

    say(&mut bob, "made it").await;
    assert_eq!(recv_json(&mut bob).await["text"], "made it");
}

#[tokio::test]
async fn test_silent_tcp_peer_does_not_block_other_clients() {
    let (addr, registry) = start_plain_server().await;

    // Opens TCP and never sends the upgrade request.
    let _silent = tokio::net::TcpStream::connect(&addr)
        .await
        .expect("tcp connect");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut alice = tokio::time::timeout(Duration::from_secs(3), connect(&addr))
        .await
        .expect("alice must not wait behind the silent peer");
    wait_for_clients(&registry, 1).await;

    say(&mut alice, "hi").await;
    assert_eq!(recv_json(&mut alice).await["text"], "hi");
}

#[tokio::test]
async fn test_login_replays_history_in_order() {
    let store = MemoryStore::with_records(vec![
        StoredMessage::new("alice", 1_700_000_000, "first"),
        StoredMessage::new("bob", 1_700_000_001, "second"),
    ]);
    let (addr, registry) = start_server(PersistenceGateway::enabled(store)).await;
    let mut carol = connect(&addr).await;
    wait_for_clients(&registry, 1).await;

    login(&mut carol, "carol").await;

    let first = recv_json(&mut carol).await;
    assert_eq!(first["type"], "textmsg");
    assert_eq!(first["sender"], "alice");
    assert_eq!(first["text"], "first");
    assert_eq!(first["date"], "1700000000");

    let second = recv_json(&mut carol).await;
    assert_eq!(second["sender"], "bob");
    assert_eq!(second["text"], "second");
    assert_silent(&mut carol).await;
}

#[tokio::test]
async fn test_messages_persist_to_sqlite_and_replay_to_new_clients() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("history.db");
    let gateway = PersistenceGateway::start(SqliteStore::open(&path));
    assert!(gateway.is_enabled());
    let (addr, registry) = start_server(gateway).await;

    let mut alice = connect(&addr).await;
    login(&mut alice, "alice").await;
    wait_for_clients(&registry, 1).await;
    say(&mut alice, "remember me").await;
    assert_eq!(recv_json(&mut alice).await["text"], "remember me");

    // The append lands after the broadcast; poll a second handle on the file.
    let reader = SqliteStore::open(&path).expect("reopen");
    tokio::time::timeout(Duration::from_secs(2), async {
        while reader.fetch_history().await.expect("fetch").is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("message never persisted");

    let mut bob = connect(&addr).await;
    login(&mut bob, "bob").await;
    let replayed = recv_json(&mut bob).await;
    assert_eq!(replayed["sender"], "alice");
    assert_eq!(replayed["text"], "remember me");
}

#[tokio::test]
async fn test_unopenable_database_runs_without_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    // A directory is not a database file.
    let gateway = PersistenceGateway::start(SqliteStore::open(dir.path()));
    assert!(!gateway.is_enabled());
    let (addr, registry) = start_server(gateway).await;

    let mut alice = connect(&addr).await;
    login(&mut alice, "alice").await;
    wait_for_clients(&registry, 1).await;
    say(&mut alice, "still relays").await;

    assert_eq!(recv_json(&mut alice).await["text"], "still relays");
}

#[tokio::test]
async fn test_run_until_stops_accepting_and_clears_clients() {
    let server = RelayServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(PersistenceGateway::<MemoryStore>::disabled())
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("local addr").to_string();
    let registry = server.registry();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    let _alice = connect(&addr).await;
    wait_for_clients(&registry, 1).await;

    stop_tx.send(()).expect("server still running");
    handle
        .await
        .expect("task should complete")
        .expect("clean shutdown");

    wait_for_clients(&registry, 0).await;
    let refused = tokio_tungstenite::connect_async(format!("ws://{addr}")).await;
    assert!(refused.is_err());
}

#[tokio::test]
async fn test_build_with_unusable_address_returns_transport_error() {
    let result = RelayServerBuilder::new()
        .bind("not an address")
        .build(PersistenceGateway::<MemoryStore>::disabled())
        .await;

    assert!(matches!(result, Err(RelayError::Transport(_))));
}
