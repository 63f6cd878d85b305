//! End-to-end sessions over a real WebSocket listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use roomchat::{
    handle_connection, Accounts, ChatServer, RoomConfig, RoomId, RoomSettings, SessionSettings,
};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const USERS: &str = "s-admin root\ns-alice alice\ns-bob bob\n";

async fn spawn_server(rooms: &[RoomConfig]) -> SocketAddr {
    spawn_server_with(rooms, SessionSettings::default()).await.0
}

async fn spawn_server_with(
    rooms: &[RoomConfig],
    session: SessionSettings,
) -> (SocketAddr, Arc<ChatServer>) {
    let log_dir = std::env::temp_dir().join(format!("roomchat-ws-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&log_dir).unwrap();

    let server = ChatServer::start(
        rooms,
        Accounts::parse(USERS),
        RoomSettings {
            log_dir,
            ..RoomSettings::default()
        },
        session,
    )
    .await
    .unwrap();
    let server = Arc::new(server);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepting = Arc::clone(&server);
    tokio::spawn(async move {
        while let Ok((stream, peer)) = listener.accept().await {
            tokio::spawn(handle_connection(stream, peer, Arc::clone(&accepting)));
        }
    });
    (addr, server)
}

fn lobby_and_vault() -> [RoomConfig; 2] {
    [
        RoomConfig {
            name: "lobby".into(),
            password: String::new(),
        },
        RoomConfig {
            name: "vault".into(),
            password: "secret".into(),
        },
    ]
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    ws
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Next JSON frame from the server, or None once the socket closes
async fn recv(ws: &mut Client) -> Option<Value> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for server frame")?;
        match msg {
            Ok(Message::Text(text)) => return Some(serde_json::from_str(&text).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

/// Skip frames until one with the given event kind
async fn expect_event(ws: &mut Client, event: &str) -> Value {
    loop {
        let frame = recv(ws).await.expect("socket closed");
        if frame["event"] == event {
            return frame;
        }
    }
}

async fn login_and_enter(addr: SocketAddr, secret: &str, room: Option<u32>) -> Client {
    let mut ws = connect(addr).await;
    send(&mut ws, json!({"type": "login", "secret": secret})).await;
    expect_event(&mut ws, "logged_in").await;
    match room {
        Some(id) => send(&mut ws, json!({"type": "enter", "room": id})).await,
        None => send(&mut ws, json!({"type": "enter"})).await,
    }
    expect_event(&mut ws, "entered").await;
    expect_event(&mut ws, "log").await;
    ws
}

#[tokio::test]
async fn commands_before_login_are_rejected() {
    let addr = spawn_server(&[]).await;
    let mut ws = connect(addr).await;

    send(&mut ws, json!({"type": "list_rooms"})).await;
    let frame = recv(&mut ws).await.unwrap();
    assert_eq!(frame["event"], "error");
    assert_eq!(frame["data"]["code"], "login_required");

    send(&mut ws, json!({"type": "login", "secret": "wrong"})).await;
    let frame = recv(&mut ws).await.unwrap();
    assert_eq!(frame["data"]["code"], "invalid_secret");

    send(&mut ws, json!({"type": "login", "secret": "s-alice"})).await;
    let frame = recv(&mut ws).await.unwrap();
    assert_eq!(
        frame,
        json!({"event": "logged_in", "data": {"id": "alice", "name": "alice", "admin": false}})
    );
}

#[tokio::test]
async fn broadcast_between_two_sessions() {
    let addr = spawn_server(&[]).await;
    let mut alice = login_and_enter(addr, "s-alice", None).await;
    let mut bob = login_and_enter(addr, "s-bob", None).await;

    let roster = expect_event(&mut alice, "users").await;
    assert_eq!(roster["data"][0]["ID"], "alice");

    send(&mut alice, json!({"type": "send", "txt": "hi"})).await;
    let sent = expect_event(&mut alice, "sent").await;

    for ws in [&mut alice, &mut bob] {
        let msg = expect_event(ws, "msg").await;
        assert_eq!(msg["data"]["Txt"], "hi");
        assert_eq!(msg["data"]["To"], "");
        assert_eq!(msg["data"]["Priv"], false);
        assert_eq!(msg["data"]["ID"], sent["data"]["id"]);
    }
}

#[tokio::test]
async fn send_errors_are_reported() {
    let addr = spawn_server(&[]).await;
    let mut alice = login_and_enter(addr, "s-alice", None).await;

    send(&mut alice, json!({"type": "send", "txt": ""})).await;
    let err = expect_event(&mut alice, "error").await;
    assert_eq!(err["data"]["code"], "content_empty");
    assert_eq!(err["data"]["message"], "content is empty");

    send(&mut alice, json!({"type": "send", "txt": "psst", "to": "bob", "private": true})).await;
    let err = expect_event(&mut alice, "error").await;
    assert_eq!(err["data"]["code"], "receiver_not_found");
}

#[tokio::test]
async fn second_session_kicks_first() {
    let addr = spawn_server(&[]).await;
    let mut first = login_and_enter(addr, "s-alice", None).await;
    let _second = login_and_enter(addr, "s-alice", None).await;

    let close = expect_event(&mut first, "close").await;
    assert_eq!(close, json!({"event": "close"}));
    assert!(recv(&mut first).await.is_none());
}

#[tokio::test]
async fn private_room_requires_credit() {
    let addr = spawn_server(&lobby_and_vault()).await;
    let mut ws = connect(addr).await;
    send(&mut ws, json!({"type": "login", "secret": "s-bob"})).await;
    expect_event(&mut ws, "logged_in").await;

    send(&mut ws, json!({"type": "enter"})).await;
    assert_eq!(expect_event(&mut ws, "error").await["data"]["code"], "room_required");

    send(&mut ws, json!({"type": "enter", "room": 1})).await;
    assert_eq!(expect_event(&mut ws, "error").await["data"]["code"], "credit_required");

    send(&mut ws, json!({"type": "credit", "room": 1, "password": "nope"})).await;
    assert_eq!(expect_event(&mut ws, "error").await["data"]["code"], "wrong_password");

    send(&mut ws, json!({"type": "list_rooms"})).await;
    let rooms = expect_event(&mut ws, "rooms").await;
    assert_eq!(rooms["data"][1]["Private"], true);
    assert_eq!(rooms["data"][1]["Credited"], false);

    send(&mut ws, json!({"type": "credit", "room": 1, "password": "secret"})).await;
    assert_eq!(expect_event(&mut ws, "credited").await["data"]["room"], 1);

    send(&mut ws, json!({"type": "enter", "room": 1})).await;
    let entered = expect_event(&mut ws, "entered").await;
    assert_eq!(entered["data"]["name"], "vault");
}

#[tokio::test]
async fn clear_log_is_admin_only() {
    let addr = spawn_server(&[]).await;
    let mut alice = login_and_enter(addr, "s-alice", None).await;
    let mut root = login_and_enter(addr, "s-admin", None).await;

    send(&mut alice, json!({"type": "send", "txt": "one"})).await;
    expect_event(&mut alice, "sent").await;

    send(&mut alice, json!({"type": "clear_log"})).await;
    assert_eq!(expect_event(&mut alice, "error").await["data"]["code"], "admin_required");

    send(&mut root, json!({"type": "clear_log"})).await;
    expect_event(&mut root, "cleared").await;

    send(&mut root, json!({"type": "fetch_log"})).await;
    let log = expect_event(&mut root, "log").await;
    assert_eq!(log["data"], json!([]));
}

#[tokio::test]
async fn disconnect_leaves_room() {
    let addr = spawn_server(&[]).await;
    let mut alice = login_and_enter(addr, "s-alice", None).await;
    let bob = login_and_enter(addr, "s-bob", None).await;

    // Wait for the roster listing both users
    loop {
        let roster = expect_event(&mut alice, "users").await;
        if roster["data"].as_array().unwrap().len() == 2 {
            break;
        }
    }

    drop(bob);

    loop {
        let roster = expect_event(&mut alice, "users").await;
        let users = roster["data"].as_array().unwrap();
        if users.len() == 1 {
            assert_eq!(users[0]["ID"], "alice");
            break;
        }
    }
}

#[tokio::test]
async fn refused_enter_keeps_current_room() {
    let (addr, server) = spawn_server_with(&lobby_and_vault(), SessionSettings::default()).await;
    let mut bob = login_and_enter(addr, "s-bob", Some(0)).await;

    send(&mut bob, json!({"type": "enter", "room": 1})).await;
    assert_eq!(expect_event(&mut bob, "error").await["data"]["code"], "credit_required");

    send(&mut bob, json!({"type": "send", "txt": "still here"})).await;
    expect_event(&mut bob, "sent").await;
    assert_eq!(expect_event(&mut bob, "msg").await["data"]["Txt"], "still here");

    // Switching rooms once credited releases the lobby membership
    send(&mut bob, json!({"type": "credit", "room": 1, "password": "secret"})).await;
    expect_event(&mut bob, "credited").await;
    send(&mut bob, json!({"type": "enter", "room": 1})).await;
    expect_event(&mut bob, "entered").await;

    let lobby = server.room(RoomId(0)).unwrap().roster().await.unwrap();
    assert!(lobby.is_empty());
    let vault = server.room(RoomId(1)).unwrap().roster().await.unwrap();
    assert_eq!(vault.len(), 1);
    assert_eq!(vault[0].id, "bob");
}

#[tokio::test]
async fn idle_session_leaves_room() {
    let session = SessionSettings {
        keepalive: Duration::from_secs(60),
        idle_timeout: Duration::from_secs(1),
    };
    let (addr, server) = spawn_server_with(&[], session).await;
    let room = server.resolve_room(None).unwrap();
    let mut alice = login_and_enter(addr, "s-alice", None).await;

    // The server closes the socket once the session has been quiet too long
    while recv(&mut alice).await.is_some() {}

    let roster = server.room(room).unwrap().roster().await.unwrap();
    assert!(roster.is_empty());
}
