//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, command
//! parsing, and relaying room frames back to the client. A session is in at
//! most one room at a time.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::delivery::{DeliveryChannel, Frame};
use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::model::{Identity, User};
use crate::server::ChatServer;
use crate::types::{ConnectionId, RoomId};

type WsSender = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// Why a session loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Client closed the socket or the stream failed
    Disconnected,
    /// No traffic within the idle timeout
    Idle,
    /// Membership was taken over by another connection
    Kicked,
}

/// Per-connection state
struct Session {
    conn_id: ConnectionId,
    ip: String,
    identity: Option<Identity>,
    room: Option<RoomId>,
    delivery: Option<DeliveryChannel>,
}

impl Session {
    fn identity(&self) -> Result<&Identity, AppError> {
        self.identity.as_ref().ok_or(AppError::LoginRequired)
    }

    fn room(&self) -> Result<RoomId, AppError> {
        self.room.ok_or(AppError::NotInRoom)
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake and runs the session until the client
/// disconnects, goes idle, or is replaced by a newer connection.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    server: Arc<ChatServer>,
) -> Result<(), AppError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let mut session = Session {
        conn_id: ConnectionId::new(),
        ip: peer.ip().to_string(),
        identity: None,
        room: None,
        delivery: None,
    };
    info!("Connection {} opened from {}", session.conn_id, peer);

    let settings = server.session_settings();
    let mut keepalive = time::interval_at(Instant::now() + settings.keepalive, settings.keepalive);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let idle = time::sleep(settings.idle_timeout);
    tokio::pin!(idle);

    let exit = loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        idle.as_mut().reset(Instant::now() + settings.idle_timeout);
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(cmd) => handle_command(&server, &mut session, cmd).await,
                            Err(e) => {
                                warn!("Invalid JSON from {}: {}", session.conn_id, e);
                                Err(AppError::Json(e))
                            }
                        };
                        let reply = reply.unwrap_or_else(ServerMessage::from);
                        if send_json(&mut ws_sender, &reply).await.is_err() {
                            break Exit::Disconnected;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        debug!("Connection {} closed by client", session.conn_id);
                        break Exit::Disconnected;
                    }
                    Some(Ok(_)) => {
                        // Binary, ping and pong frames carry no commands
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", session.conn_id, e);
                        break Exit::Disconnected;
                    }
                }
            }
            frame = next_frame(&mut session.delivery) => {
                match frame {
                    Some(Frame::Close) => {
                        let _ = send_json(&mut ws_sender, &ServerMessage::Close).await;
                        break Exit::Kicked;
                    }
                    Some(frame) => {
                        if matches!(frame, Frame::Message(_)) {
                            idle.as_mut().reset(Instant::now() + settings.idle_timeout);
                        }
                        if send_json(&mut ws_sender, &ServerMessage::from(frame)).await.is_err() {
                            break Exit::Disconnected;
                        }
                    }
                    None => {
                        // Room released the membership
                        session.delivery = None;
                    }
                }
            }
            _ = keepalive.tick() => {
                if ws_sender.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break Exit::Disconnected;
                }
            }
            _ = &mut idle => {
                break Exit::Idle;
            }
        }
    };

    if exit != Exit::Kicked {
        leave_current_room(&server, &mut session).await;
    }
    let _ = ws_sender.close().await;

    info!("Connection {} ended ({:?})", session.conn_id, exit);
    Ok(())
}

/// Execute one client command and build the reply
async fn handle_command(
    server: &ChatServer,
    session: &mut Session,
    cmd: ClientMessage,
) -> Result<ServerMessage, AppError> {
    if let ClientMessage::Login { secret } = &cmd {
        if session.identity.is_some() {
            return Err(AppError::AlreadyLoggedIn);
        }
        let identity = server.login(secret)?;
        info!("Connection {} logged in as {}", session.conn_id, identity.id);
        session.identity = Some(identity.clone());
        return Ok(identity.into());
    }

    let identity = session.identity()?.clone();

    match cmd {
        ClientMessage::Login { .. } => Err(AppError::AlreadyLoggedIn),
        ClientMessage::ListRooms => Ok(ServerMessage::Rooms(server.list_rooms(&identity.id))),
        ClientMessage::Credit { room, password } => {
            server.check_room_credit(room, &identity.id, &password)?;
            Ok(ServerMessage::Credited { room })
        }
        ClientMessage::Enter { room } => {
            let room_id = server.resolve_room(room)?;
            let user = User::new(&identity, session.ip.clone());
            // A refused entry keeps the session where it was
            let delivery = server.enter_room(room_id, user).await?;
            // Re-entering the same room replaces the membership in place
            if session.room.is_some_and(|current| current != room_id) {
                leave_current_room(server, session).await;
            }
            session.room = Some(room_id);
            session.delivery = Some(delivery);

            let name = server.room(room_id)?.name().to_string();
            info!("Connection {} entered room {}", session.conn_id, room_id);
            Ok(ServerMessage::Entered {
                room: room_id,
                name,
            })
        }
        ClientMessage::Send { to, txt, private } => {
            let room_id = session.room()?;
            let msg = server
                .send_message(room_id, &identity.id, &to, &txt, private)
                .await?;
            Ok(ServerMessage::Sent { id: msg.id })
        }
        ClientMessage::FetchLog => {
            let room_id = session.room()?;
            let log = server.fetch_room_log(room_id, &identity.id).await?;
            Ok(ServerMessage::Log(log))
        }
        ClientMessage::ClearLog => {
            let room_id = session.room()?;
            if !identity.admin {
                return Err(AppError::AdminRequired);
            }
            server.clear_room_log(room_id).await?;
            Ok(ServerMessage::Cleared)
        }
        ClientMessage::Leave => {
            session.room()?;
            leave_current_room(server, session).await;
            Ok(ServerMessage::Left)
        }
    }
}

/// Leave the session's room, if any
async fn leave_current_room(server: &ChatServer, session: &mut Session) {
    session.delivery = None;
    let (Some(room_id), Some(identity)) = (session.room.take(), session.identity.as_ref()) else {
        return;
    };

    if let Err(e) = server.leave_room(room_id, &identity.id).await {
        error!("Failed to leave room {} for {}: {}", room_id, session.conn_id, e);
    }
}

/// Next frame from the room, or never if the session is not in one
async fn next_frame(delivery: &mut Option<DeliveryChannel>) -> Option<Frame> {
    match delivery {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_json(ws_sender: &mut WsSender, msg: &ServerMessage) -> Result<(), AppError> {
    let json = serde_json::to_string(msg)?;
    ws_sender.send(WsMessage::Text(json.into())).await?;
    Ok(())
}
