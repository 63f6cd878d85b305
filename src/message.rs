//! Message protocol definitions
//!
//! JSON-based bidirectional protocol. Client frames are tagged by `type`;
//! server frames carry an `event` kind and a `data` payload.

use serde::{Deserialize, Serialize};

use crate::delivery::Frame;
use crate::directory::RoomSummary;
use crate::error::{AppError, SendError};
use crate::model::{Identity, Message, User};
use crate::types::RoomId;

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate with an account secret (required first)
    Login { secret: String },
    /// List rooms as this user may see them
    ListRooms,
    /// Prove a room password
    Credit {
        room: RoomId,
        #[serde(default)]
        password: String,
    },
    /// Join a room; may be omitted when only the default room exists
    Enter {
        #[serde(default)]
        room: Option<RoomId>,
    },
    /// Send a message to the current room
    Send {
        #[serde(default)]
        to: String,
        #[serde(default)]
        txt: String,
        #[serde(default)]
        private: bool,
    },
    /// Ask for the current room's history again
    FetchLog,
    /// Empty the current room's history (admin only)
    ClearLog,
    /// Leave the current room
    Leave,
}

/// Server → Client message
///
/// Serialized as `{"event": <kind>, "data": <payload>}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Login accepted
    LoggedIn { id: String, name: String, admin: bool },
    /// Room listing
    Rooms(Vec<RoomSummary>),
    /// Room password accepted
    Credited { room: RoomId },
    /// Joined a room
    Entered { room: RoomId, name: String },
    /// Chat message
    #[serde(rename = "msg")]
    Message(Message),
    /// Full room roster
    #[serde(rename = "users")]
    Roster(Vec<User>),
    /// History snapshot
    Log(Vec<Message>),
    /// Connection taken over by a newer one for the same user
    Close,
    /// Message accepted by the room
    Sent { id: String },
    /// History cleared
    Cleared,
    /// Left the room
    Left,
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Command sent before login
    LoginRequired,
    /// Unknown secret
    InvalidSecret,
    /// Login sent twice
    AlreadyLoggedIn,
    /// Non-existent room ID
    RoomNotFound,
    /// Rooms are configured and none was named
    RoomRequired,
    /// Room password mismatch
    WrongPassword,
    /// Private room entered without credit
    CreditRequired,
    /// Room command without joining a room
    NotInRoom,
    /// Admin-only command
    AdminRequired,
    /// Empty message text
    ContentEmpty,
    /// Sender is not in the room
    SenderNotFound,
    /// Recipient is not in the room
    ReceiverNotFound,
    /// Invalid message format
    InvalidMessage,
    /// Server-side failure
    Internal,
}

impl From<Identity> for ServerMessage {
    fn from(identity: Identity) -> Self {
        ServerMessage::LoggedIn {
            id: identity.id,
            name: identity.name,
            admin: identity.admin,
        }
    }
}

impl From<Frame> for ServerMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Message(msg) => ServerMessage::Message(msg),
            Frame::Roster(users) => ServerMessage::Roster(users),
            Frame::Log(messages) => ServerMessage::Log(messages),
            Frame::Close => ServerMessage::Close,
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let code = match &err {
            AppError::LoginRequired => ErrorCode::LoginRequired,
            AppError::InvalidSecret => ErrorCode::InvalidSecret,
            AppError::AlreadyLoggedIn => ErrorCode::AlreadyLoggedIn,
            AppError::RoomNotFound(_) => ErrorCode::RoomNotFound,
            AppError::RoomRequired => ErrorCode::RoomRequired,
            AppError::WrongPassword => ErrorCode::WrongPassword,
            AppError::CreditRequired(_) => ErrorCode::CreditRequired,
            AppError::NotInRoom => ErrorCode::NotInRoom,
            AppError::AdminRequired => ErrorCode::AdminRequired,
            AppError::Send(SendError::EmptyContent) => ErrorCode::ContentEmpty,
            AppError::Send(SendError::SenderNotFound) => ErrorCode::SenderNotFound,
            AppError::Send(SendError::ReceiverNotFound) => ErrorCode::ReceiverNotFound,
            AppError::Json(_) => ErrorCode::InvalidMessage,
            // Fatal errors are not typically converted (connection closes)
            AppError::WebSocket(_)
            | AppError::Io(_)
            | AppError::ChannelSend
            | AppError::TooManyRooms(_) => ErrorCode::Internal,
        };
        let message = match code {
            ErrorCode::InvalidMessage => format!("Invalid message format: {}", err),
            ErrorCode::Internal => "Internal error".to_string(),
            _ => err.to_string(),
        };
        ServerMessage::Error { code, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_deserialize() {
        let json = r#"{"type": "login", "secret": "haha"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Login { secret } => assert_eq!(secret, "haha"),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_send_defaults() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "send", "txt": "hi"}"#).unwrap();
        match msg {
            ClientMessage::Send { to, txt, private } => {
                assert_eq!(to, "");
                assert_eq!(txt, "hi");
                assert!(!private);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_enter_without_room() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "enter"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Enter { room: None }));

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "enter", "room": 2}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Enter { room: Some(RoomId(2)) }));
    }

    #[test]
    fn test_frame_event_names() {
        let roster = serde_json::to_value(ServerMessage::from(Frame::Roster(vec![]))).unwrap();
        assert_eq!(roster, json!({"event": "users", "data": []}));

        let log = serde_json::to_value(ServerMessage::from(Frame::Log(vec![]))).unwrap();
        assert_eq!(log, json!({"event": "log", "data": []}));

        let close = serde_json::to_value(ServerMessage::from(Frame::Close)).unwrap();
        assert_eq!(close, json!({"event": "close"}));
    }

    #[test]
    fn test_message_frame_payload() {
        let msg = Message {
            id: "abc-1".into(),
            from: "alice".into(),
            to: String::new(),
            txt: "hi".into(),
            time: 1,
            private: false,
        };
        let value = serde_json::to_value(ServerMessage::from(Frame::Message(msg))).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "msg",
                "data": {"ID": "abc-1", "From": "alice", "To": "", "Txt": "hi", "Time": 1, "Priv": false}
            })
        );
    }

    #[test]
    fn test_error_serialize() {
        let msg = ServerMessage::from(AppError::Send(SendError::EmptyContent));
        let value = serde_json::to_value(msg).unwrap();
        assert_eq!(
            value,
            json!({"event": "error", "data": {"code": "content_empty", "message": "content is empty"}})
        );
    }

    #[test]
    fn test_fatal_errors_hide_details() {
        let msg = ServerMessage::from(AppError::ChannelSend);
        match msg {
            ServerMessage::Error { code, message } => {
                assert_eq!(code, ErrorCode::Internal);
                assert_eq!(message, "Internal error");
            }
            _ => panic!("Wrong variant"),
        }
    }
}
