//! Error types for the chat server
//!
//! Defines application-level errors and message send (validation) errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::RoomId;

/// Application-level errors
///
/// Covers fatal errors (connection termination, startup failure) and
/// business errors (reported to the client as an `error` frame).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal at startup)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - room actor mailbox closed)
    #[error("Channel send error")]
    ChannelSend,

    /// Room not found with the given ID
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// Rooms are configured, so the client must name one
    #[error("room is required")]
    RoomRequired,

    /// Submitted password does not match the room password
    #[error("wrong password")]
    WrongPassword,

    /// Room is private and the user has not proven its password
    #[error("password required for room {0}")]
    CreditRequired(RoomId),

    /// Startup configuration names more rooms than the directory holds
    #[error("too many rooms (max {0})")]
    TooManyRooms(usize),

    /// Command requires a logged-in identity
    #[error("Need login")]
    LoginRequired,

    /// Secret does not map to any account
    #[error("invalid secret")]
    InvalidSecret,

    /// Connection already has an identity
    #[error("already logged in")]
    AlreadyLoggedIn,

    /// Client is not in any room
    #[error("not in room")]
    NotInRoom,

    /// Command is reserved for the administrator
    #[error("admin required")]
    AdminRequired,

    /// Message was rejected by the room
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Message send errors
///
/// Produced by the room's validation of a send, checked in declaration
/// order: the first failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// Message text is empty
    #[error("content is empty")]
    EmptyContent,

    /// Sender is not a current member of the room
    #[error("sender not found")]
    SenderNotFound,

    /// Named recipient is not a current member of the room
    #[error("receiver not found")]
    ReceiverNotFound,
}
