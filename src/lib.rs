//! Multi-room WebSocket Chat Server Library
//!
//! A real-time chat service: clients log in, join one of a fixed set of
//! rooms, exchange broadcast or private messages and see a live roster.
//!
//! # Features
//! - Rooms created at startup, optionally password protected
//! - Broadcast and private messages
//! - Bounded per-room history (200 messages), filtered per reader
//! - Live roster on every enter/leave
//! - One session per identity: re-entering closes the older connection
//! - Append-only audit file per room
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - Each room is a `RoomActor` task owning its membership and history
//! - `ChatServer` routes commands to rooms through the `RoomDirectory`
//! - Each connection has a `handler` task draining its `DeliveryChannel`
//! - No locks guard room state - all mutation goes through the room's mailbox
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use roomchat::{handle_connection, Accounts, ChatServer, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().unwrap();
//!     let accounts = Accounts::load(&config.user_file).unwrap();
//!     let server = Arc::new(ChatServer::from_config(&config, accounts).await.unwrap());
//!     let listener = TcpListener::bind(&config.bind_address).await.unwrap();
//!
//!     while let Ok((stream, addr)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, addr, Arc::clone(&server)));
//!     }
//! }
//! ```

pub mod accounts;
pub mod actor;
pub mod config;
pub mod credit;
pub mod delivery;
pub mod directory;
pub mod error;
pub mod handler;
pub mod history;
pub mod ids;
pub mod message;
pub mod model;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use accounts::Accounts;
pub use actor::{RoomActor, RoomHandle, RoomSettings};
pub use config::{Config, RoomConfig};
pub use credit::CreditStore;
pub use delivery::{DeliveryChannel, Frame};
pub use directory::{RoomDirectory, RoomSummary};
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use history::HistoryLog;
pub use ids::IdGenerator;
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use model::{Identity, Message, User};
pub use server::{ChatServer, SessionSettings};
pub use types::{ConnectionId, RoomId, UserId};
