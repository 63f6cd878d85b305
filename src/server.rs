//! ChatServer implementation
//!
//! Command ingress for the transport layer: resolves rooms through the
//! directory and forwards each operation to the owning room actor. Holds no
//! chat state of its own.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::accounts::Accounts;
use crate::actor::{RoomHandle, RoomSettings};
use crate::config::{
    Config, RoomConfig, DEFAULT_IDLE_TIMEOUT_SECONDS, DEFAULT_KEEPALIVE_SECONDS, DEFAULT_ROOM_NAME,
};
use crate::credit::CreditStore;
use crate::delivery::DeliveryChannel;
use crate::directory::{RoomDirectory, RoomSummary};
use crate::error::AppError;
use crate::ids::IdGenerator;
use crate::model::{Identity, Message, User};
use crate::types::RoomId;

/// Connection timing shared by all sessions
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub keepalive: Duration,
    pub idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(DEFAULT_KEEPALIVE_SECONDS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECONDS),
        }
    }
}

/// The chat service
///
/// Built once at startup; rooms live for the life of the process.
#[derive(Debug)]
pub struct ChatServer {
    directory: RoomDirectory,
    accounts: Accounts,
    /// Set when no rooms were configured and a default room stands in
    implicit_room: Option<RoomId>,
    session: SessionSettings,
}

impl ChatServer {
    /// Build the server described by `config`
    pub async fn from_config(config: &Config, accounts: Accounts) -> Result<Self, AppError> {
        let session = SessionSettings {
            keepalive: config.keepalive,
            idle_timeout: config.idle_timeout,
        };
        Self::start(&config.rooms, accounts, config.room_settings(), session).await
    }

    /// Create every room and start its actor
    ///
    /// With no rooms given, one public room named `default` is created and
    /// used whenever a client does not name a room.
    pub async fn start(
        rooms: &[RoomConfig],
        accounts: Accounts,
        room_settings: RoomSettings,
        session: SessionSettings,
    ) -> Result<Self, AppError> {
        let mut directory = RoomDirectory::new(
            Arc::new(IdGenerator::new()),
            Arc::new(CreditStore::new()),
            room_settings,
        );

        let implicit_room = if rooms.is_empty() {
            let room = directory.add_room(DEFAULT_ROOM_NAME, "").await?;
            Some(room.id())
        } else {
            for room in rooms {
                directory.add_room(&room.name, &room.password).await?;
            }
            None
        };

        info!("ChatServer started with {} room(s)", directory.len());

        Ok(Self {
            directory,
            accounts,
            implicit_room,
            session,
        })
    }

    pub fn session_settings(&self) -> SessionSettings {
        self.session
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    /// Resolve a login secret to an identity
    pub fn login(&self, secret: &str) -> Result<Identity, AppError> {
        self.accounts
            .lookup(secret)
            .cloned()
            .ok_or(AppError::InvalidSecret)
    }

    /// Pick the room a client asked for
    ///
    /// Omitting the room is only allowed when the implicit default room is
    /// the single room.
    pub fn resolve_room(&self, requested: Option<RoomId>) -> Result<RoomId, AppError> {
        match requested {
            Some(id) => self.room(id).map(RoomHandle::id),
            None => self.implicit_room.ok_or(AppError::RoomRequired),
        }
    }

    pub fn room(&self, id: RoomId) -> Result<&RoomHandle, AppError> {
        self.directory.get_room(id).ok_or(AppError::RoomNotFound(id))
    }

    /// Join a room; private rooms require a prior credit
    pub async fn enter_room(&self, id: RoomId, user: User) -> Result<DeliveryChannel, AppError> {
        let room = self.room(id)?;
        if !self.directory.admits(room, &user.id) {
            debug!(room = %id, user = %user.id, "Entry refused, no credit");
            return Err(AppError::CreditRequired(id));
        }
        room.enter(user).await
    }

    pub async fn leave_room(&self, id: RoomId, user_id: &str) -> Result<(), AppError> {
        self.room(id)?.leave(user_id).await
    }

    pub async fn send_message(
        &self,
        id: RoomId,
        from: &str,
        to: &str,
        txt: &str,
        private: bool,
    ) -> Result<Message, AppError> {
        self.room(id)?.send(from, to, txt, private).await
    }

    pub async fn fetch_room_log(&self, id: RoomId, user_id: &str) -> Result<Vec<Message>, AppError> {
        self.room(id)?.fetch_log(user_id).await
    }

    pub async fn clear_room_log(&self, id: RoomId) -> Result<(), AppError> {
        self.room(id)?.clear_log().await
    }

    pub fn check_room_credit(&self, id: RoomId, user_id: &str, password: &str) -> Result<(), AppError> {
        self.directory.check_credit(id, user_id, password)
    }

    pub fn list_rooms(&self, user_id: &str) -> Vec<RoomSummary> {
        self.directory.list_rooms(user_id)
    }
}
