//! Room directory
//!
//! Fixed-capacity registry of the rooms created at startup, plus the
//! password gate that feeds the credit store.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::actor::{RoomActor, RoomHandle, RoomSettings};
use crate::credit::CreditStore;
use crate::error::AppError;
use crate::ids::IdGenerator;
use crate::types::RoomId;

/// Most rooms a directory will hold
pub const MAX_ROOMS: usize = 20;

/// One room as a particular user is allowed to see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    #[serde(rename = "ID")]
    pub id: RoomId,
    #[serde(rename = "Name")]
    pub name: String,
    /// Present members; 0 for private rooms the user has not unlocked
    #[serde(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Private")]
    pub private: bool,
    #[serde(rename = "Credited")]
    pub credited: bool,
}

/// Registry of rooms by ID, in creation order
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: Vec<RoomHandle>,
    ids: Arc<IdGenerator>,
    credits: Arc<CreditStore>,
    settings: RoomSettings,
}

impl RoomDirectory {
    pub fn new(ids: Arc<IdGenerator>, credits: Arc<CreditStore>, settings: RoomSettings) -> Self {
        Self {
            rooms: Vec::new(),
            ids,
            credits,
            settings,
        }
    }

    /// Create a room and start its actor
    ///
    /// Only meant for startup: exceeding [`MAX_ROOMS`] or failing to open
    /// the room's audit file is an error the caller should treat as fatal.
    pub async fn add_room(&mut self, name: &str, password: &str) -> Result<RoomHandle, AppError> {
        if self.rooms.len() >= MAX_ROOMS {
            return Err(AppError::TooManyRooms(MAX_ROOMS));
        }

        let id = self.ids.next_room_id();
        let room = RoomActor::spawn(id, name, password, &self.settings, Arc::clone(&self.ids)).await?;
        info!(room = %id, name = %name, private = room.is_private(), "Room created");

        self.rooms.push(room.clone());
        Ok(room)
    }

    pub fn get_room(&self, id: RoomId) -> Option<&RoomHandle> {
        self.rooms.iter().find(|room| room.id() == id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn credits(&self) -> &CreditStore {
        &self.credits
    }

    /// Summaries of every room as `user_id` may see them
    pub fn list_rooms(&self, user_id: &str) -> Vec<RoomSummary> {
        self.rooms
            .iter()
            .map(|room| {
                let private = room.is_private();
                let credited = private && self.credits.has(room.id(), user_id);
                let count = if private && !credited {
                    0
                } else {
                    room.occupants()
                };
                RoomSummary {
                    id: room.id(),
                    name: room.name().to_string(),
                    count,
                    private,
                    credited,
                }
            })
            .collect()
    }

    /// Check a submitted room password
    ///
    /// Public rooms always pass without recording anything. For private
    /// rooms a match grants a credit, anything else (including an empty
    /// password) is rejected.
    pub fn check_credit(&self, id: RoomId, user_id: &str, password: &str) -> Result<(), AppError> {
        let room = self.get_room(id).ok_or(AppError::RoomNotFound(id))?;

        if !room.is_private() {
            return Ok(());
        }
        if password.is_empty() || !room.password_matches(password) {
            debug!(room = %id, user = %user_id, "Wrong room password");
            return Err(AppError::WrongPassword);
        }

        self.credits.grant(id, user_id);
        info!(room = %id, user = %user_id, "Room credit granted");
        Ok(())
    }

    /// Whether `user_id` may enter `room`
    pub fn admits(&self, room: &RoomHandle, user_id: &str) -> bool {
        !room.is_private() || self.credits.has(room.id(), user_id)
    }
}
