//! Room password credits
//!
//! Records which users have proven a room's password. Grants last for the
//! life of the process and are shared across rooms and connections.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use crate::types::{RoomId, UserId};

/// Process-wide (room, user) credit table
#[derive(Debug, Default)]
pub struct CreditStore {
    grants: RwLock<HashMap<RoomId, HashSet<UserId>>>,
}

impl CreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user_id` knows the password of `room_id` (idempotent)
    pub fn grant(&self, room_id: RoomId, user_id: &str) {
        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        grants
            .entry(room_id)
            .or_default()
            .insert(user_id.to_string());
    }

    pub fn has(&self, room_id: RoomId, user_id: &str) -> bool {
        let grants = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        grants
            .get(&room_id)
            .is_some_and(|users| users.contains(user_id))
    }

    pub fn revoke(&self, room_id: RoomId, user_id: &str) {
        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(users) = grants.get_mut(&room_id) {
            users.remove(user_id);
        }
    }

    /// Total number of grants across all rooms
    pub fn len(&self) -> usize {
        let grants = self.grants.read().unwrap_or_else(PoisonError::into_inner);
        grants.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
