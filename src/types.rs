//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `RoomId`: dense integer room identifier, assigned once at room creation
//! - `ConnectionId`: UUID-based tag for one transport connection
//! - `UserId`: stable user handle, unique within a room at any instant

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable user handle (the account's display name)
pub type UserId = String;

/// Room identifier (newtype pattern)
///
/// Drawn from the process-wide [`IdGenerator`](crate::ids::IdGenerator),
/// starting at 0. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique connection identifier
///
/// Tags one WebSocket session in logs. A single user may have several
/// connections over time; only one of them is a room member at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_room_id_serializes_as_number() {
        let json = serde_json::to_string(&RoomId(7)).unwrap();
        assert_eq!(json, "7");

        let id: RoomId = serde_json::from_str("3").unwrap();
        assert_eq!(id, RoomId(3));
    }
}
