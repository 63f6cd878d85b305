//! Chat domain records
//!
//! `User` is a room membership's public profile, `Message` an immutable
//! chat message. Both serialize with the field names clients depend on.

use serde::{Deserialize, Serialize};

use crate::ids::{unix_now, IdGenerator};
use crate::types::UserId;

/// Authenticated identity of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub name: String,
    pub admin: bool,
}

/// Public profile of a room member, as sent in roster frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "ID")]
    pub id: UserId,
    #[serde(rename = "Name")]
    pub name: String,
    /// Client address, diagnostic only
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "Admin")]
    pub admin: bool,
}

impl User {
    pub fn new(identity: &Identity, ip: impl Into<String>) -> Self {
        Self {
            id: identity.id.clone(),
            name: identity.name.clone(),
            ip: ip.into(),
            admin: identity.admin,
        }
    }
}

/// A chat message
///
/// `private` is only ever true when `to` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "From")]
    pub from: UserId,
    #[serde(rename = "To")]
    pub to: UserId,
    #[serde(rename = "Txt")]
    pub txt: String,
    /// Creation time, seconds since the Unix epoch
    #[serde(rename = "Time")]
    pub time: u64,
    #[serde(rename = "Priv")]
    pub private: bool,
}

impl Message {
    /// Build a message stamped with a fresh ID and the current time
    ///
    /// A private flag without a recipient is downgraded to broadcast.
    pub fn new(ids: &IdGenerator, from: UserId, to: UserId, txt: String, private: bool) -> Self {
        let private = private && !to.is_empty();
        Self {
            id: ids.next_message_id(),
            from,
            to,
            txt,
            time: unix_now(),
            private,
        }
    }

    /// Whether `user_id` may see this message
    pub fn visible_to(&self, user_id: &str) -> bool {
        !self.private || self.from == user_id || self.to == user_id
    }
}
