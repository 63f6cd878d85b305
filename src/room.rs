//! Room state
//!
//! Membership and history of one room. Owned exclusively by the room's
//! actor, so nothing here needs synchronization.

use crate::delivery::DeliverySender;
use crate::error::SendError;
use crate::history::HistoryLog;
use crate::model::{Message, User};

/// A present user and the channel their connection drains
#[derive(Debug)]
pub struct Member {
    pub user: User,
    pub sender: DeliverySender,
}

/// Membership and history of a room
///
/// Members keep their order of first entry; a re-entering user keeps the
/// slot of the membership it replaces.
#[derive(Debug, Default)]
pub struct RoomState {
    members: Vec<Member>,
    history: HistoryLog,
}

impl RoomState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a membership
    ///
    /// Returns the sender of the membership it replaced, if the user was
    /// already present. The caller is responsible for closing it.
    pub fn enter(&mut self, user: User, sender: DeliverySender) -> Option<DeliverySender> {
        let member = Member { user, sender };
        match self.position(&member.user.id) {
            Some(index) => {
                let old = std::mem::replace(&mut self.members[index], member);
                Some(old.sender)
            }
            None => {
                self.members.push(member);
                None
            }
        }
    }

    /// Remove a membership, returning it if it existed
    pub fn leave(&mut self, user_id: &str) -> Option<Member> {
        let index = self.position(user_id)?;
        Some(self.members.remove(index))
    }

    /// Check if a user is present
    pub fn contains(&self, user_id: &str) -> bool {
        self.position(user_id).is_some()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn members_mut(&mut self) -> impl Iterator<Item = &mut Member> {
        self.members.iter_mut()
    }

    /// Profiles of all present users, in membership order
    pub fn roster(&self) -> Vec<User> {
        self.members.iter().map(|m| m.user.clone()).collect()
    }

    /// Validate a send against current membership
    ///
    /// Checks run in a fixed order and the first failure wins.
    pub fn validate_send(&self, from: &str, to: &str, txt: &str) -> Result<(), SendError> {
        if txt.is_empty() {
            return Err(SendError::EmptyContent);
        }
        if !self.contains(from) {
            return Err(SendError::SenderNotFound);
        }
        if !to.is_empty() && !self.contains(to) {
            return Err(SendError::ReceiverNotFound);
        }
        Ok(())
    }

    /// Members that should receive a live copy of `msg`
    pub fn recipients<'a>(
        &'a mut self,
        msg: &'a Message,
    ) -> impl Iterator<Item = &'a mut Member> + 'a {
        self.members.iter_mut().filter(move |m| {
            !msg.private || m.user.id == msg.from || m.user.id == msg.to
        })
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryLog {
        &mut self.history
    }

    fn position(&self, user_id: &str) -> Option<usize> {
        self.members.iter().position(|m| m.user.id == user_id)
    }
}
