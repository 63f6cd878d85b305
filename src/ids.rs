//! Room and message ID generation
//!
//! Two independent counters shared by every room. Room IDs are dense
//! integers starting at 0. Message IDs are `<base36 start time>-<sequence>`,
//! unique for the life of the process.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::RoomId;

/// Process-wide ID source
///
/// Safe to draw from concurrently; each draw is a single atomic increment.
#[derive(Debug)]
pub struct IdGenerator {
    prefix: String,
    next_room: AtomicU32,
    next_message: AtomicU64,
}

impl IdGenerator {
    /// Create a generator whose message prefix is the current Unix time
    pub fn new() -> Self {
        Self::with_start_time(unix_now())
    }

    /// Create a generator with an explicit start time (seconds since epoch)
    pub fn with_start_time(start: u64) -> Self {
        Self {
            prefix: to_base36(start),
            next_room: AtomicU32::new(0),
            next_message: AtomicU64::new(0),
        }
    }

    /// Draw the next room ID
    pub fn next_room_id(&self) -> RoomId {
        RoomId(self.next_room.fetch_add(1, Ordering::SeqCst))
    }

    /// Draw the next message ID
    pub fn next_message_id(&self) -> String {
        let seq = self.next_message.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, seq)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Current Unix time in seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if n == 0 {
        return "0".to_string();
    }

    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}
