//! Bounded per-room message history

use std::collections::VecDeque;

use crate::model::Message;

/// Number of messages a room remembers
pub const HISTORY_CAPACITY: usize = 200;

/// Insertion-ordered ring of the most recent messages
///
/// Single-writer: only the owning room actor touches it.
#[derive(Debug)]
pub struct HistoryLog {
    entries: VecDeque<Message>,
    capacity: usize,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message, evicting the oldest once over capacity
    pub fn append(&mut self, msg: Message) {
        self.entries.push_back(msg);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Messages visible to `user_id`, oldest first
    pub fn snapshot(&self, user_id: &str) -> Vec<Message> {
        self.entries
            .iter()
            .filter(|m| m.visible_to(user_id))
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdGenerator;

    fn msg(ids: &IdGenerator, from: &str, to: &str, txt: &str, private: bool) -> Message {
        Message::new(ids, from.into(), to.into(), txt.into(), private)
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let ids = IdGenerator::new();
        let mut log = HistoryLog::new();

        for i in 0..=HISTORY_CAPACITY {
            log.append(msg(&ids, "alice", "", &format!("m{}", i), false));
        }

        assert_eq!(log.len(), HISTORY_CAPACITY);
        let snapshot = log.snapshot("alice");
        assert_eq!(snapshot.first().unwrap().txt, "m1");
        assert_eq!(snapshot.last().unwrap().txt, format!("m{}", HISTORY_CAPACITY));
        assert!(snapshot.iter().all(|m| m.txt != "m0"));
    }

    #[test]
    fn test_snapshot_filters_private_messages() {
        let ids = IdGenerator::new();
        let mut log = HistoryLog::new();
        log.append(msg(&ids, "alice", "", "hello all", false));
        log.append(msg(&ids, "alice", "bob", "psst", true));
        log.append(msg(&ids, "carol", "", "hey", false));

        let texts = |user: &str| -> Vec<String> {
            log.snapshot(user).into_iter().map(|m| m.txt).collect()
        };

        assert_eq!(texts("alice"), vec!["hello all", "psst", "hey"]);
        assert_eq!(texts("bob"), vec!["hello all", "psst", "hey"]);
        assert_eq!(texts("carol"), vec!["hello all", "hey"]);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let ids = IdGenerator::new();
        let mut log = HistoryLog::new();
        log.append(msg(&ids, "alice", "", "one", false));

        let _ = log.snapshot("bob");
        let _ = log.snapshot("alice");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_clear() {
        let ids = IdGenerator::new();
        let mut log = HistoryLog::with_capacity(3);
        log.append(msg(&ids, "alice", "", "one", false));
        log.append(msg(&ids, "alice", "", "two", false));

        log.clear();
        assert!(log.is_empty());
        assert!(log.snapshot("alice").is_empty());
    }
}
