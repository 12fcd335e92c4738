//! Who is typing where, with a freshness window.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::value_object::{RoomId, Timestamp, Username};

/// Per-room set of typing users.
///
/// Entries are written by explicit typing notices (true adds, false removes)
/// and additionally expire by age: a user whose last notice is older than the
/// TTL is filtered out at read time, so an abandoned "typing" never sticks.
/// Nothing is cleared on a timer; stale entries simply stop being visible.
pub struct TypingTracker {
    ttl: Duration,
    /// room -> (username -> last notice time)
    entries: HashMap<RoomId, HashMap<Username, Timestamp>>,
}

impl TypingTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Record a typing notice. Returns whether the visible set for the room
    /// may have changed (new typist, a stale entry refreshed, or a fresh
    /// entry removed).
    pub fn note(&mut self, room: RoomId, username: Username, typing: bool, now: Timestamp) -> bool {
        if typing {
            let fresh_before = self
                .entries
                .get(&room)
                .and_then(|room_entries| room_entries.get(&username))
                .is_some_and(|seen| self.is_fresh(*seen, now));
            self.entries.entry(room).or_default().insert(username, now);
            !fresh_before
        } else {
            let Some(room_entries) = self.entries.get_mut(&room) else {
                return false;
            };
            let removed = room_entries.remove(&username);
            if room_entries.is_empty() {
                self.entries.remove(&room);
            }
            removed.is_some_and(|seen| self.is_fresh(seen, now))
        }
    }

    /// Users typing in a room right now, sorted by name.
    pub fn typists(&self, room: &RoomId, now: Timestamp) -> Vec<Username> {
        let mut names: Vec<Username> = self
            .entries
            .get(room)
            .map(|room_entries| {
                room_entries
                    .iter()
                    .filter(|(_, seen)| self.is_fresh(**seen, now))
                    .map(|(username, _)| username.clone())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    fn is_fresh(&self, seen: Timestamp, now: Timestamp) -> bool {
        // a notice from the future (clock skew) counts as fresh
        now.value().saturating_sub(seen.value()) <= self.ttl.as_millis() as i64
    }
}
