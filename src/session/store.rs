//! Bounded, persisted per-room message history.

use std::collections::{HashMap, VecDeque};

use crate::domain::{Message, value_object::RoomId};
use crate::infrastructure::storage::{MessageSnapshot, SnapshotStorage, StoreSnapshot};

/// Owner of all known rooms and their histories.
///
/// Rooms are kept in registration order and never forgotten; the default
/// room `general` is always a member. Each room's history is a FIFO bounded
/// by the configured cap (oldest evicted first). Every mutation persists a
/// fresh snapshot; persistence failures are logged and never propagated.
///
/// Duplicate deliveries are not detected; the store is arrival-ordered and
/// appends whatever the protocol layer hands it.
pub struct MessageStore {
    storage: Box<dyn SnapshotStorage>,
    /// Known rooms in registration order
    rooms: Vec<RoomId>,
    histories: HashMap<RoomId, VecDeque<Message>>,
    /// Messages sent from this client, across all sessions
    sent_count: u64,
    cap: usize,
}

impl MessageStore {
    /// Build a store, merging any persisted snapshot into the defaults.
    ///
    /// A missing snapshot starts empty; a corrupt one degrades to empty
    /// with a warning. Individually invalid rooms or messages inside an
    /// otherwise readable snapshot are skipped, not fatal.
    pub async fn load(storage: Box<dyn SnapshotStorage>, cap: usize) -> Self {
        let mut store = Self {
            storage,
            rooms: Vec::new(),
            histories: HashMap::new(),
            sent_count: 0,
            cap,
        };
        store.ensure_room(&RoomId::general());
        match store.storage.load().await {
            Ok(Some(snapshot)) => store.merge_snapshot(snapshot),
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to load message store snapshot: {}", e),
        }
        store
    }

    /// Known rooms in registration order
    pub fn known_rooms(&self) -> Vec<RoomId> {
        self.rooms.clone()
    }

    pub fn contains_room(&self, room: &RoomId) -> bool {
        self.histories.contains_key(room)
    }

    /// Register a room; returns whether it was new. New rooms persist.
    pub async fn register_room(&mut self, room: RoomId) -> bool {
        let added = self.ensure_room(&room);
        if added {
            self.persist().await;
        }
        added
    }

    /// Append a message to its room, registering the room if necessary.
    pub async fn append(&mut self, message: Message) {
        let room = message.room_id.clone();
        self.push_bounded(&room, message);
        self.persist().await;
    }

    /// History for a room, oldest first. Unknown rooms yield an empty list.
    pub fn history_for(&self, room: &RoomId) -> Vec<Message> {
        self.histories
            .get(room)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Count a successfully sent message
    pub async fn record_sent(&mut self) {
        self.sent_count += 1;
        self.persist().await;
    }

    pub fn sent_count(&self) -> u64 {
        self.sent_count
    }

    fn ensure_room(&mut self, room: &RoomId) -> bool {
        if self.histories.contains_key(room) {
            return false;
        }
        self.rooms.push(room.clone());
        self.histories.insert(room.clone(), VecDeque::new());
        true
    }

    fn push_bounded(&mut self, room: &RoomId, message: Message) {
        if self.cap == 0 {
            return;
        }
        self.ensure_room(room);
        if let Some(history) = self.histories.get_mut(room) {
            if history.len() >= self.cap {
                history.pop_front();
            }
            history.push_back(message);
        }
    }

    fn merge_snapshot(&mut self, snapshot: StoreSnapshot) {
        self.sent_count = snapshot.message_count;
        for room_name in snapshot.known_rooms {
            match RoomId::new(room_name) {
                Ok(room) => {
                    self.ensure_room(&room);
                }
                Err(e) => tracing::warn!("Skipping invalid room in snapshot: {}", e),
            }
        }
        for (room_name, messages) in snapshot.messages {
            let room = match RoomId::new(room_name) {
                Ok(room) => room,
                Err(e) => {
                    tracing::warn!("Skipping messages for invalid room in snapshot: {}", e);
                    continue;
                }
            };
            for message_snapshot in messages {
                match message_snapshot.into_message(&room) {
                    Ok(message) => self.push_bounded(&room, message),
                    Err(e) => {
                        tracing::warn!("Skipping invalid message in snapshot for '{}': {}", room, e)
                    }
                }
            }
        }
    }

    fn snapshot(&self) -> StoreSnapshot {
        let mut snapshot = StoreSnapshot {
            known_rooms: self.rooms.iter().map(|r| r.as_str().to_string()).collect(),
            message_count: self.sent_count,
            ..StoreSnapshot::default()
        };
        for (room, history) in &self.histories {
            snapshot.messages.insert(
                room.as_str().to_string(),
                history.iter().map(MessageSnapshot::from).collect(),
            );
        }
        snapshot
    }

    async fn persist(&self) {
        if let Err(e) = self.storage.save(&self.snapshot()).await {
            tracing::warn!("Failed to persist message store: {}", e);
        }
    }
}
