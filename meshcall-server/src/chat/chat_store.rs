use dashmap::DashMap;
use meshcall_core::{ChatMessage, RoomId};
use std::collections::VecDeque;
use std::sync::Arc;

/// In-memory, append-only chat history per room. Nothing survives a restart.
#[derive(Clone)]
pub struct ChatStore {
    rooms: Arc<DashMap<RoomId, VecDeque<ChatMessage>>>,
    capacity: usize,
}

impl ChatStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn append(&self, room: &RoomId, message: ChatMessage) {
        let mut history = self.rooms.entry(room.clone()).or_default();
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(message);
    }

    /// The last `limit` messages, oldest first.
    pub fn recent(&self, room: &RoomId, limit: usize) -> Vec<ChatMessage> {
        let Some(history) = self.rooms.get(room) else {
            return Vec::new();
        };
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }
}
