use crate::model::identity::Member;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub content: String,
    pub kind: String,
    pub sender: Member,
    /// Milliseconds since the Unix epoch, relay clock.
    pub created_at: u64,
}

impl ChatMessage {
    pub fn new(sender: Member, content: String, kind: String) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Self {
            id: Uuid::new_v4(),
            content,
            kind,
            sender,
            created_at,
        }
    }
}
