//! Chat message log of one room.

use chrono::{DateTime, Utc};

use super::event::MessageId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub date: DateTime<Utc>,
    pub member: String,
    pub text: String,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(id: MessageId, member: String, text: String, date: DateTime<Utc>) -> Self {
        Self {
            id,
            date,
            member,
            text,
            edited_at: None,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Messages in server order.
///
/// Entries are appended in arrival order and never re-sorted; edits and
/// deletions are matched by id. Every mutation is idempotent.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|message| message.id == id)
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|message| message.id == id)
    }

    /// Append `message` unless its id is already known.
    ///
    /// Returns `true` if the log changed.
    pub fn insert(&mut self, message: ChatMessage) -> bool {
        if self.get(message.id).is_some() {
            tracing::debug!("Message {} already in log, ignored", message.id);
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Replace the text of message `id`.
    ///
    /// Returns `true` if the log changed; re-applying the same edit is a no-op.
    /// Deleted messages are never edited.
    pub fn edit(&mut self, id: MessageId, text: &str, edited_at: DateTime<Utc>) -> bool {
        let Some(message) = self.get_mut(id) else {
            tracing::debug!("Edit for unknown message {} ignored", id);
            return false;
        };
        if message.deleted_at.is_some() {
            tracing::debug!("Edit for deleted message {} ignored", id);
            return false;
        }
        if message.text == text && message.edited_at.is_some() {
            return false;
        }
        message.text = text.to_string();
        message.edited_at = Some(edited_at);
        true
    }

    /// Mark message `id` deleted; the first deletion time is kept.
    pub fn delete(&mut self, id: MessageId, deleted_at: DateTime<Utc>) -> bool {
        match self.get_mut(id) {
            Some(message) if message.deleted_at.is_none() => {
                message.deleted_at = Some(deleted_at);
                true
            }
            Some(_) => false,
            None => {
                tracing::debug!("Delete for unknown message {} ignored", id);
                false
            }
        }
    }
}
