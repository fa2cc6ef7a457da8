//! Ordered, id-keyed message store.
//!
//! DESIGN
//! ======
//! Backed by an `IndexMap<MessageId, Message>`: iteration follows insertion
//! order, lookups by id are O(1), and in-place writes never move an entry.
//! Nothing is ever removed.

use indexmap::IndexMap;

use super::message::{Message, MessageId, Resolution};
use crate::error::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate message id: {0}")]
    DuplicateId(MessageId),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateId(_) => "E_DUPLICATE_MESSAGE_ID",
        }
    }
}

/// The sole mutable state of a chat session.
#[derive(Debug, Default)]
pub struct MessageStore {
    entries: IndexMap<MessageId, Message>,
}

impl MessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.entries.get(&id)
    }

    /// Message at a zero-based position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&Message> {
        self.entries.get_index(index).map(|(_, msg)| msg)
    }

    #[must_use]
    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.entries.get_index_of(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.values()
    }

    /// Append at the end.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if the id is already present.
    pub fn append(&mut self, message: Message) -> Result<MessageId, StoreError> {
        let id = message.id;
        if self.entries.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        self.entries.insert(id, message);
        Ok(id)
    }

    /// Replace the message with `id` in its slot. The replacement keeps `id`
    /// regardless of what it carried. Returns `false` if no message matches.
    pub fn replace(&mut self, id: MessageId, mut message: Message) -> bool {
        let Some(slot) = self.entries.get_mut(&id) else {
            return false;
        };
        message.id = id;
        *slot = message;
        true
    }

    /// Settle a pending message. Returns `false` for unknown ids and for
    /// messages that are already terminal.
    pub fn settle(&mut self, id: MessageId, resolution: Resolution) -> bool {
        self.entries
            .get_mut(&id)
            .is_some_and(|msg| msg.settle(resolution))
    }

    /// Overwrite the `sql` field only. Allowed in every status.
    pub fn patch_sql(&mut self, id: MessageId, sql: impl Into<String>) -> bool {
        let Some(msg) = self.entries.get_mut(&id) else {
            return false;
        };
        msg.sql = Some(sql.into());
        true
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
