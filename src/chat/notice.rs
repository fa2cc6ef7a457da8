//! Ephemeral notifications emitted when a workflow completes.

use super::message::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A short-lived toast. Not part of the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// The message whose completion produced this notice.
    pub message_id: MessageId,
    pub level: NoticeLevel,
    pub title: Option<String>,
    pub description: String,
}

impl Notice {
    pub fn info(message_id: MessageId, description: impl Into<String>) -> Self {
        Self { message_id, level: NoticeLevel::Info, title: None, description: description.into() }
    }

    pub fn error(message_id: MessageId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            message_id,
            level: NoticeLevel::Error,
            title: Some(title.into()),
            description: description.into(),
        }
    }
}
