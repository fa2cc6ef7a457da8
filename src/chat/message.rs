//! Message — the single record type of a chat session.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// IDENTITY
// =============================================================================

/// Opaque message identifier. Assigned once at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// ROLE / STATUS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle of an assistant message: `pending → success | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Success,
    Error,
}

impl Status {
    /// Terminal statuses never transition again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Error)
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// Tabular payload produced by running a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResults {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

// =============================================================================
// MESSAGE
// =============================================================================

/// A single entry in the conversation.
///
/// `sql` and `results` are independent: a generated-SQL message carries
/// `sql`, a run message carries `results`, a save confirmation carries
/// neither. `status` is `None` for user messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub sql: Option<String>,
    pub original_question: Option<String>,
    pub results: Option<QueryResults>,
    pub status: Option<Status>,
    pub created_at: OffsetDateTime,
}

impl Message {
    /// A question typed by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None)
    }

    /// An assistant placeholder shown while a call is outstanding.
    pub fn pending(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), Some(Status::Pending))
    }

    fn new(role: Role, content: String, status: Option<Status>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            sql: None,
            original_question: None,
            results: None,
            status,
            created_at: now(),
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == Some(Status::Pending)
    }

    /// The question a save should be named after: the captured question,
    /// falling back to the message text.
    #[must_use]
    pub fn save_question(&self) -> &str {
        self.original_question.as_deref().unwrap_or(&self.content)
    }

    /// Move a pending message to its terminal state.
    ///
    /// Returns `false` and leaves the message untouched when it is not
    /// pending, which makes duplicate completion delivery a no-op.
    pub fn settle(&mut self, resolution: Resolution) -> bool {
        if !self.is_pending() {
            return false;
        }
        match resolution {
            Resolution::Generated { content, sql, question } => {
                self.content = content;
                self.sql = Some(sql);
                self.original_question = Some(question);
                self.status = Some(Status::Success);
            }
            Resolution::Ran { content, results } => {
                self.content = content;
                self.results = Some(results);
                self.status = Some(Status::Success);
            }
            Resolution::Saved { content } => {
                self.content = content;
                self.status = Some(Status::Success);
            }
            Resolution::Failed { content } => {
                self.content = content;
                self.status = Some(Status::Error);
            }
        }
        true
    }
}

/// Terminal outcome applied to a pending placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Generated { content: String, sql: String, question: String },
    Ran { content: String, results: QueryResults },
    Saved { content: String },
    Failed { content: String },
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
