//! Chat session — message lifecycle controller.
//!
//! DESIGN
//! ======
//! `ChatSession` owns the store behind an `Arc<Mutex<_>>` and hands each
//! workflow a [`Dispatch`] ticket:
//!
//! 1. `begin_*` (sync) validates input and appends the pending placeholder.
//!    When it returns, the placeholder is already visible.
//! 2. [`Dispatch::resolve`] (async) issues the one external call and settles
//!    the placeholder by id.
//!
//! The ticket holds only a `Weak` reference to the store. A call that
//! completes after the session is dropped settles nothing. A ticket dropped
//! before resolving settles its placeholder as an error, so nothing is left
//! pending forever.
//!
//! The lock is never held across an `.await`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::message::{Message, MessageId, Resolution, Status};
use super::notice::Notice;
use super::store::{MessageStore, StoreError};
use crate::api::{GenerateSqlRequest, RunSqlRequest, SaveSqlRequest, SqlBackend};
use crate::error::ErrorCode;

// =============================================================================
// USER-FACING TEXT
// =============================================================================

pub const GENERATING_TEXT: &str = "Generating SQL query...";
pub const GENERATED_TEXT: &str = "Here's the SQL query for your question:";
pub const GENERATE_FAILED_DEFAULT: &str = "Failed to generate SQL query";

pub const EXECUTING_TEXT: &str = "Executing SQL query...";
pub const EXECUTED_TEXT: &str = "Query executed successfully:";
pub const EXECUTE_FAILED_DEFAULT: &str = "Failed to execute SQL query";

pub const SAVING_TEXT: &str = "Saving query to Metabase...";
pub const SAVE_FAILED_DEFAULT: &str = "Failed to save to Metabase";

pub const CANCELLED_TEXT: &str = "Request was cancelled before it completed";

/// Name under which a query is saved.
#[must_use]
pub fn saved_query_name(original_question: &str) -> String {
    format!("Q: {original_question}")
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Input was empty after trimming. Nothing was appended.
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyInput(_) => "E_EMPTY_INPUT",
            Self::Store(e) => e.error_code(),
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One conversation. Create at session start, drop at session end.
pub struct ChatSession {
    store: Arc<Mutex<MessageStore>>,
    backend: Arc<dyn SqlBackend>,
    notices: mpsc::UnboundedSender<Notice>,
    in_flight: Arc<AtomicUsize>,
    dashboard_id: i64,
}

impl ChatSession {
    /// Create a session and the receiving end of its notice channel.
    #[must_use]
    pub fn new(backend: Arc<dyn SqlBackend>, dashboard_id: i64) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notices, rx) = mpsc::unbounded_channel();
        let session = Self {
            store: Arc::new(Mutex::new(MessageStore::new())),
            backend,
            notices,
            in_flight: Arc::new(AtomicUsize::new(0)),
            dashboard_id,
        };
        (session, rx)
    }

    #[must_use]
    pub fn dashboard_id(&self) -> i64 {
        self.dashboard_id
    }

    /// Number of calls issued and not yet settled.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // Begin: validate + append placeholder
    // -------------------------------------------------------------------------

    /// Append the user question and a pending reply.
    ///
    /// # Errors
    ///
    /// [`SessionError::EmptyInput`] for blank questions; the store is untouched.
    pub fn begin_question(&self, question: &str) -> Result<Dispatch, SessionError> {
        let question = non_empty(question, "question")?;
        let placeholder = {
            let mut store = self.lock();
            store.append(Message::user(question))?;
            store.append(Message::pending(GENERATING_TEXT))?
        };
        info!(%placeholder, question_len = question.len(), "chat: question submitted");
        Ok(self.dispatch(placeholder, Request::Generate { question: question.to_owned() }))
    }

    /// Append a pending reply for running `sql`.
    ///
    /// # Errors
    ///
    /// [`SessionError::EmptyInput`] for blank SQL.
    pub fn begin_run(&self, sql: &str) -> Result<Dispatch, SessionError> {
        let sql = non_empty(sql, "sql")?;
        let placeholder = self.lock().append(Message::pending(EXECUTING_TEXT))?;
        info!(%placeholder, sql_len = sql.len(), "chat: run requested");
        Ok(self.dispatch(placeholder, Request::Run { sql: sql.to_owned() }))
    }

    /// Append a pending reply for saving `sql` as `Q: {original_question}`.
    ///
    /// # Errors
    ///
    /// [`SessionError::EmptyInput`] for blank SQL.
    pub fn begin_save(&self, sql: &str, original_question: &str) -> Result<Dispatch, SessionError> {
        let sql = non_empty(sql, "sql")?;
        let placeholder = self.lock().append(Message::pending(SAVING_TEXT))?;
        info!(%placeholder, dashboard_id = self.dashboard_id, "chat: save requested");
        let request = SaveSqlRequest {
            sql: sql.to_owned(),
            name: Some(saved_query_name(original_question)),
            dashboard_id: Some(self.dashboard_id),
        };
        Ok(self.dispatch(placeholder, Request::Save(request)))
    }

    fn dispatch(&self, placeholder: MessageId, request: Request) -> Dispatch {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Dispatch {
            placeholder,
            request,
            store: Arc::downgrade(&self.store),
            backend: Arc::clone(&self.backend),
            notices: self.notices.clone(),
            in_flight: Arc::clone(&self.in_flight),
            settled: false,
        }
    }

    // -------------------------------------------------------------------------
    // Full workflows
    // -------------------------------------------------------------------------

    /// Ask a question and wait for the generated SQL. Returns the id of the
    /// assistant reply.
    ///
    /// # Errors
    ///
    /// Only validation errors; call failures settle the reply as `error`.
    pub async fn submit_question(&self, question: &str) -> Result<MessageId, SessionError> {
        let dispatch = self.begin_question(question)?;
        let id = dispatch.placeholder();
        dispatch.resolve().await;
        Ok(id)
    }

    /// Run `sql` and wait for its results. Returns the id of the reply.
    ///
    /// # Errors
    ///
    /// Only validation errors; call failures settle the reply as `error`.
    pub async fn run_query(&self, sql: &str) -> Result<MessageId, SessionError> {
        let dispatch = self.begin_run(sql)?;
        let id = dispatch.placeholder();
        dispatch.resolve().await;
        Ok(id)
    }

    /// Save `sql` and wait for confirmation. Returns the id of the reply.
    ///
    /// # Errors
    ///
    /// Only validation errors; call failures settle the reply as `error`.
    pub async fn save_query(&self, sql: &str, original_question: &str) -> Result<MessageId, SessionError> {
        let dispatch = self.begin_save(sql, original_question)?;
        let id = dispatch.placeholder();
        dispatch.resolve().await;
        Ok(id)
    }

    /// Replace the `sql` of one message. No call, no status change.
    /// Returns `false` if no message has that id.
    pub fn edit_sql(&self, id: MessageId, sql: &str) -> bool {
        let patched = self.lock().patch_sql(id, sql);
        if patched {
            debug!(%id, sql_len = sql.len(), "chat: sql edited");
        } else {
            debug!(%id, "chat: sql edit for unknown message ignored");
        }
        patched
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.lock().snapshot()
    }

    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.lock().get(id).cloned()
    }

    /// Message at a zero-based position.
    #[must_use]
    pub fn message_at(&self, index: usize) -> Option<Message> {
        self.lock().get_index(index).cloned()
    }

    #[must_use]
    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.lock().position(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, MessageStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Blank check only; callers keep the input exactly as given.
fn non_empty<'a>(input: &'a str, what: &'static str) -> Result<&'a str, SessionError> {
    if input.trim().is_empty() { Err(SessionError::EmptyInput(what)) } else { Ok(input) }
}

// =============================================================================
// DISPATCH
// =============================================================================

#[derive(Debug, Clone)]
enum Request {
    Generate { question: String },
    Run { sql: String },
    Save(SaveSqlRequest),
}

/// A placeholder that has been appended and whose call has not yet run.
#[must_use = "the placeholder stays pending until the dispatch is resolved"]
pub struct Dispatch {
    placeholder: MessageId,
    request: Request,
    store: Weak<Mutex<MessageStore>>,
    backend: Arc<dyn SqlBackend>,
    notices: mpsc::UnboundedSender<Notice>,
    in_flight: Arc<AtomicUsize>,
    settled: bool,
}

impl Dispatch {
    #[must_use]
    pub fn placeholder(&self) -> MessageId {
        self.placeholder
    }

    /// Issue the call and settle the placeholder.
    ///
    /// Returns the terminal status written, or `None` when the session is
    /// gone or the placeholder was already terminal.
    pub async fn resolve(mut self) -> Option<Status> {
        let id = self.placeholder;
        let (resolution, notice) = match &self.request {
            Request::Generate { question } => {
                let request = GenerateSqlRequest { question: question.clone() };
                match self.backend.generate_sql(&request).await {
                    Ok(resp) => (
                        Resolution::Generated { content: GENERATED_TEXT.into(), sql: resp.sql, question: question.clone() },
                        Notice::info(id, "SQL query generated successfully"),
                    ),
                    Err(e) => {
                        warn!(%id, code = e.error_code(), error = %e, "chat: generate failed");
                        let detail = e.describe(GENERATE_FAILED_DEFAULT);
                        (
                            Resolution::Failed { content: format!("Sorry, I encountered an error: {detail}") },
                            Notice::error(id, "Error generating SQL", detail),
                        )
                    }
                }
            }
            Request::Run { sql } => {
                let request = RunSqlRequest { sql: sql.clone() };
                match self.backend.run_sql(&request).await {
                    Ok(results) => {
                        let notice = Notice::info(id, format!("Query returned {} rows", results.row_count()));
                        (Resolution::Ran { content: EXECUTED_TEXT.into(), results }, notice)
                    }
                    Err(e) => {
                        warn!(%id, code = e.error_code(), error = %e, "chat: run failed");
                        let detail = e.describe(EXECUTE_FAILED_DEFAULT);
                        (
                            Resolution::Failed { content: format!("Error executing query: {detail}") },
                            Notice::error(id, "Query execution failed", detail),
                        )
                    }
                }
            }
            Request::Save(request) => match self.backend.save_sql(request).await {
                Ok(resp) => (
                    Resolution::Saved { content: format!("Successfully saved to Metabase as: \"{}\"", resp.card.name) },
                    Notice::info(id, "Query saved to Metabase successfully"),
                ),
                Err(e) => {
                    warn!(%id, code = e.error_code(), error = %e, "chat: save failed");
                    let detail = e.describe(SAVE_FAILED_DEFAULT);
                    (
                        Resolution::Failed { content: format!("Error saving to Metabase: {detail}") },
                        Notice::error(id, "Save failed", detail),
                    )
                }
            },
        };

        let status = self.settle(resolution);
        if status.is_some() {
            // Receiver may already be gone; notices are best-effort.
            let _ = self.notices.send(notice);
        }
        status
    }

    fn settle(&mut self, resolution: Resolution) -> Option<Status> {
        self.settled = true;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let Some(store) = self.store.upgrade() else {
            debug!(id = %self.placeholder, "chat: session gone, completion dropped");
            return None;
        };
        let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
        if store.settle(self.placeholder, resolution) {
            let status = store.get(self.placeholder).and_then(|m| m.status);
            info!(id = %self.placeholder, ?status, "chat: placeholder settled");
            status
        } else {
            warn!(id = %self.placeholder, "chat: placeholder missing or already settled");
            None
        }
    }
}

impl Drop for Dispatch {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(Resolution::Failed { content: CANCELLED_TEXT.into() });
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
