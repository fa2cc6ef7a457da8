//! Chat session core.
//!
//! DESIGN
//! ======
//! A session is an ordered store of [`Message`]s plus a controller that runs
//! three workflows against a [`crate::api::SqlBackend`]: generate SQL, run
//! SQL, save SQL. Each workflow appends a `pending` assistant placeholder,
//! performs exactly one call, then settles the placeholder by id to
//! `success` or `error`.
//!
//! The store only grows. The two in-place writes it allows (settle by id,
//! patch `sql` by id) keep position and id, so completions that arrive out
//! of order never touch the wrong message.

pub mod message;
pub mod notice;
pub mod session;
pub mod store;

pub use message::{Message, MessageId, QueryResults, Resolution, Role, Status};
pub use notice::{Notice, NoticeLevel};
pub use session::{ChatSession, Dispatch, SessionError};
pub use store::{MessageStore, StoreError};
