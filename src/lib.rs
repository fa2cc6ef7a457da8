//! # iris-ask
//!
//! Ask questions about your data and get SQL queries instantly.
//!
//! The crate is organised around one chat session per user: questions go in,
//! generated SQL comes back, and each assistant message can be edited, run
//! against Metabase, or saved as a Metabase question.
//!
//! - [`chat`]: message model, ordered message store, session lifecycle.
//! - [`api`]: the three calls a session makes and their HTTP client.
//! - [`render`] / [`repl`]: terminal presentation of a session.
//! - [`server`] / [`llm`]: the HTTP service answering those calls.
//! - [`schema`]: exports the schema context the SQL prompt embeds.

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod render;
pub mod repl;
pub mod schema;
pub mod server;
