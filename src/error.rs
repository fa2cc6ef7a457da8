//! Shared error plumbing.
//!
//! Every module owns a `thiserror` enum. They all implement [`ErrorCode`] so
//! log lines and service error bodies carry a grepable `E_*` code.

/// Grepable error code and retryable flag.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
