//! Fault boundary: a panic while rendering shows a recovery screen instead
//! of taking the session down.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use colored::Colorize;
use tracing::error;

pub const FAULT_TITLE: &str = "Something went wrong";
pub const FAULT_HINT: &str = "An unexpected error occurred. Type /show to redraw the conversation.";

#[derive(Debug, Default)]
pub struct FaultBoundary {
    last_fault: Option<String>,
}

impl FaultBoundary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `draw`; on panic, remember the fault and return the recovery screen.
    pub fn render<F>(&mut self, draw: F) -> String
    where
        F: FnOnce() -> String,
    {
        match panic::catch_unwind(AssertUnwindSafe(draw)) {
            Ok(text) => text,
            Err(payload) => {
                let description = panic_message(payload.as_ref());
                error!(fault = %description, "render: caught panic");
                self.last_fault = Some(description);
                fault_screen()
            }
        }
    }

    /// Description of the most recent fault, shown only on request.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.last_fault.as_deref()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn fault_screen() -> String {
    format!("{}\n{}\n{}", FAULT_TITLE.red().bold(), FAULT_HINT, "Error details: /details".dimmed())
}

#[cfg(test)]
#[path = "boundary_test.rs"]
mod tests;
