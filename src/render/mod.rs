//! Terminal presentation of a chat session.
//!
//! DESIGN
//! ======
//! Every function here returns a `String`; the REPL decides when to print.
//! Messages are numbered from 1 so commands like `/run 2` can refer to them.
//! Colours come from `colored` and disappear automatically when stdout is
//! not a terminal.

pub mod boundary;
pub mod sql;

use colored::Colorize;
use serde_json::Value;
use time::macros::format_description;

use crate::chat::{Message, Notice, NoticeLevel, QueryResults, Role, Status};

pub use boundary::FaultBoundary;

// =============================================================================
// MESSAGES
// =============================================================================

/// Header line: position, author badge, local time and status mark.
#[must_use]
pub fn header(message: &Message, position: usize) -> String {
    let badge = match message.role {
        Role::User => "You".cyan().bold(),
        Role::Assistant => "AI Assistant".magenta().bold(),
    };
    let time = message
        .created_at
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default();
    let mut line = format!("[{position}] {badge}  {}", time.dimmed());
    if let Some(status) = message.status {
        line.push_str("  ");
        line.push_str(&status_mark(status));
    }
    line
}

fn status_mark(status: Status) -> String {
    match status {
        Status::Pending => "...".yellow().to_string(),
        Status::Success => "✓".green().to_string(),
        Status::Error => "✗".red().to_string(),
    }
}

/// One message with its SQL block and result table, if any.
#[must_use]
pub fn message(message: &Message, position: usize) -> String {
    let mut out = vec![header(message, position)];

    let content = if message.status == Some(Status::Error) {
        message.content.red().to_string()
    } else {
        message.content.clone()
    };
    out.push(content);

    if let Some(sql) = &message.sql {
        out.push("Generated SQL:".bold().to_string());
        out.extend(sql::highlight(sql).lines().map(|l| format!("  {l}")));
        out.push(
            format!("/run {position} · /save {position} · /edit {position} <sql>")
                .dimmed()
                .to_string(),
        );
    }

    if let Some(results) = &message.results {
        out.push("Query Results:".bold().to_string());
        out.push(table(results));
        out.push(
            format!("{} rows returned", results.row_count())
                .dimmed()
                .to_string(),
        );
    }

    out.join("\n")
}

/// The whole conversation, or the welcome card when it is empty.
#[must_use]
pub fn transcript(messages: &[Message]) -> String {
    if messages.is_empty() {
        return welcome();
    }
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| message(m, i + 1))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[must_use]
pub fn welcome() -> String {
    [
        "Welcome to AI SQL Assistant".bold().to_string(),
        "Ask questions about your data in natural language and I'll generate SQL queries for you.".to_string(),
        "  • Generate SQL from natural language".to_string(),
        "  • Execute queries and see results".to_string(),
        "  • Save queries to Metabase".to_string(),
        "Type /help for commands.".dimmed().to_string(),
    ]
    .join("\n")
}

// =============================================================================
// RESULTS
// =============================================================================

/// JSON strings print bare; everything else prints as JSON.
#[must_use]
pub fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Boxed, left-aligned table. Ragged rows are padded with blanks.
#[must_use]
pub fn table(results: &QueryResults) -> String {
    let width = results
        .rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(results.columns.len()))
        .max()
        .unwrap_or(0);
    if width == 0 {
        return "(no columns)".to_string();
    }

    let rows: Vec<Vec<String>> = results
        .rows
        .iter()
        .map(|row| (0..width).map(|i| row.get(i).map(cell).unwrap_or_default()).collect())
        .collect();
    let headers: Vec<String> = (0..width)
        .map(|i| results.columns.get(i).cloned().unwrap_or_default())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, c) in widths.iter_mut().zip(row) {
            *w = (*w).max(c.chars().count());
        }
    }

    let rule = format!("+{}+", widths.iter().map(|w| "-".repeat(w + 2)).collect::<Vec<_>>().join("+"));
    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!(" {c}{} ", " ".repeat(w - c.chars().count())))
            .collect();
        format!("|{}|", padded.join("|"))
    };

    let mut out = vec![rule.clone(), line(&headers), rule.clone()];
    out.extend(rows.iter().map(|r| line(r.as_slice())));
    out.push(rule);
    out.join("\n")
}

// =============================================================================
// NOTICES
// =============================================================================

#[must_use]
pub fn notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Info => format!("{} {}", "✓".green(), notice.description),
        NoticeLevel::Error => {
            let title = notice.title.as_deref().unwrap_or("Error");
            format!("{} {}: {}", "✗".red(), title.red().bold(), notice.description)
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
