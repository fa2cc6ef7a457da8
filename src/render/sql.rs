//! SQL syntax highlighting for the terminal.
//!
//! Tokenizing is pure and tested on its own; colouring is a thin layer on top.

use std::sync::LazyLock;

use colored::Colorize;
use regex::Regex;

/// Comments win over strings and strings over keywords, so a quote inside a
/// comment or a keyword inside a string is left alone.
static SQL_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)(?P<comment>--.*$)|(?P<string>'[^']*')|\b(?P<keyword>SELECT|FROM|WHERE|JOIN|INNER|LEFT|RIGHT|GROUP BY|ORDER BY|HAVING|INSERT|UPDATE|DELETE|CREATE|ALTER|DROP|INDEX|TABLE|DATABASE)\b",
    )
    .expect("SQL token pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Plain,
    Keyword,
    String,
    Comment,
}

/// Split `sql` into highlight spans. Concatenating the spans yields `sql`.
#[must_use]
pub fn tokenize(sql: &str) -> Vec<(TokenKind, &str)> {
    let mut spans = Vec::new();
    let mut last = 0;
    for caps in SQL_TOKEN_RE.captures_iter(sql) {
        let (kind, m) = if let Some(m) = caps.name("comment") {
            (TokenKind::Comment, m)
        } else if let Some(m) = caps.name("string") {
            (TokenKind::String, m)
        } else if let Some(m) = caps.name("keyword") {
            (TokenKind::Keyword, m)
        } else {
            continue;
        };
        if m.start() > last {
            spans.push((TokenKind::Plain, &sql[last..m.start()]));
        }
        spans.push((kind, m.as_str()));
        last = m.end();
    }
    if last < sql.len() {
        spans.push((TokenKind::Plain, &sql[last..]));
    }
    spans
}

/// `sql` with ANSI colours applied per token.
#[must_use]
pub fn highlight(sql: &str) -> String {
    tokenize(sql)
        .into_iter()
        .map(|(kind, text)| match kind {
            TokenKind::Plain => text.to_string(),
            TokenKind::Keyword => text.blue().bold().to_string(),
            TokenKind::String => text.green().to_string(),
            TokenKind::Comment => text.bright_black().italic().to_string(),
        })
        .collect()
}

#[cfg(test)]
#[path = "sql_test.rs"]
mod tests;
