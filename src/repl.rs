//! Interactive chat over one [`ChatSession`].
//!
//! DESIGN
//! ======
//! Lines are read from stdin while workflow completions arrive on the
//! session's notice channel; `select!` interleaves both so the prompt stays
//! responsive while calls are outstanding. Each workflow is started with its
//! `begin_*` call (the placeholder prints immediately) and resolved on a
//! spawned task. On end of input the loop waits for outstanding calls.

use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::chat::{ChatSession, Dispatch, MessageId, Notice, SessionError};
use crate::error::ErrorCode;
use crate::render::{self, FaultBoundary};

pub const HELP: &str = "\
Type a question to generate SQL.
  /run N          run the SQL of message N
  /save N         save the SQL of message N to Metabase
  /edit N <sql>   replace the SQL of message N
  /show           redraw the conversation
  /details        show the last display error
  /help           this help
  /quit           leave";

const DRAIN_POLL: Duration = Duration::from_millis(50);

// =============================================================================
// COMMANDS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Run(usize),
    Save(usize),
    Edit(usize, String),
    Show,
    Details,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command /{0}; type /help")]
    Unknown(String),

    #[error("/{command} needs a message number, got {raw:?}")]
    BadIndex { command: &'static str, raw: String },

    #[error("/edit needs SQL after the message number")]
    MissingSql,

    #[error("message {0} does not exist")]
    NoSuchMessage(usize),

    #[error("message {0} has no SQL")]
    NoSql(usize),
}

impl ErrorCode for CommandError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unknown(_) => "E_UNKNOWN_COMMAND",
            Self::BadIndex { .. } => "E_BAD_INDEX",
            Self::MissingSql => "E_MISSING_SQL",
            Self::NoSuchMessage(_) => "E_NO_SUCH_MESSAGE",
            Self::NoSql(_) => "E_NO_SQL",
        }
    }
}

/// Parse one input line. Anything not starting with `/` is a question.
///
/// # Errors
///
/// Returns a [`CommandError`] for unknown commands or malformed arguments.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Ask(line.to_string()));
    };

    let (name, args) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(n, a)| (n, a.trim()));

    match name {
        "run" => Ok(Command::Run(parse_index("run", args)?)),
        "save" => Ok(Command::Save(parse_index("save", args)?)),
        "edit" => {
            let (raw, sql) = args
                .split_once(char::is_whitespace)
                .map_or((args, ""), |(n, s)| (n, s.trim()));
            let index = parse_index("edit", raw)?;
            if sql.is_empty() {
                return Err(CommandError::MissingSql);
            }
            Ok(Command::Edit(index, sql.to_string()))
        }
        "show" => Ok(Command::Show),
        "details" => Ok(Command::Details),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_index(command: &'static str, raw: &str) -> Result<usize, CommandError> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandError::BadIndex { command, raw: raw.to_string() }),
    }
}

// =============================================================================
// LOOP
// =============================================================================

/// Drive `session` from `input`, writing the transcript to `out`.
///
/// # Errors
///
/// Returns an I/O error if reading input or writing output fails.
pub async fn run<R, W>(
    session: &ChatSession,
    notices: &mut mpsc::UnboundedReceiver<Notice>,
    input: R,
    out: &mut W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut repl = Repl { session, boundary: FaultBoundary::new(), out };
    let mut lines = input.lines();

    repl.print(&render::welcome())?;
    repl.prompt()?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !repl.handle_line(&line)? {
                    return Ok(());
                }
                repl.prompt()?;
            }
            Some(notice) = notices.recv() => {
                repl.show_notice(&notice)?;
                repl.prompt()?;
            }
        }
    }

    // End of input: let outstanding calls finish before returning.
    while session.in_flight() > 0 {
        tokio::select! {
            Some(notice) = notices.recv() => repl.show_notice(&notice)?,
            () = tokio::time::sleep(DRAIN_POLL) => {}
        }
    }
    while let Ok(notice) = notices.try_recv() {
        repl.show_notice(&notice)?;
    }
    Ok(())
}

struct Repl<'a, W> {
    session: &'a ChatSession,
    boundary: FaultBoundary,
    out: &'a mut W,
}

impl<W: Write> Repl<'_, W> {
    fn print(&mut self, text: &str) -> std::io::Result<()> {
        writeln!(self.out, "{text}")
    }

    fn prompt(&mut self) -> std::io::Result<()> {
        match self.session.in_flight() {
            0 => write!(self.out, "> ")?,
            n => write!(self.out, "({n} running) > ")?,
        }
        self.out.flush()
    }

    /// Returns `false` when the user asked to quit.
    fn handle_line(&mut self, line: &str) -> std::io::Result<bool> {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(e) => {
                self.print(&e.to_string())?;
                return Ok(true);
            }
        };
        debug!(?command, "repl: command");

        match command {
            Command::Empty => {}
            Command::Quit => return Ok(false),
            Command::Help => self.print(HELP)?,
            Command::Show => {
                let messages = self.session.messages();
                let text = self.boundary.render(|| render::transcript(&messages));
                self.print(&text)?;
            }
            Command::Details => {
                let text = self
                    .boundary
                    .details()
                    .map_or_else(|| "No display errors so far.".to_string(), str::to_string);
                self.print(&text)?;
            }
            Command::Ask(question) => {
                let started = self.session.begin_question(&question);
                self.start(started, true)?;
            }
            Command::Run(n) => match self.sql_of(n) {
                Ok(sql) => {
                    let started = self.session.begin_run(&sql);
                    self.start(started, false)?;
                }
                Err(e) => self.print(&e.to_string())?,
            },
            Command::Save(n) => match self.sql_of(n) {
                Ok(sql) => {
                    let question = self
                        .session
                        .message_at(n - 1)
                        .map(|m| m.save_question().to_string())
                        .unwrap_or_default();
                    let started = self.session.begin_save(&sql, &question);
                    self.start(started, false)?;
                }
                Err(e) => self.print(&e.to_string())?,
            },
            Command::Edit(n, sql) => {
                let Some(id) = self.session.message_at(n - 1).map(|m| m.id) else {
                    self.print(&CommandError::NoSuchMessage(n).to_string())?;
                    return Ok(true);
                };
                self.session.edit_sql(id, &sql);
                self.show_message(id)?;
            }
        }
        Ok(true)
    }

    fn sql_of(&self, n: usize) -> Result<String, CommandError> {
        let message = self
            .session
            .message_at(n - 1)
            .ok_or(CommandError::NoSuchMessage(n))?;
        message.sql.ok_or(CommandError::NoSql(n))
    }

    /// Print what `begin_*` appended and resolve the call in the background.
    /// A question appends the user message right before its placeholder.
    fn start(&mut self, started: Result<Dispatch, SessionError>, with_question: bool) -> std::io::Result<()> {
        let dispatch = match started {
            Ok(dispatch) => dispatch,
            Err(e) => {
                warn!(code = e.error_code(), error = %e, "repl: rejected input");
                return self.print(&e.to_string());
            }
        };

        let placeholder = dispatch.placeholder();
        if let Some(pos) = self.session.position(placeholder) {
            let first = if with_question { pos.saturating_sub(1) } else { pos };
            for index in first..=pos {
                if let Some(message) = self.session.message_at(index) {
                    self.show_message(message.id)?;
                }
            }
        }

        tokio::spawn(dispatch.resolve());
        Ok(())
    }

    fn show_message(&mut self, id: MessageId) -> std::io::Result<()> {
        let (Some(message), Some(pos)) = (self.session.message(id), self.session.position(id)) else {
            return Ok(());
        };
        let text = self.boundary.render(|| render::message(&message, pos + 1));
        self.print(&text)
    }

    fn show_notice(&mut self, notice: &Notice) -> std::io::Result<()> {
        self.print("")?;
        self.show_message(notice.message_id)?;
        self.print(&render::notice(notice))
    }
}

#[cfg(test)]
#[path = "repl_test.rs"]
mod tests;
