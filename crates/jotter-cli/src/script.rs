//! The line-oriented command language read from stdin.

use std::time::Duration;

use jotter_core::{NotePatch, token_from_path};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a session. `None` leaves the token pending.
    Open(Option<String>),
    Edit(NotePatch),
    Wait(Duration),
    Show,
    Close,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ScriptError {
    #[error("unknown command `{0}`")]
    #[diagnostic(
        code(script::unknown_command),
        help("commands: open, title, content, category, wait, show, close, quit")
    )]
    UnknownCommand(String),

    #[error("`{0}` needs an argument")]
    #[diagnostic(code(script::missing_argument))]
    MissingArgument(&'static str),

    #[error("`{0}` is not a number of milliseconds")]
    #[diagnostic(code(script::invalid_duration), help("e.g. `wait 500`"))]
    InvalidDuration(String),
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, ScriptError> {
    let line = line.trim_start();
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_end_matches(['\r', '\n'])),
        None => (line.trim_end(), ""),
    };

    let command = match word {
        "open" => Command::Open(open_target(rest.trim())),
        "title" => Command::Edit(NotePatch::title(rest)),
        "content" => Command::Edit(NotePatch::content(rest.replace("\\n", "\n"))),
        "category" => {
            let name = rest.trim();
            if name.is_empty() {
                return Err(ScriptError::MissingArgument("category"));
            }
            Command::Edit(NotePatch::category(name))
        }
        "wait" => {
            let ms = rest.trim();
            if ms.is_empty() {
                return Err(ScriptError::MissingArgument("wait"));
            }
            let ms: u64 = ms
                .parse()
                .map_err(|_| ScriptError::InvalidDuration(ms.to_owned()))?;
            Command::Wait(Duration::from_millis(ms))
        }
        "show" => Command::Show,
        "close" => Command::Close,
        "quit" | "exit" => Command::Quit,
        other => return Err(ScriptError::UnknownCommand(other.to_owned())),
    };
    Ok(Some(command))
}

/// A bare token is used as is; anything that looks like a route is reduced
/// to its note token.
fn open_target(arg: &str) -> Option<String> {
    if arg.is_empty() {
        None
    } else if arg.contains('/') {
        token_from_path(arg).map(str::to_owned)
    } else {
        Some(arg.to_owned())
    }
}
