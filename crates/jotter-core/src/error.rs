//! Error types for the session core.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Failure reported by the remote note store.
///
/// The core only distinguishes "does not exist", "not allowed" and
/// everything else; transports map their own failures onto these.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum RemoteError {
    #[error("note not found")]
    #[diagnostic(code(remote::not_found))]
    NotFound,

    #[error("not authorized")]
    #[diagnostic(code(remote::unauthorized))]
    Unauthorized,

    #[error("transport error: {message}")]
    #[diagnostic(code(remote::transport))]
    Transport { message: String },

    #[error("store error: {message}")]
    #[diagnostic(code(remote::server))]
    Server { message: String },
}

/// The remote operation a session error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Load,
    Create,
    Save,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Load => "load",
            Operation::Create => "create",
            Operation::Save => "save",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a [`SessionError`], for callers that only need
/// to decide between redirecting, re-authenticating or showing a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    TransientFailure,
    InvariantViolation,
}

/// Error surfaced in the observable session state.
///
/// Cleared by the next successful load, create or save.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SessionError {
    #[error("{operation} failed: note not found")]
    #[diagnostic(
        code(session::not_found),
        help("the note may have been deleted; open another note")
    )]
    NotFound { operation: Operation },

    #[error("{operation} failed: not authorized")]
    #[diagnostic(
        code(session::unauthorized),
        help("sign in again to keep editing")
    )]
    Unauthorized { operation: Operation },

    #[error("{operation} failed: {message}")]
    #[diagnostic(code(session::transient))]
    TransientFailure {
        operation: Operation,
        message: String,
    },

    #[error("{operation} returned an inconsistent response: {message}")]
    #[diagnostic(code(session::invariant))]
    InvariantViolation {
        operation: Operation,
        message: String,
    },
}

impl SessionError {
    pub fn from_remote(operation: Operation, err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound => SessionError::NotFound { operation },
            RemoteError::Unauthorized => SessionError::Unauthorized { operation },
            other => SessionError::TransientFailure {
                operation,
                message: other.to_string(),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NotFound { .. } => ErrorKind::NotFound,
            SessionError::Unauthorized { .. } => ErrorKind::Unauthorized,
            SessionError::TransientFailure { .. } => ErrorKind::TransientFailure,
            SessionError::InvariantViolation { .. } => ErrorKind::InvariantViolation,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            SessionError::NotFound { operation }
            | SessionError::Unauthorized { operation }
            | SessionError::TransientFailure { operation, .. }
            | SessionError::InvariantViolation { operation, .. } => *operation,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid configuration value for {field}: {message}")]
    #[diagnostic(code(config::invalid))]
    Invalid { field: &'static str, message: String },

    #[error("failed to read config file {}", path.display())]
    #[diagnostic(code(config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    #[diagnostic(
        code(config::parse),
        help("see SessionConfig for the accepted keys")
    )]
    Parse {
        #[source]
        source: toml::de::Error,
    },
}
