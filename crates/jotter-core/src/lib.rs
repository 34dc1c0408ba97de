//! jotter-core: the editing-session synchronization core, without a runtime.
//!
//! This crate provides:
//! - `identity` - token classification (`Pending` / `CreateNew` / `Existing`)
//! - `CreateOnceGuard` - exactly-once note creation per session generation
//! - `AutosavePipeline` - debounce tickets and the single in-flight save
//! - `SessionMachine` - the lifecycle state machine, emitting `Effect`s for a
//!   runtime to carry out
//!
//! Nothing here sleeps, spawns or talks to the network; see `jotter-session`
//! for the tokio runtime that drives the machine.

pub mod autosave;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod machine;
pub mod types;

pub use autosave::{AutosavePipeline, FireOutcome, SaveTicket};
pub use config::{NoteDefaults, SessionConfig};
pub use error::{ConfigError, ErrorKind, Operation, RemoteError, SessionError};
pub use guard::CreateOnceGuard;
pub use identity::{Intent, NEW_NOTE_TOKEN, resolve, token_from_path};
pub use machine::{Effect, Phase, SessionMachine, SessionState};
pub use smol_str::SmolStr;
pub use types::{
    Category, Generation, Note, NoteDraft, NoteFields, NoteId, NotePatch, first_category,
    format_last_edited,
};
