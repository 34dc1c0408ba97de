//! jotter-session: runs editing sessions on tokio.
//!
//! - `client` - the `NoteClient` trait the session talks to the store through
//! - `memory` - an in-memory store with call recording and fault injection
//! - `session` - the editor actor and its `SessionHandle`
//! - `telemetry` - console tracing setup for binaries
//!
//! The state machine itself lives in `jotter-core`.

pub mod client;
pub mod memory;
pub mod session;
pub mod telemetry;

pub use client::{LocalNoteClient, NoteClient};
pub use memory::{CallKind, MemoryNoteClient, RemoteCall, STOCK_CATEGORIES};
pub use session::{EditorSession, Redirect, SessionClosed, SessionHandle};
pub use telemetry::TelemetryConfig;
