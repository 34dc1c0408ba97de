//! The remote note store, as the session consumes it.

use jotter_core::{Category, Note, NoteFields, NoteId, RemoteError};

/// Create/read/patch access to the note store.
///
/// Implementations own the transport and map its failures onto
/// [`RemoteError`]; the session only tells apart "not found", "not
/// authorized" and everything else. Timeouts are the implementation's
/// business.
///
/// Use [`NoteClient`] (the `Send` variant) with the session runtime.
#[trait_variant::make(NoteClient: Send)]
pub trait LocalNoteClient {
    /// Create a note. The returned note must carry the server-assigned id.
    async fn create(&self, fields: NoteFields) -> Result<Note, RemoteError>;

    async fn fetch_by_id(&self, id: &NoteId) -> Result<Note, RemoteError>;

    /// Update the given note with `fields`, returning the stored note with
    /// its new modification time.
    async fn patch(&self, id: &NoteId, fields: NoteFields) -> Result<Note, RemoteError>;

    async fn list_categories(&self) -> Result<Vec<Category>, RemoteError>;
}
