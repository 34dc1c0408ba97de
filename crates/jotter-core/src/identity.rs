//! Mapping from the externally supplied token to what the editor should do.

use crate::types::NoteId;

/// Token value asking for a fresh note to be created.
pub const NEW_NOTE_TOKEN: &str = "new";

/// What a token asks the editor to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// No usable token yet (route not hydrated). Nothing may be sent.
    Pending,
    /// Create a new note.
    CreateNew,
    /// Edit the note with this id.
    Existing(NoteId),
}

/// Classify a token. Pure; surrounding whitespace is ignored.
pub fn resolve(token: Option<&str>) -> Intent {
    match token.map(str::trim) {
        None | Some("") => Intent::Pending,
        Some(NEW_NOTE_TOKEN) => Intent::CreateNew,
        Some(id) => Intent::Existing(NoteId::new(id)),
    }
}

/// Pull the token out of an editor route such as `/dashboard/note/42`.
///
/// The segment after `note` is the token; a path ending in `/new` is always
/// read as the creation sentinel. Anything else has no token.
pub fn token_from_path(path: &str) -> Option<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    let (parent, last) = trimmed.rsplit_once('/')?;
    if last.is_empty() {
        return None;
    }
    if parent.rsplit('/').next() == Some("note") || last == NEW_NOTE_TOKEN {
        Some(last)
    } else {
        None
    }
}
