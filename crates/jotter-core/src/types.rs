//! Note records, drafts and field patches.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Server-assigned note identity.
///
/// Opaque to the session core: it is only ever compared and handed back to
/// the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(SmolStr);

impl NoteId {
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NoteId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl AsRef<str> for NoteId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Counter distinguishing successive editing sessions within one editor.
///
/// Every asynchronous completion carries the generation it was issued for and
/// is dropped if the editor has moved on since.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// The generation of an editor that has never started a session.
    pub const NONE: Self = Self(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A note as reported by the remote store.
///
/// Everything except the identity is optional on the wire; the store is the
/// only authority on `created_at` / `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Modification time as the store sees it: the update stamp, or the
    /// creation stamp for a note that was never updated.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }
}

/// The editable fields of a note. Sent whole on create and on every autosave.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFields {
    pub title: String,
    pub content: String,
    pub category: SmolStr,
}

/// A partial update coming from user input. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<SmolStr>,
}

impl NotePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn category(category: impl Into<SmolStr>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.category.is_none()
    }

    /// Write the present fields into `fields`.
    pub fn apply_to(&self, fields: &mut NoteFields) {
        if let Some(title) = &self.title {
            fields.title.clone_from(title);
        }
        if let Some(content) = &self.content {
            fields.content.clone_from(content);
        }
        if let Some(category) = &self.category {
            fields.category = category.clone();
        }
    }
}

/// Local, user-editable mirror of the note being edited.
///
/// `id` is the resolved identity: absent until a load or create completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub id: Option<NoteId>,
    pub fields: NoteFields,
}

impl NoteDraft {
    /// An empty draft carrying only the default category.
    pub fn blank(category: impl Into<SmolStr>) -> Self {
        Self {
            id: None,
            fields: NoteFields {
                category: category.into(),
                ..NoteFields::default()
            },
        }
    }

    /// Seed a draft from a note the store returned.
    ///
    /// A note stored without a category picks up `fallback_category`.
    pub fn seeded(note: &Note, id: NoteId, fallback_category: &str) -> Self {
        let category = if note.category.trim().is_empty() {
            SmolStr::new(fallback_category)
        } else {
            note.category.clone()
        };
        Self {
            id: Some(id),
            fields: NoteFields {
                title: note.title.clone(),
                content: note.content.clone(),
                category,
            },
        }
    }

    pub fn merge(&mut self, patch: &NotePatch) {
        patch.apply_to(&mut self.fields);
    }
}

/// A category as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: SmolStr,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<SmolStr>,
}

impl Category {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            count: 0,
            color: None,
        }
    }
}

/// The first category in the store's list with a non-blank name.
pub fn first_category(categories: &[Category]) -> Option<&SmolStr> {
    categories
        .iter()
        .map(|c| &c.name)
        .find(|name| !name.trim().is_empty())
}

/// Render a last-edited stamp the way the editor footer shows it,
/// e.g. `January 5, 2026 at 3:04 PM`.
pub fn format_last_edited<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    at.format("%B %-d, %Y at %-I:%M %p").to_string()
}
