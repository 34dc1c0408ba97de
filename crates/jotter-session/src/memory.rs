//! In-memory note store.
//!
//! Behaves like the real store where the session can tell the difference:
//! server-assigned ids, server-owned timestamps, not-found for unknown ids,
//! per-category note counts. It also records every call it receives and can
//! be told to fail, to refuse authorization, or to answer slowly.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use jotter_core::{Category, Note, NoteFields, NoteId, RemoteError, SmolStr};

use crate::client::NoteClient;

/// Categories the store ships with, and their display colors.
pub const STOCK_CATEGORIES: [(&str, &str); 4] = [
    ("Random Thoughts", "#ef9c66"),
    ("School", "#fcdc94"),
    ("Personal", "#78aba8"),
    ("Drama", "#C8CFA0"),
];

/// The kind of call the store received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Create,
    FetchById,
    Patch,
    ListCategories,
}

/// One call as received by the store, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Create(NoteFields),
    FetchById(NoteId),
    Patch(NoteId, NoteFields),
    ListCategories,
}

impl RemoteCall {
    pub fn kind(&self) -> CallKind {
        match self {
            RemoteCall::Create(_) => CallKind::Create,
            RemoteCall::FetchById(_) => CallKind::FetchById,
            RemoteCall::Patch(..) => CallKind::Patch,
            RemoteCall::ListCategories => CallKind::ListCategories,
        }
    }
}

#[derive(Debug)]
struct Store {
    notes: BTreeMap<NoteId, Note>,
    next_id: u64,
    categories: Vec<(SmolStr, Option<SmolStr>)>,
    calls: Vec<RemoteCall>,
    failures: VecDeque<(CallKind, RemoteError)>,
    latency: Duration,
    authorized: bool,
}

/// Shared handle to an in-memory store. Clones see the same notes.
#[derive(Debug, Clone)]
pub struct MemoryNoteClient {
    store: Arc<Mutex<Store>>,
}

impl Default for MemoryNoteClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNoteClient {
    /// An empty store offering the stock categories.
    pub fn new() -> Self {
        let categories = STOCK_CATEGORIES
            .iter()
            .map(|(name, color)| (SmolStr::new(name), Some(SmolStr::new(color))))
            .collect();
        Self {
            store: Arc::new(Mutex::new(Store {
                notes: BTreeMap::new(),
                next_id: 1,
                categories,
                calls: Vec::new(),
                failures: VecDeque::new(),
                latency: Duration::ZERO,
                authorized: true,
            })),
        }
    }

    /// Replace the category catalogue. Names are listed in the given order.
    pub fn with_categories<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.lock().categories = names.into_iter().map(|n| (n.into(), None)).collect();
        self
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Answer every call with [`RemoteError::Unauthorized`] while `false`.
    pub fn set_authorized(&self, authorized: bool) {
        self.lock().authorized = authorized;
    }

    /// Make the next call of `kind` fail with `err`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, kind: CallKind, err: RemoteError) {
        self.lock().failures.push_back((kind, err));
    }

    /// Put a note into the store directly, as if created earlier.
    pub fn insert(&self, fields: NoteFields) -> Note {
        let mut store = self.lock();
        store.insert(fields)
    }

    pub fn remove(&self, id: &NoteId) -> Option<Note> {
        self.lock().notes.remove(id)
    }

    pub fn note(&self, id: &NoteId) -> Option<Note> {
        self.lock().notes.get(id).cloned()
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.lock().calls.iter().filter(|c| c.kind() == kind).count()
    }

    /// The patches received so far, in order.
    pub fn patches(&self) -> Vec<(NoteId, NoteFields)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Patch(id, fields) => Some((id.clone(), fields.clone())),
                _ => None,
            })
            .collect()
    }

    /// The creations received so far, in order.
    pub fn creates(&self) -> Vec<NoteFields> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Create(fields) => Some(fields.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and work out whether it is refused. Returns the
    /// latency to apply before answering.
    fn receive(&self, call: RemoteCall) -> (Duration, Result<(), RemoteError>) {
        let mut store = self.lock();
        let kind = call.kind();
        store.calls.push(call);
        let verdict = if !store.authorized {
            Err(RemoteError::Unauthorized)
        } else if let Some(pos) = store.failures.iter().position(|(k, _)| *k == kind) {
            match store.failures.remove(pos) {
                Some((_, err)) => Err(err),
                None => Ok(()),
            }
        } else {
            Ok(())
        };
        (store.latency, verdict)
    }

    async fn answer<T>(
        &self,
        call: RemoteCall,
        op: impl FnOnce(&mut Store) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let (latency, verdict) = self.receive(call);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        verdict?;
        op(&mut self.lock())
    }
}

impl Store {
    fn insert(&mut self, fields: NoteFields) -> Note {
        let id = NoteId::new(self.next_id.to_string());
        self.next_id += 1;
        let now = Utc::now();
        let note = Note {
            id: Some(id.clone()),
            title: fields.title,
            content: fields.content,
            category: fields.category,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.notes.insert(id, note.clone());
        note
    }
}

impl NoteClient for MemoryNoteClient {
    async fn create(&self, fields: NoteFields) -> Result<Note, RemoteError> {
        self.answer(RemoteCall::Create(fields.clone()), move |store| {
            Ok(store.insert(fields))
        })
        .await
    }

    async fn fetch_by_id(&self, id: &NoteId) -> Result<Note, RemoteError> {
        self.answer(RemoteCall::FetchById(id.clone()), |store| {
            store.notes.get(id).cloned().ok_or(RemoteError::NotFound)
        })
        .await
    }

    async fn patch(&self, id: &NoteId, fields: NoteFields) -> Result<Note, RemoteError> {
        self.answer(RemoteCall::Patch(id.clone(), fields.clone()), move |store| {
            let note = store.notes.get_mut(id).ok_or(RemoteError::NotFound)?;
            note.title = fields.title;
            note.content = fields.content;
            note.category = fields.category;
            note.updated_at = Some(Utc::now());
            Ok(note.clone())
        })
        .await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RemoteError> {
        self.answer(RemoteCall::ListCategories, |store| {
            Ok(store
                .categories
                .iter()
                .map(|(name, color)| Category {
                    name: name.clone(),
                    count: store.notes.values().filter(|n| &n.category == name).count(),
                    color: color.clone(),
                })
                .collect())
        })
        .await
    }
}
