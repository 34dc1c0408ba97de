//! The editing-session state machine.
//!
//! [`SessionMachine`] owns the observable [`SessionState`] and never performs
//! I/O itself. Every entry point mutates the state synchronously and returns
//! the [`Effect`]s the runtime has to carry out: remote calls, timer
//! management, and route updates. Results of those effects come back through
//! the `on_*` completion methods, tagged with the [`Generation`] they were
//! issued for. A completion whose generation is no longer current is dropped
//! without touching the state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use tracing::{debug, error, trace, warn};

use crate::autosave::{AutosavePipeline, FireOutcome, SaveTicket};
use crate::config::{NoteDefaults, SessionConfig};
use crate::error::{Operation, RemoteError, SessionError};
use crate::guard::CreateOnceGuard;
use crate::identity::{self, Intent};
use crate::types::{Generation, Note, NoteDraft, NoteFields, NoteId, NotePatch};

/// Lifecycle phase of the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No session, or a session whose token is still pending.
    #[default]
    Idle,
    /// Loading an existing note.
    Initializing,
    /// Creating a new note.
    Creating,
    /// The draft is editable and autosave is armed.
    Ready,
    /// Load or create failed. Terminal for the generation.
    Failed,
}

/// Everything the UI layer observes about a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub generation: Generation,
    /// The token the session was started with. Replaced by the resolved id
    /// once a newly created note exists.
    pub token: Option<SmolStr>,
    pub phase: Phase,
    pub draft: NoteDraft,
    /// Modification time as last reported by the store.
    pub last_edited_at: Option<DateTime<Utc>>,
    pub is_saving: bool,
    pub error: Option<SessionError>,
}

impl SessionState {
    fn fresh(generation: Generation, token: Option<SmolStr>, defaults: &NoteDefaults) -> Self {
        Self {
            generation,
            token,
            phase: Phase::Idle,
            draft: NoteDraft::blank(defaults.category.clone()),
            last_edited_at: None,
            is_saving: false,
            error: None,
        }
    }

    pub fn resolved_id(&self) -> Option<&NoteId> {
        self.draft.id.as_ref()
    }
}

/// Work the runtime has to perform on behalf of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch an existing note; report through [`SessionMachine::on_loaded`].
    Fetch { generation: Generation, id: NoteId },
    /// Create a note from `defaults`, picking the category from the store's
    /// category list (see [`NoteDefaults::fields_for`]); report through
    /// [`SessionMachine::on_created`].
    Create {
        generation: Generation,
        defaults: NoteDefaults,
    },
    /// Start the debounce timer, replacing one that has not fired yet. When it
    /// fires, call [`SessionMachine::on_timer_fired`].
    ArmSaveTimer {
        generation: Generation,
        ticket: SaveTicket,
        delay: Duration,
    },
    /// Drop the debounce timer, if one is pending.
    CancelSaveTimer,
    /// Send the full draft; report through [`SessionMachine::on_saved`].
    Patch {
        generation: Generation,
        id: NoteId,
        fields: NoteFields,
    },
    /// The session now edits a freshly created note. The caller should
    /// reflect `id` in its route.
    Redirect { generation: Generation, id: NoteId },
}

pub struct SessionMachine {
    config: SessionConfig,
    guard: CreateOnceGuard,
    autosave: AutosavePipeline,
    state: SessionState,
    active: bool,
}

impl SessionMachine {
    pub fn new(config: SessionConfig) -> Self {
        let state = SessionState::fresh(Generation::NONE, None, &config.defaults);
        Self {
            config,
            guard: CreateOnceGuard::new(),
            autosave: AutosavePipeline::new(),
            state,
            active: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generation(&self) -> Generation {
        self.state.generation
    }

    /// Whether a completion issued for `generation` would still be applied.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.active && generation == self.state.generation
    }

    /// Start (or re-enter) a session for `token`.
    ///
    /// The same token as the running session re-runs initialization without
    /// a new generation: an in-progress or finished load is left alone and a
    /// second creation is refused by the guard. Any other token ends the
    /// running session and starts a new generation.
    pub fn start_session(&mut self, token: Option<&str>) -> Vec<Effect> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        if self.active && token == self.state.token.as_deref() {
            trace!(generation = %self.state.generation, "session re-entered");
            return self.initialize();
        }

        let mut effects = self.teardown();
        let generation = self.state.generation.next();
        let token = token.map(SmolStr::new);
        self.state = SessionState::fresh(generation, token, &self.config.defaults);
        self.active = true;
        debug!(%generation, token = ?self.state.token, "session started");

        effects.extend(self.initialize());
        effects
    }

    /// End the running session. Pending timers are cancelled; anything still
    /// in flight is ignored when it completes.
    pub fn end_session(&mut self) -> Vec<Effect> {
        if !self.active {
            return Vec::new();
        }
        let effects = self.teardown();
        let generation = self.state.generation.next();
        self.state = SessionState::fresh(generation, None, &self.config.defaults);
        self.active = false;
        debug!(%generation, "session ended");
        effects
    }

    /// Apply a local edit. The draft changes immediately; once the note has
    /// an identity and the session is ready, the debounce timer is re-armed.
    /// Edits made before that stay local and are replaced when the draft is
    /// seeded from the store.
    pub fn on_field_edit(&mut self, patch: NotePatch) -> Vec<Effect> {
        if patch.is_empty() {
            return Vec::new();
        }
        self.state.draft.merge(&patch);

        if self.state.phase != Phase::Ready || self.state.draft.id.is_none() {
            trace!(phase = ?self.state.phase, "edit kept local, autosave not armed");
            return Vec::new();
        }

        vec![self.arm_timer()]
    }

    pub fn on_loaded(
        &mut self,
        generation: Generation,
        result: Result<Note, RemoteError>,
    ) -> Vec<Effect> {
        if !self.accepts(generation, Phase::Initializing, "load") {
            return Vec::new();
        }
        match result {
            Ok(note) => {
                self.seed(note, Operation::Load);
                if let Some(id) = self.state.resolved_id() {
                    debug!(%generation, %id, "note loaded");
                }
            }
            Err(err) => self.fail(SessionError::from_remote(Operation::Load, err)),
        }
        Vec::new()
    }

    pub fn on_created(
        &mut self,
        generation: Generation,
        result: Result<Note, RemoteError>,
    ) -> Vec<Effect> {
        if !self.accepts(generation, Phase::Creating, "create") {
            return Vec::new();
        }
        match result {
            Ok(note) => {
                self.seed(note, Operation::Create);
                let Some(id) = self.state.draft.id.clone() else {
                    return Vec::new();
                };
                debug!(%generation, %id, "note created");
                self.state.token = Some(SmolStr::new(id.as_str()));
                vec![Effect::Redirect { generation, id }]
            }
            Err(err) => {
                self.fail(SessionError::from_remote(Operation::Create, err));
                Vec::new()
            }
        }
    }

    pub fn on_timer_fired(&mut self, generation: Generation, ticket: SaveTicket) -> Vec<Effect> {
        if !self.is_current(generation) || self.state.phase != Phase::Ready {
            trace!(%generation, ticket = ticket.get(), "stale save timer ignored");
            return Vec::new();
        }
        match self.autosave.fire(ticket) {
            FireOutcome::Stale => Vec::new(),
            FireOutcome::Defer => {
                debug!(%generation, "save in flight, next save deferred");
                Vec::new()
            }
            FireOutcome::Send => self.issue_patch(),
        }
    }

    pub fn on_saved(
        &mut self,
        generation: Generation,
        result: Result<Note, RemoteError>,
    ) -> Vec<Effect> {
        if !self.is_current(generation) {
            trace!(%generation, current = %self.state.generation, "stale save result discarded");
            return Vec::new();
        }
        self.state.is_saving = false;
        match result {
            Ok(note) => {
                if let Some(at) = note.last_modified() {
                    self.state.last_edited_at = Some(at);
                }
                self.state.error = None;
            }
            Err(err) => {
                warn!(%generation, error = %err, "autosave failed");
                self.state.error = Some(SessionError::from_remote(Operation::Save, err));
            }
        }
        if self.autosave.settle() {
            self.issue_patch()
        } else {
            Vec::new()
        }
    }

    fn initialize(&mut self) -> Vec<Effect> {
        let generation = self.state.generation;
        match identity::resolve(self.state.token.as_deref()) {
            Intent::Pending => {
                trace!(%generation, "token pending, nothing to load");
                Vec::new()
            }
            Intent::Existing(id) => {
                if self.state.phase != Phase::Idle {
                    return Vec::new();
                }
                self.state.phase = Phase::Initializing;
                vec![Effect::Fetch { generation, id }]
            }
            Intent::CreateNew => {
                if !self.guard.try_begin_create(generation) {
                    debug!(%generation, "creation already claimed for this session");
                    return Vec::new();
                }
                self.state.phase = Phase::Creating;
                vec![Effect::Create {
                    generation,
                    defaults: self.config.defaults.clone(),
                }]
            }
        }
    }

    fn arm_timer(&mut self) -> Effect {
        Effect::ArmSaveTimer {
            generation: self.state.generation,
            ticket: self.autosave.schedule(),
            delay: self.config.debounce(),
        }
    }

    fn teardown(&mut self) -> Vec<Effect> {
        let had_timer = self.autosave.cancel();
        self.autosave.reset();
        if had_timer {
            vec![Effect::CancelSaveTimer]
        } else {
            Vec::new()
        }
    }

    fn accepts(&self, generation: Generation, phase: Phase, what: &str) -> bool {
        if !self.is_current(generation) {
            trace!(%generation, current = %self.state.generation, "stale {what} result discarded");
            return false;
        }
        if self.state.phase != phase {
            debug!(%generation, phase = ?self.state.phase, "unexpected {what} result ignored");
            return false;
        }
        true
    }

    /// Populate the draft from a load/create response and move to `Ready`.
    /// The first save is armed by the next edit. A response without an
    /// identity fails the session instead.
    fn seed(&mut self, note: Note, operation: Operation) {
        let generation = self.state.generation;
        let Some(id) = note.id.clone() else {
            error!(%generation, %operation, "store response is missing the note id");
            self.fail(SessionError::InvariantViolation {
                operation,
                message: "response carried no note id".into(),
            });
            return;
        };
        self.state.draft = NoteDraft::seeded(&note, id, &self.config.defaults.category);
        self.state.last_edited_at = note.last_modified();
        self.state.phase = Phase::Ready;
        self.state.error = None;
    }

    fn fail(&mut self, err: SessionError) {
        warn!(generation = %self.state.generation, error = %err, "session failed");
        self.state.phase = Phase::Failed;
        self.state.error = Some(err);
    }

    fn issue_patch(&mut self) -> Vec<Effect> {
        let Some(id) = self.state.draft.id.clone() else {
            self.autosave.reset();
            return Vec::new();
        };
        self.state.is_saving = true;
        vec![Effect::Patch {
            generation: self.state.generation,
            id,
            fields: self.state.draft.fields.clone(),
        }]
    }
}
