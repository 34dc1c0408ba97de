//! The editor actor: one tokio task per editor that owns a [`SessionMachine`].
//!
//! The actor is the single event loop the machine runs on. User commands
//! arrive through a [`SessionHandle`]; remote calls and debounce timers run
//! as spawned tasks and report back through a completion channel. All state
//! changes happen on the actor task, in arrival order, and are published
//! through a `watch` channel after every step.

use jotter_core::{
    Effect, Generation, Note, NoteDefaults, NoteId, NotePatch, RemoteError, SaveTicket,
    SessionConfig, SessionMachine, SessionState, SmolStr, first_category,
};
use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, trace, warn};

use crate::client::NoteClient;

/// The actor has stopped; commands can no longer be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Diagnostic)]
#[error("editor session has shut down")]
#[diagnostic(code(session::closed))]
pub struct SessionClosed;

/// A newly created note the caller should reflect in its route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub generation: Generation,
    pub id: NoteId,
}

#[derive(Debug)]
enum Command {
    Start(Option<SmolStr>),
    End,
    Edit(NotePatch),
    Follow(Redirect),
}

#[derive(Debug)]
enum Completion {
    Loaded {
        generation: Generation,
        result: Result<Note, RemoteError>,
    },
    Created {
        generation: Generation,
        result: Result<Note, RemoteError>,
    },
    TimerFired {
        generation: Generation,
        ticket: SaveTicket,
    },
    Saved {
        generation: Generation,
        result: Result<Note, RemoteError>,
    },
}

impl Completion {
    fn generation(&self) -> Generation {
        match self {
            Completion::Loaded { generation, .. }
            | Completion::Created { generation, .. }
            | Completion::TimerFired { generation, .. }
            | Completion::Saved { generation, .. } => *generation,
        }
    }
}

/// Cloneable front end of an editor actor.
///
/// The actor shuts down once every handle is dropped, ending whatever
/// session is running.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    redirects: broadcast::Sender<Redirect>,
}

impl SessionHandle {
    /// Start editing the note named by `token` (`"new"` or an existing id).
    /// `None` means the token is not known yet.
    pub fn start_session(&self, token: Option<&str>) -> Result<(), SessionClosed> {
        self.send(Command::Start(token.map(SmolStr::new)))
    }

    pub fn end_session(&self) -> Result<(), SessionClosed> {
        self.send(Command::End)
    }

    /// Move the session onto a created note, as a router reflecting the
    /// redirect would. Ignored if the session has moved on by the time the
    /// actor sees it.
    pub fn follow_redirect(&self, redirect: Redirect) -> Result<(), SessionClosed> {
        self.send(Command::Follow(redirect))
    }

    /// Apply a local edit to the draft.
    pub fn edit(&self, patch: NotePatch) -> Result<(), SessionClosed> {
        self.send(Command::Edit(patch))
    }

    /// The latest published state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn redirects(&self) -> broadcast::Receiver<Redirect> {
        self.redirects.subscribe()
    }

    /// Wait until the published state satisfies `pred`.
    pub async fn wait_for(
        &self,
        mut pred: impl FnMut(&SessionState) -> bool,
    ) -> Result<SessionState, SessionClosed> {
        let mut rx = self.state.clone();
        let state = rx.wait_for(|s| pred(s)).await.map_err(|_| SessionClosed)?;
        Ok(state.clone())
    }

    fn send(&self, command: Command) -> Result<(), SessionClosed> {
        self.commands.send(command).map_err(|_| SessionClosed)
    }
}

/// Owns the machine and carries out its effects.
pub struct EditorSession<C> {
    machine: SessionMachine,
    client: C,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    save_timer: Option<JoinHandle<()>>,
    state_tx: watch::Sender<SessionState>,
    redirect_tx: broadcast::Sender<Redirect>,
}

impl<C> EditorSession<C>
where
    C: NoteClient + Clone + Send + Sync + 'static,
{
    /// Spawn an editor actor on the current tokio runtime.
    pub fn spawn(client: C, config: SessionConfig) -> (SessionHandle, JoinHandle<()>) {
        let machine = SessionMachine::new(config);
        let (state_tx, state_rx) = watch::channel(machine.state().clone());
        let (redirect_tx, _) = broadcast::channel(16);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let handle = SessionHandle {
            commands: commands_tx,
            state: state_rx,
            redirects: redirect_tx.clone(),
        };
        let actor = Self {
            machine,
            client,
            completions_tx,
            completions_rx,
            save_timer: None,
            state_tx,
            redirect_tx,
        };
        let span = tracing::debug_span!("editor_session");
        let task = tokio::spawn(actor.run(commands_rx).instrument(span));
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(completion) = self.completions_rx.recv() => self.handle_completion(completion),
            }
            self.publish();
        }

        let effects = self.machine.end_session();
        self.execute(effects);
        self.cancel_timer();
        self.publish();
        debug!("editor session stopped");
    }

    fn handle_command(&mut self, command: Command) {
        let effects = match command {
            Command::Start(token) => self.machine.start_session(token.as_deref()),
            Command::End => self.machine.end_session(),
            Command::Edit(patch) => self.machine.on_field_edit(patch),
            Command::Follow(redirect) => {
                if self.machine.is_current(redirect.generation) {
                    self.machine.start_session(Some(redirect.id.as_str()))
                } else {
                    let Redirect { generation, id } = redirect;
                    debug!(%generation, %id, "stale redirect ignored");
                    Vec::new()
                }
            }
        };
        self.execute(effects);
    }

    fn handle_completion(&mut self, completion: Completion) {
        let generation = completion.generation();
        if !self.machine.is_current(generation) {
            let current = self.machine.generation();
            trace!(%generation, %current, "discarding stale completion");
            metrics::counter!("jotter_discarded_completions_total").increment(1);
            return;
        }
        let effects = match completion {
            Completion::Loaded { generation, result } => {
                self.machine.on_loaded(generation, result)
            }
            Completion::Created { generation, result } => {
                self.machine.on_created(generation, result)
            }
            Completion::TimerFired { generation, ticket } => {
                self.machine.on_timer_fired(generation, ticket)
            }
            Completion::Saved { generation, result } => self.machine.on_saved(generation, result),
        };
        self.execute(effects);
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Fetch { generation, id } => {
                    let client = self.client.clone();
                    self.spawn_remote(async move {
                        let result = fetch_with_category(&client, &id).await;
                        record_call("fetch", &result);
                        Completion::Loaded { generation, result }
                    });
                }
                Effect::Create { generation, defaults } => {
                    let client = self.client.clone();
                    self.spawn_remote(async move {
                        let result = create_with_defaults(&client, &defaults).await;
                        record_call("create", &result);
                        Completion::Created { generation, result }
                    });
                }
                Effect::ArmSaveTimer {
                    generation,
                    ticket,
                    delay,
                } => {
                    self.cancel_timer();
                    let tx = self.completions_tx.clone();
                    self.save_timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(Completion::TimerFired { generation, ticket });
                    }));
                }
                Effect::CancelSaveTimer => self.cancel_timer(),
                Effect::Patch {
                    generation,
                    id,
                    fields,
                } => {
                    let client = self.client.clone();
                    self.spawn_remote(async move {
                        let result = client.patch(&id, fields).await;
                        record_call("patch", &result);
                        Completion::Saved { generation, result }
                    });
                }
                Effect::Redirect { generation, id } => {
                    debug!(%generation, %id, "redirecting to created note");
                    // Nobody listening is fine.
                    let _ = self.redirect_tx.send(Redirect { generation, id });
                }
            }
        }
    }

    /// Run a remote call to completion and report back. Calls are never
    /// aborted; a late answer is disqualified by its generation instead.
    fn spawn_remote<F>(&self, call: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        tokio::spawn(
            async move {
                let completion = call.await;
                let _ = tx.send(completion);
            }
            .in_current_span(),
        );
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.save_timer.take() {
            timer.abort();
        }
    }

    fn publish(&self) {
        let current = self.machine.state();
        self.state_tx.send_if_modified(|published| {
            if published == current {
                false
            } else {
                published.clone_from(current);
                true
            }
        });
    }
}

/// Fetch a note. A note stored without a category takes the first category
/// the store lists; if there is none, the session's default applies.
async fn fetch_with_category<C: NoteClient>(client: &C, id: &NoteId) -> Result<Note, RemoteError> {
    let mut note = client.fetch_by_id(id).await?;
    if note.category.trim().is_empty() {
        match client.list_categories().await {
            Ok(categories) => {
                if let Some(name) = first_category(&categories) {
                    note.category = name.clone();
                }
            }
            Err(err) => warn!(error = %err, %id, "could not list categories for the note"),
        }
    }
    Ok(note)
}

/// Pick the category from the store's list and create the note. A failing
/// category listing falls back to the configured default category.
async fn create_with_defaults<C: NoteClient>(
    client: &C,
    defaults: &NoteDefaults,
) -> Result<Note, RemoteError> {
    let fields = match client.list_categories().await {
        Ok(categories) => defaults.fields_for(&categories),
        Err(RemoteError::Unauthorized) => return Err(RemoteError::Unauthorized),
        Err(err) => {
            warn!(error = %err, "could not list categories, using the default");
            defaults.fields_for(&[])
        }
    };
    client.create(fields).await
}

fn record_call<T>(operation: &'static str, result: &Result<T, RemoteError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(RemoteError::NotFound) => "not_found",
        Err(RemoteError::Unauthorized) => "unauthorized",
        Err(_) => "error",
    };
    metrics::counter!("jotter_remote_calls_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}
