use std::time::Duration;

use jotter_core::{
    ErrorKind, Generation, NoteFields, NoteId, NotePatch, Phase, RemoteError, SessionConfig,
    SessionError, SessionState,
};
use jotter_session::{CallKind, EditorSession, MemoryNoteClient, SessionHandle};
use tokio::time::{sleep, timeout};

fn spawn(client: &MemoryNoteClient) -> SessionHandle {
    let (handle, _task) = EditorSession::spawn(client.clone(), SessionConfig::default());
    handle
}

async fn settle(handle: &SessionHandle, pred: impl FnMut(&SessionState) -> bool) -> SessionState {
    timeout(Duration::from_secs(10), handle.wait_for(pred))
        .await
        .expect("state never settled")
        .expect("session closed")
}

async fn ready(handle: &SessionHandle, token: &str) -> SessionState {
    handle.start_session(Some(token)).unwrap();
    settle(handle, |s| s.phase == Phase::Ready).await
}

fn stored(client: &MemoryNoteClient, title: &str) -> NoteId {
    client
        .insert(NoteFields {
            title: title.into(),
            content: "body".into(),
            category: "School".into(),
        })
        .id
        .unwrap()
}

fn error_kind(state: &SessionState) -> Option<ErrorKind> {
    state.error.as_ref().map(SessionError::kind)
}

#[tokio::test(start_paused = true)]
async fn test_new_note_is_created_once_and_redirected() {
    let client = MemoryNoteClient::new().with_categories(["Random Thoughts"]);
    let handle = spawn(&client);
    let mut redirects = handle.redirects();

    handle.start_session(Some("new")).unwrap();
    handle.start_session(Some("new")).unwrap();
    handle.start_session(Some("new")).unwrap();
    let state = settle(&handle, |s| s.phase == Phase::Ready).await;

    let creates = client.creates();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].category, "Random Thoughts");
    assert_eq!(creates[0].title, "Note Title");
    assert_eq!(state.resolved_id(), Some(&NoteId::new("1")));
    assert!(state.last_edited_at.is_some());

    let redirect = redirects.recv().await.unwrap();
    assert_eq!(redirect.id, NoteId::new("1"));
    assert_eq!(redirect.generation, state.generation);

    // Following the redirect keeps the session.
    handle.follow_redirect(redirect).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(client.count(CallKind::FetchById), 0);
    assert_eq!(client.count(CallKind::Create), 1);
    assert_eq!(handle.state().generation, state.generation);
}

#[tokio::test(start_paused = true)]
async fn test_create_falls_back_to_default_category() {
    let client = MemoryNoteClient::new().with_categories(Vec::<&str>::new());
    let handle = spawn(&client);
    ready(&handle, "new").await;
    assert_eq!(client.creates()[0].category, "Random Thoughts");

    let client = MemoryNoteClient::new().with_categories(["School"]);
    client.fail_next(
        CallKind::ListCategories,
        RemoteError::Server {
            message: "busy".into(),
        },
    );
    let handle = spawn(&client);
    ready(&handle, "new").await;
    assert_eq!(client.creates()[0].category, "Random Thoughts");
}

#[tokio::test(start_paused = true)]
async fn test_failed_create_is_surfaced() {
    let client = MemoryNoteClient::new();
    client.fail_next(
        CallKind::Create,
        RemoteError::Transport {
            message: "offline".into(),
        },
    );
    let handle = spawn(&client);
    handle.start_session(Some("new")).unwrap();
    let state = settle(&handle, |s| s.phase == Phase::Failed).await;

    assert_eq!(error_kind(&state), Some(ErrorKind::TransientFailure));
    assert_eq!(client.count(CallKind::Create), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_coalesce() {
    let client = MemoryNoteClient::new();
    let id = stored(&client, "loaded");
    let handle = spawn(&client);
    ready(&handle, id.as_str()).await;

    handle.edit(NotePatch::title("A")).unwrap();
    sleep(Duration::from_millis(50)).await;
    handle.edit(NotePatch::title("AB")).unwrap();
    sleep(Duration::from_secs(1)).await;

    let patches = client.patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].0, id);
    assert_eq!(patches[0].1.title, "AB");
    assert_eq!(patches[0].1.content, "body");
    assert_eq!(client.note(&id).unwrap().title, "AB");
    assert!(!handle.state().is_saving);
}

#[tokio::test(start_paused = true)]
async fn test_save_waits_for_debounce_window() {
    let client = MemoryNoteClient::new();
    let id = stored(&client, "loaded");
    let handle = spawn(&client);
    ready(&handle, id.as_str()).await;

    handle.edit(NotePatch::content("x")).unwrap();
    sleep(Duration::from_millis(300)).await;
    assert!(client.patches().is_empty());
    sleep(Duration::from_millis(100)).await;
    assert_eq!(client.patches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ending_session_drops_pending_save() {
    let client = MemoryNoteClient::new();
    let id = stored(&client, "loaded");
    let handle = spawn(&client);
    ready(&handle, id.as_str()).await;

    handle.edit(NotePatch::title("unsaved")).unwrap();
    handle.end_session().unwrap();
    let state = settle(&handle, |s| s.phase == Phase::Idle).await;
    sleep(Duration::from_secs(2)).await;

    assert!(client.patches().is_empty());
    assert!(state.resolved_id().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_missing_note_fails_without_saving() {
    let client = MemoryNoteClient::new();
    let handle = spawn(&client);
    handle.start_session(Some("404")).unwrap();
    let state = settle(&handle, |s| s.phase == Phase::Failed).await;
    assert_eq!(error_kind(&state), Some(ErrorKind::NotFound));

    handle.edit(NotePatch::title("lost")).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert!(client.patches().is_empty());
    assert_eq!(handle.state().draft.fields.title, "lost");
    assert_eq!(handle.state().phase, Phase::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_load() {
    let client = MemoryNoteClient::new();
    let id = stored(&client, "secret");
    client.set_authorized(false);
    let handle = spawn(&client);
    handle.start_session(Some(id.as_str())).unwrap();
    let state = settle(&handle, |s| s.phase == Phase::Failed).await;
    assert_eq!(error_kind(&state), Some(ErrorKind::Unauthorized));
}

#[tokio::test(start_paused = true)]
async fn test_late_results_for_old_token_are_discarded() {
    let client = MemoryNoteClient::new().with_latency(Duration::from_millis(100));
    let first = stored(&client, "first");
    let second = stored(&client, "second");
    let handle = spawn(&client);

    handle.start_session(Some(first.as_str())).unwrap();
    handle.start_session(Some(second.as_str())).unwrap();
    let state = settle(&handle, |s| s.phase == Phase::Ready).await;
    assert_eq!(state.resolved_id(), Some(&second));
    assert_eq!(state.draft.fields.title, "second");

    sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.state(), state);
    assert_eq!(client.count(CallKind::FetchById), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_create_after_navigation() {
    let client = MemoryNoteClient::new().with_latency(Duration::from_millis(200));
    let existing = stored(&client, "existing");
    let handle = spawn(&client);

    handle.start_session(Some("new")).unwrap();
    sleep(Duration::from_millis(10)).await;
    handle.start_session(Some(existing.as_str())).unwrap();
    let state = settle(&handle, |s| s.phase == Phase::Ready).await;
    sleep(Duration::from_secs(1)).await;

    // The note got created, but the session never adopted it.
    assert_eq!(client.count(CallKind::Create), 1);
    assert_eq!(handle.state(), state);
    assert_eq!(state.resolved_id(), Some(&existing));
}

#[tokio::test(start_paused = true)]
async fn test_save_failure_then_recovery() {
    let client = MemoryNoteClient::new();
    let id = stored(&client, "loaded");
    let handle = spawn(&client);
    ready(&handle, id.as_str()).await;

    client.fail_next(
        CallKind::Patch,
        RemoteError::Transport {
            message: "reset".into(),
        },
    );
    handle.edit(NotePatch::content("one")).unwrap();
    let state = settle(&handle, |s| s.error.is_some()).await;
    assert_eq!(error_kind(&state), Some(ErrorKind::TransientFailure));
    assert_eq!(state.phase, Phase::Ready);
    assert!(!state.is_saving);
    assert_eq!(state.draft.fields.content, "one");

    handle.edit(NotePatch::content("two")).unwrap();
    sleep(Duration::from_secs(1)).await;
    let state = handle.state();
    assert!(state.error.is_none());
    assert_eq!(client.patches().len(), 2);
    assert_eq!(client.note(&id).unwrap().content, "two");
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_flight_is_saved_after() {
    let client = MemoryNoteClient::new();
    let id = stored(&client, "loaded");
    let handle = spawn(&client);
    ready(&handle, id.as_str()).await;
    client.set_latency(Duration::from_millis(500));

    handle.edit(NotePatch::title("first")).unwrap();
    sleep(Duration::from_millis(400)).await;
    assert!(handle.state().is_saving);
    handle.edit(NotePatch::title("second")).unwrap();

    // The second timer fires while the first save is still out.
    sleep(Duration::from_millis(400)).await;
    assert_eq!(client.patches().len(), 1);

    sleep(Duration::from_secs(2)).await;
    let titles: Vec<_> = client.patches().into_iter().map(|(_, f)| f.title).collect();
    assert_eq!(titles, ["first", "second"]);
    assert_eq!(client.note(&id).unwrap().title, "second");
    assert!(!handle.state().is_saving);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_clears_saving_flag() {
    let client = MemoryNoteClient::new();
    let id = stored(&client, "loaded");
    let handle = spawn(&client);
    ready(&handle, id.as_str()).await;
    client.set_latency(Duration::from_secs(1));

    handle.edit(NotePatch::title("slow")).unwrap();
    settle(&handle, |s| s.is_saving).await;
    handle.end_session().unwrap();
    let state = settle(&handle, |s| s.phase == Phase::Idle).await;
    assert!(!state.is_saving);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(handle.state(), state);
    assert!(handle.state().last_edited_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_edits_before_creation_are_not_saved() {
    let client = MemoryNoteClient::new().with_latency(Duration::from_millis(100));
    let handle = spawn(&client);

    handle.start_session(Some("new")).unwrap();
    handle.edit(NotePatch::title("typed while creating")).unwrap();
    let state = settle(&handle, |s| s.phase == Phase::Ready).await;
    assert_eq!(state.draft.fields.title, "Note Title");

    sleep(Duration::from_secs(2)).await;
    assert!(client.patches().is_empty());

    // The first edit after the note exists arms the first save.
    handle.edit(NotePatch::content("after")).unwrap();
    sleep(Duration::from_secs(1)).await;
    let patches = client.patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].1.title, "Note Title");
    assert_eq!(patches[0].1.content, "after");
}

#[tokio::test(start_paused = true)]
async fn test_stale_redirect_is_ignored() {
    let client = MemoryNoteClient::new();
    let existing = stored(&client, "existing");
    let handle = spawn(&client);
    let mut redirects = handle.redirects();

    ready(&handle, "new").await;
    let redirect = redirects.recv().await.unwrap();

    // The user navigates elsewhere before the redirect is followed.
    handle.start_session(Some(existing.as_str())).unwrap();
    handle.follow_redirect(redirect).unwrap();
    let state = settle(&handle, |s| s.resolved_id() == Some(&existing)).await;
    sleep(Duration::from_secs(1)).await;

    assert_eq!(handle.state(), state);
    assert_eq!(state.phase, Phase::Ready);
    assert_eq!(client.count(CallKind::FetchById), 1);
}

#[tokio::test(start_paused = true)]
async fn test_save_of_deleted_note_keeps_session() {
    let client = MemoryNoteClient::new();
    let id = stored(&client, "doomed");
    let handle = spawn(&client);
    ready(&handle, id.as_str()).await;
    client.remove(&id);

    handle.edit(NotePatch::title("still typing")).unwrap();
    let state = settle(&handle, |s| s.error.is_some()).await;
    assert_eq!(error_kind(&state), Some(ErrorKind::NotFound));
    assert_eq!(state.phase, Phase::Ready);
    assert!(!state.is_saving);

    // Later saves are still attempted.
    handle.edit(NotePatch::title("again")).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(client.count(CallKind::Patch), 2);
    assert_eq!(handle.state().phase, Phase::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_save_then_recovery() {
    let client = MemoryNoteClient::new();
    let id = stored(&client, "loaded");
    let handle = spawn(&client);
    ready(&handle, id.as_str()).await;

    client.set_authorized(false);
    handle.edit(NotePatch::content("one")).unwrap();
    let state = settle(&handle, |s| s.error.is_some()).await;
    assert_eq!(error_kind(&state), Some(ErrorKind::Unauthorized));
    assert_eq!(state.phase, Phase::Ready);
    assert!(!state.is_saving);

    client.set_authorized(true);
    handle.edit(NotePatch::content("two")).unwrap();
    let state = settle(&handle, |s| s.error.is_none()).await;
    assert_eq!(state.phase, Phase::Ready);
    assert_eq!(client.note(&id).unwrap().content, "two");
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_category_listing_skips_create() {
    let client = MemoryNoteClient::new();
    client.fail_next(CallKind::ListCategories, RemoteError::Unauthorized);
    let handle = spawn(&client);

    handle.start_session(Some("new")).unwrap();
    let state = settle(&handle, |s| s.phase == Phase::Failed).await;
    assert_eq!(error_kind(&state), Some(ErrorKind::Unauthorized));
    assert_eq!(client.count(CallKind::Create), 0);
}

#[tokio::test(start_paused = true)]
async fn test_uncategorized_note_takes_first_listed_category() {
    let client = MemoryNoteClient::new().with_categories(["School", "Drama"]);
    let bare = client.insert(NoteFields {
        title: "bare".into(),
        content: String::new(),
        category: "".into(),
    });
    let id = bare.id.unwrap();
    let handle = spawn(&client);
    let state = ready(&handle, id.as_str()).await;
    assert_eq!(state.draft.fields.category, "School");

    // Without a listing the configured default applies.
    client.fail_next(
        CallKind::ListCategories,
        RemoteError::Server {
            message: "busy".into(),
        },
    );
    handle.end_session().unwrap();
    handle.start_session(Some(id.as_str())).unwrap();
    let previous = state.generation;
    let state = settle(&handle, |s| s.generation > previous && s.phase == Phase::Ready).await;
    assert_eq!(state.draft.fields.category, "Random Thoughts");
}

#[tokio::test(start_paused = true)]
async fn test_pending_token_then_resolved() {
    let client = MemoryNoteClient::new();
    let id = stored(&client, "later");
    let handle = spawn(&client);

    handle.start_session(None).unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(client.calls().is_empty());
    assert_eq!(handle.state().phase, Phase::Idle);

    let state = ready(&handle, id.as_str()).await;
    assert_eq!(state.draft.fields.title, "later");
    assert!(state.generation > Generation::NONE);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handles_stops_actor() {
    let client = MemoryNoteClient::new();
    let id = stored(&client, "loaded");
    let (handle, task) = EditorSession::spawn(client.clone(), SessionConfig::default());
    ready(&handle, id.as_str()).await;

    let observer = handle.subscribe();
    handle.edit(NotePatch::title("pending")).unwrap();
    drop(handle);
    task.await.unwrap();

    sleep(Duration::from_secs(1)).await;
    assert!(client.patches().is_empty());
    assert_eq!(observer.borrow().phase, Phase::Idle);
}
