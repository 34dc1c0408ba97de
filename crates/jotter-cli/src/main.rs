use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use jotter_core::{NoteFields, SessionConfig, SessionState, format_last_edited};
use jotter_session::telemetry::{self, TelemetryConfig};
use jotter_session::{EditorSession, MemoryNoteClient, SessionHandle};
use miette::{IntoDiagnostic, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

mod script;

use script::Command;

#[derive(Parser)]
#[command(version, about = "Jotter - autosaving note editor session", long_about = None)]
struct Cli {
    /// Note to open on startup: `new`, a note id, or a `/note/<id>` route
    token: Option<String>,

    /// Path to a TOML session config
    #[arg(long, env = "JOTTER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the autosave debounce window
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Simulated store latency per call
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Put a note with this title into the store before starting (repeatable)
    #[arg(long = "note", value_name = "TITLE")]
    notes: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    dotenvy::dotenv().ok();
    telemetry::init(TelemetryConfig::from_env("jotter"));

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let client = MemoryNoteClient::new().with_latency(Duration::from_millis(cli.latency_ms));
    for title in &cli.notes {
        let note = client.insert(NoteFields {
            title: title.clone(),
            content: String::new(),
            category: config.defaults.category.clone(),
        });
        if let Some(id) = note.id {
            println!("stored note {id}: {title}");
        }
    }

    let (handle, actor) = EditorSession::spawn(client, config);
    let watchers = [spawn_status_printer(&handle), spawn_redirect_follower(&handle)];

    if let Some(token) = cli.token.as_deref() {
        if let Some(command) = script::parse_line(&format!("open {token}"))? {
            run_command(&handle, command).await?;
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.into_diagnostic()? {
        match script::parse_line(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => run_command(&handle, command).await?,
            Ok(None) => {}
            Err(err) => eprintln!("{:?}", miette::Report::new(err)),
        }
    }

    handle.end_session()?;
    for watcher in watchers {
        watcher.abort();
    }
    drop(handle);
    actor.await.into_diagnostic()?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::load_file(path)?,
        None => SessionConfig::default(),
    }
    .apply_env()?;
    if let Some(ms) = cli.debounce_ms {
        config.debounce_ms = ms;
    }
    config.validate()?;
    tracing::debug!(?config, "session config loaded");
    Ok(config)
}

async fn run_command(handle: &SessionHandle, command: Command) -> Result<()> {
    match command {
        Command::Open(token) => handle.start_session(token.as_deref())?,
        Command::Edit(patch) => handle.edit(patch)?,
        Command::Wait(duration) => tokio::time::sleep(duration).await,
        Command::Show => print_note(&handle.state()),
        Command::Close => handle.end_session()?,
        Command::Quit => {}
    }
    Ok(())
}

/// Print a status line whenever anything other than the draft text changes.
fn spawn_status_printer(handle: &SessionHandle) -> JoinHandle<()> {
    let mut states = handle.subscribe();
    tokio::spawn(async move {
        let mut last = None;
        while states.changed().await.is_ok() {
            let line = status_line(&states.borrow_and_update());
            if last.as_ref() != Some(&line) {
                println!("{line}");
                last = Some(line);
            }
        }
    })
}

/// Follow redirects to freshly created notes, the way a router would. The
/// actor drops a redirect whose session has been replaced meanwhile.
fn spawn_redirect_follower(handle: &SessionHandle) -> JoinHandle<()> {
    let mut redirects = handle.redirects();
    let handle = handle.clone();
    tokio::spawn(async move {
        while let Ok(redirect) = redirects.recv().await {
            println!("-> /note/{}", redirect.id);
            if handle.follow_redirect(redirect).is_err() {
                break;
            }
        }
    })
}

fn status_line(state: &SessionState) -> String {
    let mut line = format!("[{}] {:?}", state.generation, state.phase);
    if let Some(id) = state.resolved_id() {
        line.push_str(&format!(" note {id}"));
    }
    if state.is_saving {
        line.push_str(" saving...");
    }
    if let Some(at) = state.last_edited_at {
        line.push_str(&format!(
            " | last edited {}",
            format_last_edited(&at.with_timezone(&Local))
        ));
    }
    if let Some(err) = &state.error {
        line.push_str(&format!(" | error: {err}"));
    }
    line
}

fn print_note(state: &SessionState) {
    let fields = &state.draft.fields;
    println!("{}", status_line(state));
    println!("  title:    {}", fields.title);
    println!("  category: {}", fields.category);
    for line in fields.content.lines() {
        println!("  | {line}");
    }
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .ok();
    miette::set_panic_hook();
}
