//! # chronos
//!
//! Command-line client for the Chronos forecasting chat backend.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chronos_client::{FileAttachment, HttpChatApi, SubmitObserver};
use chronos_core::ids::SessionId;
use chronos_core::messages::{Message, MessageState};
use chronos_core::session::Session;
use chronos_core::wire::{ProgressStep, SessionAssignment};
use chronos_engine::{ChatEngine, HydrateOutcome, SubmitInput, SubmitOutcome};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

/// Chronos chat client.
#[derive(Parser, Debug)]
#[command(name = "chronos", about = "Chat with the Chronos forecasting backend")]
struct Cli {
    /// Backend base URL including the API prefix (overrides settings).
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List conversations, most recent first.
    Sessions,
    /// Print the history of a conversation.
    Show {
        /// Session ID.
        id: String,
    },
    /// Send a message, optionally with files. Ctrl-C cancels.
    Send {
        /// Continue this session instead of starting a new one.
        #[arg(long)]
        session: Option<String>,
        /// File to upload (repeatable).
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<PathBuf>,
        /// Message text.
        text: Option<String>,
    },
    /// Delete a conversation.
    Delete {
        /// Session ID.
        id: String,
    },
}

/// Prints stream progress to stderr.
struct ProgressPrinter;

impl SubmitObserver for ProgressPrinter {
    fn on_progress(&self, step: ProgressStep) {
        eprintln!("… {}", step.label());
    }

    fn on_session_assigned(&self, assignment: &SessionAssignment) {
        if assignment.created_new {
            eprintln!("… new session {}", assignment.session_id);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = chronos_settings::load_settings().context("Failed to load settings")?;
    if let Some(url) = cli.api_url {
        settings.api.base_url = url;
    }
    let _ = chronos_telemetry::init_logging(&settings.logging);
    tracing::debug!(base_url = %settings.api.base_url, "settings loaded");

    let api = HttpChatApi::new(&settings.api).context("Failed to build HTTP client")?;
    let engine = ChatEngine::new(Arc::new(api), settings.submission);
    let _ = engine
        .refresh_sessions()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("Failed to list sessions")?;

    match cli.command {
        Command::Sessions => list_sessions(&engine),
        Command::Show { id } => show(&engine, &SessionId::from(id)).await?,
        Command::Send {
            session,
            files,
            text,
        } => send(&engine, session.map(SessionId::from), files, text.unwrap_or_default()).await?,
        Command::Delete { id } => {
            let id = SessionId::from(id);
            engine
                .delete(&id)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("Deleted {id}");
        }
    }

    engine.shutdown();
    Ok(())
}

fn list_sessions(engine: &ChatEngine) {
    let sessions = engine.catalog().summaries();
    if sessions.is_empty() {
        println!("No conversations yet.");
        return;
    }
    for summary in sessions {
        println!(
            "{}  {}  {}",
            summary.last_updated.format("%Y-%m-%d %H:%M"),
            summary.id,
            summary.title.as_deref().unwrap_or("(untitled)")
        );
    }
}

async fn show(engine: &ChatEngine, id: &SessionId) -> Result<()> {
    let outcome = engine
        .select(id)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    if outcome == HydrateOutcome::Cancelled {
        bail!("Loading {id} was cancelled");
    }
    let session = engine
        .catalog()
        .get(id)
        .with_context(|| format!("Session {id} disappeared"))?;
    print_session(&session);
    Ok(())
}

async fn send(engine: &ChatEngine, session: Option<SessionId>, paths: Vec<PathBuf>, text: String) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = FileAttachment::from_path(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(file);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let input = SubmitInput {
        session_id: session,
        text,
        files,
    };
    let result = engine.submit(input, &ProgressPrinter, &cancel).await;
    interrupt.abort();

    match result.map_err(|e| anyhow::anyhow!(e.user_message()))? {
        SubmitOutcome::Committed { session_id } => {
            let session = engine
                .catalog()
                .get(&session_id)
                .with_context(|| format!("Session {session_id} disappeared"))?;
            if let Some(reply) = session.messages.last() {
                print_message(reply);
            }
            eprintln!("(session {session_id})");
        }
        SubmitOutcome::Discarded => eprintln!("Session was deleted; reply discarded."),
        SubmitOutcome::Cancelled(handle) => {
            let _ = engine.rollback(&handle);
            eprintln!("Cancelled.");
        }
    }
    Ok(())
}

fn print_session(session: &Session) {
    println!("# {}", session.title.as_deref().unwrap_or("(untitled)"));
    for message in &session.messages {
        print_message(message);
    }
    let loose = session.uploads.iter().filter(|u| u.message_id.is_none()).count();
    if loose > 0 {
        println!("({loose} session-level upload(s))");
    }
}

fn print_message(message: &Message) {
    let marker = match &message.state {
        MessageState::Pending => " (sending)",
        MessageState::Failed { .. } => " (failed)",
        MessageState::Committed => "",
    };
    println!("[{:?}]{marker}", message.role);
    match (&message.content, &message.raw_payload) {
        (Some(content), _) => println!("{content}"),
        (None, Some(payload)) => println!("{payload}"),
        (None, None) => {}
    }
    for upload in &message.uploads {
        println!("  📎 {}", upload.filename);
    }
    println!();
}
