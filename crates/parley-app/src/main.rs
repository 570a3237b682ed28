//! # parley
//!
//! Terminal chat client: wires settings, the push-channel connection manager,
//! the query client, and the chat session into a line-oriented REPL.

#![deny(unsafe_code)]

mod render;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parley_chat::{BufferedSpeech, ChatSession, SpeechInput, Transcript};
use parley_core::MessageId;
use parley_query::{QueryApi, QueryClient, QueryError, QueryRequest, QueryResponse};
use parley_realtime::{
    ConnectionEvent, ConnectionManager, EventCategory, RealtimeConfig, RealtimeHandle,
};
use parley_settings::ParleySettings;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::repl::Line;

/// Parley terminal chat client.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Ask questions, follow background jobs")]
struct Cli {
    /// Settings file (defaults to `~/.parley/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Push-channel WebSocket URL.
    #[arg(long)]
    url: Option<String>,

    /// Query API base URL.
    #[arg(long)]
    query_url: Option<String>,

    /// Caller identity sent with queries.
    #[arg(long)]
    user: Option<String>,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Where downloaded spreadsheets are written.
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Do not connect to the push channel at startup.
    #[arg(long)]
    no_connect: bool,
}

/// Load settings and layer CLI flags on top.
fn resolve_settings(args: &Cli) -> Result<ParleySettings> {
    let path = args
        .settings
        .clone()
        .unwrap_or_else(parley_settings::settings_path);
    let mut settings = parley_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    apply_cli(&mut settings, args);
    settings.validate().context("Invalid command-line override")?;
    Ok(settings)
}

fn apply_cli(settings: &mut ParleySettings, args: &Cli) {
    if let Some(ref url) = args.url {
        settings.realtime.ws_url.clone_from(url);
    }
    if let Some(ref url) = args.query_url {
        settings.query.base_url.clone_from(url);
    }
    if let Some(ref user) = args.user {
        settings.query.user_id.clone_from(user);
    }
    if let Some(ref level) = args.log_level {
        settings.logging.level.clone_from(level);
    }
    if let Some(ref dir) = args.download_dir {
        settings.chat.download_dir = dir.to_string_lossy().into_owned();
    }
    if args.no_connect {
        settings.chat.auto_connect = false;
    }
}

/// Forward every realtime event into a channel the REPL drains.
fn forward_events(realtime: &RealtimeHandle) -> mpsc::UnboundedReceiver<ConnectionEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for category in [
        EventCategory::Connected,
        EventCategory::Disconnected,
        EventCategory::Error,
        EventCategory::Message,
    ] {
        let tx = tx.clone();
        let _ = realtime.on(category, move |event| {
            let _ = tx.send(event.clone());
        });
    }
    rx
}

/// Result of one query, delivered back to the input loop.
type QueryOutcome = Result<QueryResponse, QueryError>;

/// Run `request` on its own task so the input loop keeps reading lines and
/// events while the answer is pending.
fn spawn_query(
    api: Arc<dyn QueryApi>,
    request: QueryRequest,
    answers: mpsc::UnboundedSender<QueryOutcome>,
) {
    drop(tokio::spawn(async move {
        let outcome = api.query(&request).await;
        if answers.send(outcome).is_err() {
            tracing::debug!(query = %request.query, "session closed; answer dropped");
        }
    }));
}

/// Prints transcript messages once, and job updates as they change.
#[derive(Default)]
struct Printer {
    printed: usize,
}

impl Printer {
    fn flush(&mut self, transcript: &Transcript) {
        for msg in transcript.messages().iter().skip(self.printed) {
            println!("{}", render::message(msg));
        }
        self.printed = transcript.len();
    }

    fn updated(&mut self, transcript: &Transcript, id: Option<&MessageId>) {
        if let Some(msg) = id.and_then(|id| transcript.get(id)) {
            let already_shown = transcript
                .messages()
                .iter()
                .take(self.printed)
                .any(|m| m.id == msg.id);
            if already_shown {
                println!("{}", render::message(msg));
            }
        }
        self.flush(transcript);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = resolve_settings(&args)?;

    if settings.logging.json {
        parley_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        parley_core::logging::init_subscriber(&settings.logging.level);
    }
    tracing::info!(
        version = parley_core::constants::VERSION,
        ws_url = %settings.realtime.ws_url,
        query = %settings.query.endpoint(),
        "starting parley"
    );

    let realtime = ConnectionManager::start(RealtimeConfig::from(&settings.realtime));
    let mut events = forward_events(&realtime);
    let api = QueryClient::new(&settings.query).context("Failed to build query client")?;
    let mut session = ChatSession::new(
        Arc::new(api),
        Arc::new(realtime.clone()),
        settings.query.user_id.clone(),
        settings.chat.download_dir.clone(),
    );
    if settings.chat.auto_connect {
        realtime.connect();
    }

    println!("parley {} (type /help for commands)", parley_core::constants::VERSION);
    let mut speech = BufferedSpeech::new();
    let mut printer = Printer::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (answers_tx, mut answers) = mpsc::unbounded_channel();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match repl::parse(&line) {
                    Line::Quit => break,
                    Line::Empty => {}
                    Line::Text(text) if speech.is_listening() => speech.feed(&text),
                    Line::Text(text) => {
                        if let Some(request) = session.ask(&text) {
                            spawn_query(session.api(), request, answers_tx.clone());
                        }
                    }
                    Line::Connect => realtime.connect(),
                    Line::Disconnect => realtime.disconnect(),
                    Line::Retry => {
                        realtime.reset_retries();
                        realtime.connect();
                    }
                    Line::Status => println!("* connection: {}", realtime.state()),
                    Line::Listen => {
                        speech.start();
                        println!("* listening; type your question, then /send");
                    }
                    Line::Send => {
                        if speech.transcript().is_empty() {
                            speech.stop();
                            println!("* nothing captured");
                        } else if let Some(request) = session.ask_speech(&mut speech) {
                            spawn_query(session.api(), request, answers_tx.clone());
                        }
                    }
                    Line::Help => println!("{}", repl::HELP),
                    Line::Unknown(cmd) => println!("* unknown command /{cmd} (try /help)"),
                }
                printer.flush(session.transcript());
            }
            Some(outcome) = answers.recv() => {
                let _ = session.answer(outcome);
                printer.flush(session.transcript());
            }
            Some(event) = events.recv() => {
                let id = session.handle_event(&event);
                printer.updated(session.transcript(), id.as_ref());
            }
        }
    }

    realtime.disconnect();
    realtime.shutdown().await;
    tracing::info!("parley stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(argv: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("parley").chain(argv.iter().copied()))
    }

    #[test]
    fn cli_overrides_settings() {
        let args = cli(&[
            "--url",
            "wss://push.example/ws",
            "--query-url",
            "https://api.example",
            "--user",
            "dana",
            "--log-level",
            "debug",
            "--download-dir",
            "/tmp/sheets",
            "--no-connect",
        ]);
        let mut settings = ParleySettings::default();
        apply_cli(&mut settings, &args);
        assert_eq!(settings.realtime.ws_url, "wss://push.example/ws");
        assert_eq!(settings.query.base_url, "https://api.example");
        assert_eq!(settings.query.user_id, "dana");
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.chat.download_dir, "/tmp/sheets");
        assert!(!settings.chat.auto_connect);
    }

    #[test]
    fn no_flags_keep_settings() {
        let mut settings = ParleySettings::default();
        apply_cli(&mut settings, &cli(&[]));
        assert_eq!(settings.realtime.ws_url, ParleySettings::default().realtime.ws_url);
        assert!(settings.chat.auto_connect);
    }

    #[test]
    fn resolve_reads_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            serde_json::json!({"query": {"userId": "from-file"}, "chat": {"autoConnect": false}})
                .to_string(),
        )
        .unwrap();
        let path_arg = path.to_string_lossy().into_owned();
        let settings =
            resolve_settings(&cli(&["--settings", &path_arg, "--url", "ws://10.0.0.1/ws"])).unwrap();
        assert!(!settings.chat.auto_connect);
        assert_eq!(settings.realtime.ws_url, "ws://10.0.0.1/ws");
    }

    #[test]
    fn bad_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json").to_string_lossy().into_owned();
        let err = resolve_settings(&cli(&["--settings", &path, "--url", "http://nope"]));
        assert!(err.is_err());
    }

    /// Answers once `release` is notified.
    struct GatedApi {
        release: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl QueryApi for GatedApi {
        async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, QueryError> {
            self.release.notified().await;
            Ok(QueryResponse::Text {
                message: format!("answer to {}", request.query),
            })
        }
    }

    #[tokio::test]
    async fn spawned_query_does_not_block_the_caller() {
        let api = Arc::new(GatedApi {
            release: tokio::sync::Notify::new(),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = QueryRequest {
            query: "slow report".into(),
            user_id: "u1".into(),
        };

        spawn_query(Arc::clone(&api) as Arc<dyn QueryApi>, request, tx);
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err(), "answer is still pending");

        api.release.notify_one();
        let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            outcome,
            Ok(QueryResponse::Text { ref message }) if message == "answer to slow report"
        ));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
