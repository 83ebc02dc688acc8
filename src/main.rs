use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use confcraft::backend::HttpBackend;
use confcraft::core::config::{self, ResolvedConfig};
use confcraft::core::diff::DiffStats;
use confcraft::core::dispatcher::{DispatchError, MessageDispatcher, SendOutcome};
use confcraft::core::export::export_artifacts;
use confcraft::core::store::ArtifactView;
use simplelog::{ConfigBuilder, WriteLogger};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "confcraft", about = "Chat your way to agent and workflow configs")]
struct Args {
    /// Backend base URL (overrides config file and CONFCRAFT_BACKEND_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Load this session instead of starting with a new one
    #[arg(long)]
    session: Option<String>,

    /// Skip the start-up health check
    #[arg(long)]
    offline: bool,
}

/// One line of user input.
#[derive(Debug, PartialEq)]
enum Command {
    Send(String),
    New(Option<String>),
    Load(String),
    Delete(String),
    DeleteAll,
    List,
    Export(PathBuf),
    Health,
    Quit,
    Help,
    Empty,
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        if !line.starts_with('/') {
            return Command::Send(line.to_string());
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        match (verb, arg) {
            ("/new", name) => Command::New(name),
            ("/load", Some(id)) => Command::Load(id),
            ("/delete", Some(id)) => Command::Delete(id),
            ("/delete-all", None) => Command::DeleteAll,
            ("/list", None) => Command::List,
            ("/export", Some(dir)) => Command::Export(PathBuf::from(dir)),
            ("/health", None) => Command::Health,
            ("/quit", None) => Command::Quit,
            _ => Command::Help,
        }
    }
}

const HELP: &str = "Commands:
  <text>          send a message
  /new [name]     start a new session
  /load <id>      switch to a session
  /delete <id>    delete a session
  /delete-all     delete every session
  /list           list sessions
  /export <dir>   write artifacts to a directory
  /health         check the backend
  /quit           exit";

fn print_views(views: &[ArtifactView]) {
    for view in views.iter().filter(|v| v.changed) {
        let stats = DiffStats::of(&view.lines);
        println!(
            "── {} (+{} -{}) ──",
            view.name, stats.inserted, stats.deleted
        );
        for line in &view.lines {
            println!("{line}");
        }
    }
}

fn print_outcome(outcome: &SendOutcome) {
    if outcome.used_fallback {
        println!("[offline]");
    }
    println!("{}", outcome.reply.content);
    print_views(&outcome.artifacts);
}

fn print_roster(dispatcher: &MessageDispatcher) {
    let store = dispatcher.store();
    let active = store.active_id();
    if store.roster().is_empty() {
        println!("(no sessions)");
    }
    for summary in store.roster() {
        let marker = if Some(summary.id.as_str()) == active { '*' } else { ' ' };
        println!(
            "{marker} {}  {}  ({} messages)  {}",
            summary.id, summary.name, summary.message_count, summary.last_message_preview
        );
    }
}

/// Runs one command. Returns false when the loop should stop.
async fn execute(dispatcher: &MessageDispatcher, command: Command) -> Result<bool, DispatchError> {
    match command {
        Command::Empty => {}
        Command::Quit => return Ok(false),
        Command::Help => println!("{HELP}"),
        Command::Send(text) => print_outcome(&dispatcher.send(&text).await?),
        Command::New(name) => {
            let id = dispatcher.create_session(name.as_deref()).await?;
            println!("Started session {id}");
        }
        Command::Load(id) => {
            dispatcher.load_session(&id).await?;
            println!("Loaded session {id}");
            let views = dispatcher.artifact_views();
            for view in views {
                println!("── {} ──\n{}", view.name, view.content);
            }
        }
        Command::Delete(id) => {
            dispatcher.delete_session(&id).await?;
            println!("Deleted session {id}");
        }
        Command::DeleteAll => {
            dispatcher.delete_all_sessions().await?;
            println!("Deleted all sessions");
        }
        Command::List => {
            dispatcher.refresh_roster().await?;
            print_roster(dispatcher);
        }
        Command::Export(dir) => {
            let artifacts = dispatcher.store().artifacts().cloned();
            match artifacts {
                Some(artifacts) => match export_artifacts(&dir, &artifacts) {
                    Ok(paths) => {
                        for path in paths {
                            println!("Wrote {}", path.display());
                        }
                    }
                    Err(e) => println!("Export failed: {e}"),
                },
                None => return Err(DispatchError::NoActiveSession),
            }
        }
        Command::Health => {
            let status = if dispatcher.health_check().await { "reachable" } else { "unreachable" };
            println!("Backend {status}");
        }
    }
    Ok(true)
}

fn init_logging(config: &ResolvedConfig) {
    // Initialize file logger - writes to confcraft.log in current directory
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create("confcraft.log") {
        let _ = WriteLogger::init(config.log_level, log_config, log_file);
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let file_config = config::load_config().unwrap_or_else(|e| {
        eprintln!("Ignoring config file: {e}");
        config::ConfcraftConfig::default()
    });
    let resolved = config::resolve(&file_config, args.base_url.as_deref());
    init_logging(&resolved);

    log::info!("Confcraft starting up with backend: {}", resolved.base_url);

    let backend = HttpBackend::new(resolved.base_url.clone(), resolved.timeout)
        .map_err(std::io::Error::other)?;
    let dispatcher = MessageDispatcher::from_config(Arc::new(backend), &resolved);

    if !args.offline && !dispatcher.health_check().await {
        println!(
            "Backend at {} is unreachable; replies will be generated locally.",
            resolved.base_url
        );
    }

    if let Some(id) = args.session {
        if let Err(e) = execute(&dispatcher, Command::Load(id)).await {
            println!("Error: {e}");
        }
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match execute(&dispatcher, Command::parse(&line)).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("Error: {e}"),
        }
    }

    log::info!("Confcraft shutting down");
    Ok(())
}
