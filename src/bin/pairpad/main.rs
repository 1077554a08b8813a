//! Terminal participant for a pairpad session.
//!
//! Usage:
//!   pairpad [--relay 127.0.0.1:7341] [--offline] [--config pairpad.toml] [-v]

mod repl;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use pairpad::config::BackendConfig;
use pairpad::sync::ChannelHandle;
use pairpad::{
    telemetry, OriginId, PadConfig, Participant, ParticipantCommand, Sandbox,
    SessionState, SuggestionClient,
};
use repl::Input;

#[derive(Parser, Debug)]
#[command(
    name = "pairpad",
    about = "Edit, run and discuss one shared code buffer from the terminal",
    version
)]
struct Args {
    /// Relay address (overrides [relay].addr)
    #[arg(short, long, env = "PAIRPAD_RELAY_ADDR")]
    relay: Option<String>,

    /// Work locally without connecting to a relay
    #[arg(long)]
    offline: bool,

    /// TOML configuration file
    #[arg(short, long, env = "PAIRPAD_CONFIG")]
    config: Option<PathBuf>,

    /// Participant id (random when omitted)
    #[arg(long)]
    origin: Option<String>,

    /// Advisory backend base URL (switches to the HTTP backend)
    #[arg(long, env = "PAIRPAD_ADVISOR_URL")]
    advisor_url: Option<String>,

    /// Formatter command, e.g. "prettier --parser babel"
    #[arg(long)]
    formatter: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init(args.verbose);

    let mut config = PadConfig::load_or_default(args.config.as_deref())?;
    if let Some(relay) = args.relay {
        config.relay.addr = relay;
    }
    if let Some(base_url) = args.advisor_url {
        config.suggestions.backend = BackendConfig::Http { base_url };
    }
    if let Some(command) = args.formatter {
        config.formatter.command = command.split_whitespace().map(str::to_string).collect();
    }

    let origin_id = args.origin.map(OriginId::new).unwrap_or_else(OriginId::generate);
    let backend = config
        .suggestions
        .backend
        .build()
        .context("Failed to create advisory backend")?;
    let suggestions = SuggestionClient::new(backend)
        .with_debounce(config.suggestions.debounce())
        .with_request_timeout(config.suggestions.request_timeout());

    let mut participant = Participant::new(
        SessionState::new(origin_id.clone()),
        Sandbox::new(config.sandbox.clone()),
        suggestions,
    );
    if let Some(formatter) = config.formatter.formatter() {
        participant = participant.with_formatter(formatter);
    }

    if args.offline {
        println!("pairpad {origin_id} (offline)");
    } else {
        match ChannelHandle::connect(&config.relay.channel_config(), origin_id.clone()).await {
            Ok(channel) => {
                println!("pairpad {origin_id} connected to {}", config.relay.addr);
                participant = participant.with_channel(channel);
            }
            Err(err) => {
                eprintln!(
                    "Warning: could not reach relay {}: {err}; editing locally",
                    config.relay.addr
                );
            }
        }
    }
    println!("{}", repl::HELP);

    let (commands_tx, commands_rx) = mpsc::channel(32);
    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
    let session_task = tokio::spawn(participant.run(commands_rx, updates_tx));
    let input_task = tokio::spawn(read_commands(commands_tx));

    while let Some(update) = updates_rx.recv().await {
        println!("{}", repl::render(&update));
    }

    let session = session_task.await.context("Session task failed")?;
    input_task.abort();
    println!(
        "Left session at revision {} with {} snapshot(s)",
        session.revision(),
        session.history().len()
    );
    Ok(())
}

/// Forwards stdin lines as commands until EOF or `:quit`.
async fn read_commands(commands: mpsc::Sender<ParticipantCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                eprintln!("Error reading input: {err}");
                break;
            }
        };

        let command = match repl::parse_line(&line) {
            Ok(Input::Command(command)) => command,
            Ok(Input::Load(path)) => match load(&path) {
                Ok(content) => ParticipantCommand::Edit(content),
                Err(err) => {
                    eprintln!("Error: {err:#}");
                    continue;
                }
            },
            Ok(Input::Help) => {
                println!("{}", repl::HELP);
                continue;
            }
            Ok(Input::Empty) => continue,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };

        let quit = command == ParticipantCommand::Quit;
        if commands.send(command).await.is_err() || quit {
            return;
        }
    }
    let _ = commands.send(ParticipantCommand::Quit).await;
}

fn load(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
