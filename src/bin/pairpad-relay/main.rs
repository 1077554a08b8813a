//! Fan-out relay for pairpad participants.
//!
//! Usage:
//!   pairpad-relay [--listen 127.0.0.1:7341] [--config pairpad.toml] [-v]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use pairpad::sync::Relay;
use pairpad::{telemetry, PadConfig};

#[derive(Parser, Debug)]
#[command(
    name = "pairpad-relay",
    about = "Forward every edit from one pairpad participant to all the others",
    version
)]
struct Args {
    /// Listen address (overrides [relay].addr)
    #[arg(short, long, env = "PAIRPAD_RELAY_ADDR")]
    listen: Option<String>,

    /// TOML configuration file
    #[arg(short, long, env = "PAIRPAD_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum frame length in bytes (overrides [relay].max_frame_len)
    #[arg(long)]
    max_frame_len: Option<usize>,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init(args.verbose);

    let config = PadConfig::load_or_default(args.config.as_deref())?;
    let mut relay_config = config.relay.relay_config();
    if let Some(listen) = args.listen {
        relay_config.addr = listen;
    }
    if let Some(max) = args.max_frame_len {
        relay_config.max_frame_len = max;
    }

    let relay = Relay::bind(relay_config.clone())
        .await
        .with_context(|| format!("Failed to bind {}", relay_config.addr))?;
    println!("pairpad relay listening on {}", relay.local_addr()?);

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    relay.serve(shutdown).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
