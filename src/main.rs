//! Duel Sim - console host for the duel simulation
//!
//! Runs one match at the fixed tick rate. Host input arrives as lines on
//! stdin (see `host::console`); events go out as JSON lines on stdout.
//! Logs go to stderr.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use duel_sim::config::Config;
use duel_sim::game::GameMatch;
use duel_sim::host::console::{forward_events, read_commands};
use duel_sim::host::protocol::HostMsg;

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run());
    // A pending stdin read cannot be cancelled; don't wait on it
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn run() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // A bad tuning table must stop us before any match starts
    let tuning = Arc::new(config.load_tuning()?);

    let match_id = Uuid::new_v4();
    let seed = config.seed.unwrap_or_else(|| {
        let (hi, lo) = match_id.as_u64_pair();
        hi ^ lo
    });

    info!("Starting Duel Sim");
    info!(%match_id, seed, levels = tuning.levels.len(), "Match configured");

    let (game, handle) = GameMatch::new(match_id, seed, tuning, config.snapshot_interval)?;

    let events = handle.subscribe();
    let writer = tokio::spawn(async move {
        if let Err(e) = forward_events(events, tokio::io::stdout()).await {
            error!(error = %e, "Event writer failed");
        }
    });

    let mut match_task = tokio::spawn(game.run());
    let reader = read_commands(BufReader::new(tokio::io::stdin()), handle.input_tx.clone());

    tokio::select! {
        _ = &mut match_task => {}
        result = reader => {
            if let Err(e) = result {
                error!(error = %e, "Console input failed");
            }
            let _ = handle.input_tx.send(HostMsg::Shutdown).await;
            let _ = match_task.await;
        }
        _ = shutdown_signal() => {
            let _ = handle.input_tx.send(HostMsg::Shutdown).await;
            let _ = match_task.await;
        }
    }

    // Close the event channel so the writer drains and exits
    drop(handle);
    let _ = writer.await;

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging. Stdout carries the event stream, so logs
/// go to stderr.
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
