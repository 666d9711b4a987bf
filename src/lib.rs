pub mod db;
pub mod guard;
pub mod health;
pub mod sensing;
pub mod session;
pub mod settings;
mod utils;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

use db::Database;
use session::{apply_message, InboundMessage, MonitorEvent, SessionController};
use settings::SettingsStore;

const DEFAULT_DATA_DIR: &str = "./eyeguard-data";

pub fn data_dir() -> PathBuf {
    std::env::var_os("EYEGUARD_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Headless driver: one session fed by newline-delimited JSON on stdin, events written as JSON
/// lines to stdout. EOF stops the session.
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("EyeGuard starting up...");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run_headless(data_dir()));
    // A blocked stdin read must not hold the process open after a `stop` message.
    runtime.shutdown_background();

    if let Err(err) = result {
        error!("EyeGuard stopped with an error: {err:?}");
        std::process::exit(1);
    }
}

pub async fn run_headless(data_dir: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    let database = Database::new(data_dir.join("eyeguard.sqlite3"))?;
    let controller = SessionController::new(database, settings.monitor());

    let recovered = controller.recover_interrupted_sessions().await?;
    if recovered > 0 {
        warn!("Recovered {recovered} incomplete session(s); marked as Interrupted");
    }

    let printer = tokio::spawn(print_events(controller.subscribe()));
    controller.start_session().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stopped = false;
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match InboundMessage::parse(line) {
            Ok(message) => message,
            Err(err) => {
                warn!("Skipping input line: {err:#}");
                continue;
            }
        };

        match apply_message(&controller, message).await {
            Ok(Some(_)) => {
                stopped = true;
                break;
            }
            Ok(None) => {}
            Err(err) => warn!("Message rejected: {err:#}"),
        }
    }

    if !stopped {
        controller.stop().await?;
    }

    if let Err(err) = printer.await {
        error!("Event printer failed: {err}");
    }

    let history = controller.history_since(Utc::now() - Duration::days(7)).await?;
    info!(
        "{} session(s) in the last 7 days, average score {:?}",
        history.sessions.len(),
        history.average_score
    );

    Ok(())
}

/// Writes every event as one JSON line until the session completes.
async fn print_events(mut events: broadcast::Receiver<MonitorEvent>) {
    let mut stdout = tokio::io::stdout();

    loop {
        match events.recv().await {
            Ok(event) => {
                let done = matches!(event, MonitorEvent::SessionCompleted { .. });
                match serde_json::to_string(&event) {
                    Ok(mut line) => {
                        line.push('\n');
                        if let Err(err) = stdout.write_all(line.as_bytes()).await {
                            error!("Failed to write event: {err}");
                            break;
                        }
                        let _ = stdout.flush().await;
                    }
                    Err(err) => error!("Failed to serialize event: {err}"),
                }
                if done {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!("Event printer lagged, skipped {skipped}"),
            Err(RecvError::Closed) => break,
        }
    }
}
