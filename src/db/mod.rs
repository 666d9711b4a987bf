//! Session history in SQLite.
//!
//! The connection is opened and migrated on the caller's thread, then moved onto a worker thread
//! that owns it until the last `Database` handle is dropped. Repositories submit closures and
//! await the result.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use models::{Session, SessionInfo, SessionProgress, SessionScore, SessionStatus};

use migrations::run_migrations;

/// Rows a live session still owns. Finalized rows never match, so a late write cannot reopen them.
const OPEN_SESSION: &str = "status IN ('Running', 'Paused')";

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

struct Worker {
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(mut conn: Connection) -> Result<Self> {
        let (jobs, queue) = mpsc::channel::<Job>();
        let thread = thread::Builder::new()
            .name("eyeguard-db".into())
            .spawn(move || {
                for job in queue {
                    job(&mut conn);
                }
                info!("Session store closed");
            })
            .context("failed to spawn database thread")?;

        Ok(Self {
            jobs: Some(jobs),
            thread: Some(thread),
        })
    }
}

impl Drop for Worker {
    // Closing the queue lets the thread drain pending jobs and exit.
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Database thread panicked");
            }
        }
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open session store {}", path.display()))?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }
    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let conn = open_connection(&db_path)?;
        let worker = Worker::spawn(conn)?;
        info!("Session store ready at {}", db_path.display());

        Ok(Self {
            worker: Arc::new(worker),
        })
    }

    async fn with_conn<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let jobs = self
            .worker
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("session store is closed"))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        jobs.send(Box::new(move |conn| {
            let _ = reply_tx.send(task(conn));
        }))
        .map_err(|_| anyhow!("session store thread has exited"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("session store dropped the request"))?
    }
}
