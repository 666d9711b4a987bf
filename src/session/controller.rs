use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::db::{Database, Session, SessionInfo, SessionStatus};
use crate::health::EyeHealthScore;
use crate::sensing::{sanitize_lux, FaceObservation, FrameSample};
use crate::settings::MonitorSettings;

use super::engine::{SessionEngine, SessionSnapshot};
use super::events::{EventBus, MonitorEvent};
use super::scheduler::RecurringTask;
use super::worker::{session_loop, Control, LoopChannels};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const EVENT_BUS_CAPACITY: usize = 256;
const CONTROL_QUEUE_DEPTH: usize = 8;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistory {
    pub since: DateTime<Utc>,
    pub average_score: Option<f64>,
    pub sessions: Vec<SessionInfo>,
}

struct ActiveSession {
    session_id: String,
    control_tx: mpsc::Sender<Control>,
    frame_tx: mpsc::Sender<FrameSample>,
    ticker: RecurringTask,
    handle: JoinHandle<()>,
}

/// Lifecycle of monitoring sessions. At most one session is active at a time; its components
/// live inside a dedicated loop task and are only reached through messages.
#[derive(Clone)]
pub struct SessionController {
    db: Database,
    settings: MonitorSettings,
    events: EventBus,
    scores: Arc<watch::Sender<Option<EyeHealthScore>>>,
    ambient_lux: Arc<watch::Sender<Option<f32>>>,
    active: Arc<Mutex<Option<ActiveSession>>>,
}

impl SessionController {
    pub fn new(db: Database, mut settings: MonitorSettings) -> Self {
        let debug_mode = std::env::var("EYEGUARD_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            settings.heartbeat_every_ticks = 1;
        }

        let (scores, _) = watch::channel(None);
        let (ambient_lux, _) = watch::channel(None);

        Self {
            db,
            settings,
            events: EventBus::new(EVENT_BUS_CAPACITY),
            scores: Arc::new(scores),
            ambient_lux: Arc::new(ambient_lux),
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Last score of the current or most recent session.
    pub fn latest_score(&self) -> Option<EyeHealthScore> {
        self.scores.borrow().clone()
    }

    pub fn subscribe_scores(&self) -> watch::Receiver<Option<EyeHealthScore>> {
        self.scores.subscribe()
    }

    pub fn ambient_lux(&self) -> Option<f32> {
        *self.ambient_lux.borrow()
    }

    pub async fn active_session_id(&self) -> Option<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| active.session_id.clone())
    }

    /// Sessions a previous process left `Running` or `Paused` are closed as `Interrupted`.
    pub async fn recover_interrupted_sessions(&self) -> Result<usize> {
        let incomplete = self.db.get_incomplete_sessions().await?;
        let now = Utc::now();

        for session in &incomplete {
            self.db
                .mark_session_status(
                    &session.id,
                    SessionStatus::Interrupted,
                    Some(session.updated_at),
                    now,
                )
                .await?;
            log_warn!("marked session {} as interrupted", session.id);
        }

        Ok(incomplete.len())
    }

    pub async fn start_session(&self) -> Result<String> {
        if self.active.lock().await.is_some() {
            bail!("a monitoring session is already active");
        }

        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        self.db
            .insert_session(&Session::started(session_id.clone(), started_at))
            .await?;

        let mut guard = self.active.lock().await;
        if guard.is_some() {
            drop(guard);
            self.db
                .mark_session_status(
                    &session_id,
                    SessionStatus::Interrupted,
                    Some(started_at),
                    Utc::now(),
                )
                .await?;
            bail!("a monitoring session is already active");
        }

        self.scores.send_replace(None);

        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_DEPTH);
        let (frame_tx, frame_rx) = mpsc::channel(self.settings.frame_queue_depth.max(1));
        let (tick_tx, tick_rx) = mpsc::channel::<Instant>(1);

        let engine = SessionEngine::new(
            session_id.clone(),
            started_at,
            &self.settings,
            Instant::now(),
        );
        let channels = LoopChannels {
            control_rx,
            tick_rx,
            frame_rx,
            lux_rx: self.ambient_lux.subscribe(),
            scores_tx: self.scores.clone(),
        };

        let handle = tokio::spawn(session_loop(
            engine,
            channels,
            self.db.clone(),
            self.events.clone(),
            self.settings.heartbeat_every_ticks,
        ));

        // A full queue means the loop has not consumed the previous tick yet; skipping is fine.
        let ticker = RecurringTask::spawn(
            Duration::from_millis(self.settings.tick_interval_ms.max(1)),
            move |at| match tick_tx.try_send(at) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
        );

        *guard = Some(ActiveSession {
            session_id: session_id.clone(),
            control_tx,
            frame_tx,
            ticker,
            handle,
        });
        drop(guard);

        self.events.publish(MonitorEvent::SessionStarted {
            session_id: session_id.clone(),
            started_at,
        });
        log_info!("session {session_id} started");

        Ok(session_id)
    }

    pub async fn submit_observation(&self, observation: FaceObservation) -> Result<()> {
        let sample = observation
            .into_sample()
            .context("rejected face observation")?;
        self.submit_frame(sample).await
    }

    /// Queue a frame without waiting. When the loop falls behind, the frame is dropped; the
    /// next one supersedes it anyway.
    pub async fn submit_frame(&self, sample: FrameSample) -> Result<()> {
        let frame_tx = {
            let guard = self.active.lock().await;
            match guard.as_ref() {
                Some(active) => active.frame_tx.clone(),
                None => bail!("no active session to receive frames"),
            }
        };

        match frame_tx.try_send(sample) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                log_debug!("frame queue full, dropping frame");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(anyhow!("session loop has stopped")),
        }
    }

    /// Invalid readings are ignored; the last valid value stays cached across sessions.
    pub fn update_ambient_lux(&self, lux: f32) {
        match sanitize_lux(lux) {
            Some(lux) => {
                self.ambient_lux.send_replace(Some(lux));
            }
            None => log_debug!("ignoring invalid ambient light reading {lux}"),
        }
    }

    /// The loop records the `Paused` status before replying, so a racing `stop` always
    /// finalizes after it.
    pub async fn pause(&self) -> Result<()> {
        let (session_id, control_tx) = self.active_handles().await?;
        let (reply_tx, reply_rx) = oneshot::channel();
        send_control(&control_tx, Control::Pause { reply: reply_tx }).await?;
        await_reply(reply_rx).await??;

        log_info!("session {session_id} paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        let (session_id, control_tx) = self.active_handles().await?;
        let (reply_tx, reply_rx) = oneshot::channel();
        send_control(&control_tx, Control::Resume { reply: reply_tx }).await?;
        await_reply(reply_rx).await??;

        log_info!("session {session_id} resumed");
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<Option<SessionSnapshot>> {
        let control_tx = {
            let guard = self.active.lock().await;
            match guard.as_ref() {
                Some(active) => active.control_tx.clone(),
                None => return Ok(None),
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        send_control(&control_tx, Control::Snapshot { reply: reply_tx }).await?;
        Ok(Some(await_reply(reply_rx).await?))
    }

    /// Stop the active session. The final record is persisted before this returns.
    pub async fn stop(&self) -> Result<SessionInfo> {
        let active = self
            .active
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("no active session to stop"))?;

        if let Err(err) = active.ticker.stop().await {
            log_warn!("ticker for session {} did not stop cleanly: {err:?}", active.session_id);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        send_control(&active.control_tx, Control::Stop { reply: reply_tx }).await?;
        let session = await_reply(reply_rx).await?;
        active
            .handle
            .await
            .context("session loop task failed to join")?;

        self.db.finalize_session(&session).await?;

        let info = SessionInfo::from(session);
        self.events.publish(MonitorEvent::SessionCompleted {
            session: info.clone(),
        });
        log_info!(
            "session {} completed with score {:?}",
            info.id,
            info.final_score.map(|score| score.total_score)
        );

        Ok(info)
    }

    /// Sessions started since `since` plus their average final score.
    pub async fn history_since(&self, since: DateTime<Utc>) -> Result<SessionHistory> {
        let average_score = self.db.average_score_since(since).await?;
        let sessions = self
            .db
            .list_sessions_since(since)
            .await?
            .into_iter()
            .map(SessionInfo::from)
            .collect();

        Ok(SessionHistory {
            since,
            average_score,
            sessions,
        })
    }

    async fn active_handles(&self) -> Result<(String, mpsc::Sender<Control>)> {
        let guard = self.active.lock().await;
        let active = guard
            .as_ref()
            .ok_or_else(|| anyhow!("no active session"))?;
        Ok((active.session_id.clone(), active.control_tx.clone()))
    }
}

async fn send_control(control_tx: &mpsc::Sender<Control>, control: Control) -> Result<()> {
    control_tx
        .send(control)
        .await
        .map_err(|_| anyhow!("session loop has stopped"))
}

async fn await_reply<T>(reply_rx: oneshot::Receiver<T>) -> Result<T> {
    reply_rx
        .await
        .map_err(|_| anyhow!("session loop dropped the reply"))
}
