use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::db::{Database, Session, SessionStatus};
use crate::health::EyeHealthScore;
use crate::sensing::FrameSample;

use super::engine::{SessionEngine, SessionSnapshot};
use super::events::{EventBus, MonitorEvent};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Priority messages from the controller. Each carries its own reply channel.
pub(super) enum Control {
    Pause {
        reply: oneshot::Sender<Result<DateTime<Utc>>>,
    },
    Resume {
        reply: oneshot::Sender<Result<DateTime<Utc>>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Stop {
        reply: oneshot::Sender<Session>,
    },
}

pub(super) struct LoopChannels {
    pub control_rx: mpsc::Receiver<Control>,
    pub tick_rx: mpsc::Receiver<Instant>,
    pub frame_rx: mpsc::Receiver<FrameSample>,
    pub lux_rx: watch::Receiver<Option<f32>>,
    pub scores_tx: Arc<watch::Sender<Option<EyeHealthScore>>>,
}

/// Single owner of a session. Control messages win over ticks, ticks over frames, so a pause
/// or stop is always applied before anything still queued behind it. Status writes for pause and
/// resume happen here before the reply, which orders them ahead of the final record.
pub(super) async fn session_loop(
    mut engine: SessionEngine,
    channels: LoopChannels,
    db: Database,
    events: EventBus,
    heartbeat_every_ticks: u32,
) {
    let LoopChannels {
        mut control_rx,
        mut tick_rx,
        mut frame_rx,
        lux_rx,
        scores_tx,
    } = channels;
    let heartbeat_every = heartbeat_every_ticks.max(1);
    let mut ticks: u32 = 0;

    loop {
        tokio::select! {
            biased;

            control = control_rx.recv() => {
                let Some(control) = control else {
                    log_info!("session {} controller went away", engine.session_id());
                    break;
                };

                match control {
                    Control::Pause { reply } => {
                        let outcome = engine.pause(Instant::now());
                        let id = engine.session_id();
                        let result =
                            record_transition(&db, &events, id, outcome, SessionStatus::Paused).await;
                        let _ = reply.send(result);
                    }
                    Control::Resume { reply } => {
                        let outcome = engine.resume(Instant::now());
                        let id = engine.session_id();
                        let result =
                            record_transition(&db, &events, id, outcome, SessionStatus::Running).await;
                        let _ = reply.send(result);
                    }
                    Control::Snapshot { reply } => {
                        let _ = reply.send(engine.snapshot(Instant::now()));
                    }
                    Control::Stop { reply } => {
                        let session = engine.finish(Instant::now(), Utc::now());
                        log_info!(
                            "session {} stopped after {}ms active",
                            session.id,
                            session.active_ms
                        );
                        let _ = reply.send(session);
                        break;
                    }
                }
            }

            Some(at) = tick_rx.recv() => {
                engine.set_ambient_lux(*lux_rx.borrow());

                for event in engine.tick(at) {
                    if let MonitorEvent::Score { score, .. } = &event {
                        scores_tx.send_replace(Some(score.clone()));
                    }
                    log_event(&event);
                    events.publish(event);
                }

                ticks = ticks.wrapping_add(1);
                if ticks % heartbeat_every == 0 {
                    let progress = engine.progress(at, Utc::now());
                    match db.update_session_progress(engine.session_id(), progress).await {
                        Ok(true) => {}
                        Ok(false) => log_warn!("session {} row is no longer open", engine.session_id()),
                        Err(err) => {
                            log_error!("heartbeat failed for session {}: {err:?}", engine.session_id())
                        }
                    }
                }
            }

            Some(sample) = frame_rx.recv() => {
                for event in engine.ingest_frame(sample, Instant::now()) {
                    log_event(&event);
                    events.publish(event);
                }
            }
        }
    }

    let mut discarded = 0usize;
    while frame_rx.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        log_debug!("discarded {discarded} frames queued behind stop");
    }
}

async fn record_transition(
    db: &Database,
    events: &EventBus,
    session_id: &str,
    outcome: Result<Vec<MonitorEvent>>,
    status: SessionStatus,
) -> Result<DateTime<Utc>> {
    let emitted = outcome?;
    for event in &emitted {
        log_event(event);
    }
    events.publish_all(emitted);

    let at = Utc::now();
    if !db.mark_session_status(session_id, status, None, at).await? {
        log_warn!("session {session_id} row is no longer open; {} not recorded", status.as_str());
    }
    Ok(at)
}

fn log_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::Guard {
            session_id,
            transition,
        } => log_info!(
            "session {session_id}: guard {:?} ({})",
            transition.target(),
            transition.reason().as_str()
        ),
        MonitorEvent::Alert { session_id, alert } => {
            log_info!("session {session_id}: {alert:?}")
        }
        MonitorEvent::Score { session_id, score } => log_debug!(
            "session {session_id}: score {} risk {:?}",
            score.total_score,
            score.predicted_risk
        ),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::Measurement;
    use crate::settings::MonitorSettings;
    use tokio::sync::broadcast::error::TryRecvError;

    const ID: &str = "loop";

    struct Queues {
        control: mpsc::Sender<Control>,
        ticks: mpsc::Sender<Instant>,
        frames: mpsc::Sender<FrameSample>,
    }

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("eyeguard.sqlite3")).unwrap();
        (dir, db)
    }

    async fn open_session(db: &Database) -> (Queues, SessionEngine, LoopChannels) {
        let started_at = Utc::now();
        db.insert_session(&Session::started(ID.into(), started_at))
            .await
            .unwrap();

        let (control, control_rx) = mpsc::channel(8);
        let (ticks, tick_rx) = mpsc::channel(8);
        let (frames, frame_rx) = mpsc::channel(8);
        let (_, lux_rx) = watch::channel(None);
        let (scores_tx, _) = watch::channel(None);

        let engine = SessionEngine::new(
            ID.into(),
            started_at,
            &MonitorSettings::default(),
            Instant::now(),
        );
        let channels = LoopChannels {
            control_rx,
            tick_rx,
            frame_rx,
            lux_rx,
            scores_tx: Arc::new(scores_tx),
        };
        (
            Queues {
                control,
                ticks,
                frames,
            },
            engine,
            channels,
        )
    }

    fn frame(eyes_open: bool) -> FrameSample {
        let p = if eyes_open { 0.9 } else { 0.1 };
        FrameSample::Face(Measurement {
            face_coverage: 0.45,
            ambient_lux: None,
            head_tilt_degrees: None,
            left_eye_open_probability: Some(p),
            right_eye_open_probability: Some(p),
            face_landmarks_valid: true,
        })
    }

    async fn queue_work(queues: &Queues) {
        for open in [false, true, false, true] {
            queues.frames.send(frame(open)).await.unwrap();
        }
        queues.ticks.send(Instant::now()).await.unwrap();
    }

    #[tokio::test]
    async fn stop_wins_over_queued_frames_and_ticks() {
        let (_dir, db) = open_db();
        let (queues, engine, channels) = open_session(&db).await;
        let events = EventBus::new(16);
        let mut seen = events.subscribe();

        queue_work(&queues).await;
        let (reply, stopped) = oneshot::channel();
        queues.control.send(Control::Stop { reply }).await.unwrap();

        session_loop(engine, channels, db.clone(), events, 1).await;

        let session = stopped.await.unwrap();
        assert_eq!(session.blink_count, 0);
        assert_eq!(session.score, None);
        assert!(queues.frames.is_closed());
        assert!(matches!(seen.try_recv(), Err(TryRecvError::Empty)));

        let stored = db.get_session(ID).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Running);
        assert_eq!(stored.active_ms, 0);
    }

    #[tokio::test]
    async fn pause_queued_ahead_of_stop_is_recorded_before_the_final_record() {
        let (_dir, db) = open_db();
        let (queues, engine, channels) = open_session(&db).await;

        queue_work(&queues).await;
        let (pause_reply, paused) = oneshot::channel();
        queues
            .control
            .send(Control::Pause { reply: pause_reply })
            .await
            .unwrap();
        let (stop_reply, stopped) = oneshot::channel();
        queues
            .control
            .send(Control::Stop { reply: stop_reply })
            .await
            .unwrap();

        session_loop(engine, channels, db.clone(), EventBus::new(16), 1).await;

        assert!(paused.await.unwrap().is_ok());
        assert_eq!(
            db.get_session(ID).await.unwrap().unwrap().status,
            SessionStatus::Paused
        );

        let session = stopped.await.unwrap();
        assert_eq!(session.blink_count, 0);
        db.finalize_session(&session).await.unwrap();

        let stored = db.get_session(ID).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert!(!db
            .mark_session_status(ID, SessionStatus::Paused, None, Utc::now())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn status_is_stored_before_the_control_reply() {
        let (_dir, db) = open_db();
        let (queues, engine, channels) = open_session(&db).await;
        let handle = tokio::spawn(session_loop(
            engine,
            channels,
            db.clone(),
            EventBus::new(16),
            1,
        ));

        let (reply, paused) = oneshot::channel();
        queues.control.send(Control::Pause { reply }).await.unwrap();
        paused.await.unwrap().unwrap();
        let stored = db.get_session(ID).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Paused);

        let (reply, resumed) = oneshot::channel();
        queues.control.send(Control::Resume { reply }).await.unwrap();
        resumed.await.unwrap().unwrap();
        let stored = db.get_session(ID).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Running);

        let (reply, rejected) = oneshot::channel();
        queues.control.send(Control::Resume { reply }).await.unwrap();
        assert!(rejected.await.unwrap().is_err());

        let (reply, stopped) = oneshot::channel();
        queues.control.send(Control::Stop { reply }).await.unwrap();
        stopped.await.unwrap();
        handle.await.unwrap();

        let (reply, _) = oneshot::channel();
        assert!(queues.control.send(Control::Pause { reply }).await.is_err());
    }
}
