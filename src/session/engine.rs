use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::db::{Session, SessionProgress, SessionScore, SessionStatus};
use crate::guard::{
    AlertEvent, BlinkAlertTimer, GuardState, GuardStatus, GuardTransition, ScreenGuardStateMachine,
};
use crate::health::{EyeHealthMonitor, EyeHealthScore};
use crate::sensing::{sanitize_lux, FrameSample};
use crate::settings::MonitorSettings;

use super::events::MonitorEvent;
use super::state::{MonitorStatus, SessionState};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub guard: GuardState,
    pub alert_active: bool,
    pub blink_count: u32,
    pub blink_rate_per_minute: f32,
    pub ambient_lux: Option<f32>,
    pub latest_score: Option<EyeHealthScore>,
}

/// All per-session components behind one owner. Time is always passed in, so the engine is
/// synchronous and deterministic; the session loop decides when things happen.
///
/// Frames are cheap: they only feed blink detection and replace the pending frame. Scoring,
/// the guard and the alert check run once per tick against the most recent frame.
#[derive(Debug)]
pub struct SessionEngine {
    state: SessionState,
    monitor: EyeHealthMonitor,
    guard: ScreenGuardStateMachine,
    alert: BlinkAlertTimer,
    ambient_lux: Option<f32>,
    pending: Option<FrameSample>,
    latest_score: Option<EyeHealthScore>,
    total_blinks: u32,
}

impl SessionEngine {
    pub fn new(
        session_id: String,
        started_at: DateTime<Utc>,
        settings: &MonitorSettings,
        now: Instant,
    ) -> Self {
        Self {
            state: SessionState::begin(session_id, started_at, now),
            monitor: EyeHealthMonitor::new(
                settings.scoring.clone(),
                settings.blink.clone(),
                settings.prediction.clone(),
                now,
            ),
            guard: ScreenGuardStateMachine::new(settings.guard.clone()),
            alert: BlinkAlertTimer::new(&settings.alert, now),
            ambient_lux: None,
            pending: None,
            latest_score: None,
            total_blinks: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.state.session_id
    }

    pub fn status(&self) -> MonitorStatus {
        self.state.status
    }

    pub fn guard_status(&self) -> GuardStatus {
        self.guard.status()
    }

    pub fn alert_active(&self) -> bool {
        self.alert.is_active()
    }

    pub fn latest_score(&self) -> Option<&EyeHealthScore> {
        self.latest_score.as_ref()
    }

    /// Blinks across the whole session, including those before a pause.
    pub fn total_blinks(&self) -> u32 {
        self.total_blinks
    }

    /// Cache the latest light reading; invalid values leave the cache untouched.
    pub fn set_ambient_lux(&mut self, lux: Option<f32>) {
        if let Some(lux) = lux.and_then(sanitize_lux) {
            self.ambient_lux = Some(lux);
        }
    }

    /// Frames for a paused or stopped session are dropped.
    pub fn ingest_frame(&mut self, sample: FrameSample, now: Instant) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        if !self.state.is_running() {
            return events;
        }

        if let FrameSample::Face(measurement) = &sample {
            if self.monitor.observe_eyes(measurement, now) {
                self.total_blinks = self.total_blinks.saturating_add(1);
                if let Some(alert) = self.alert.on_blink(now) {
                    events.push(self.alert_event(alert));
                }
            }
        }

        self.pending = Some(sample);
        events
    }

    pub fn tick(&mut self, now: Instant) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        if !self.state.is_running() {
            return events;
        }
        self.state.sync(now);

        if let Some(sample) = self.pending.take() {
            if let FrameSample::Face(measurement) = sample {
                let lux = measurement.ambient_lux.or(self.ambient_lux);
                let measurement = measurement.with_ambient_lux(lux);
                let score = self.monitor.evaluate(&measurement, now);
                self.latest_score = Some(score.clone());
                events.push(MonitorEvent::Score {
                    session_id: self.state.session_id.clone(),
                    score,
                });
            }

            if let Some(transition) = self.guard.evaluate(&sample) {
                if matches!(transition, GuardTransition::Freeze { .. }) {
                    if let Some(alert) = self.alert.restart(now) {
                        events.push(self.alert_event(alert));
                    }
                }
                events.push(self.guard_event(transition));
            }
        }

        let eligible = self.guard.status() == GuardStatus::Clear;
        if let Some(alert) = self.alert.check(now, eligible) {
            events.push(self.alert_event(alert));
        }

        events
    }

    pub fn pause(&mut self, now: Instant) -> Result<Vec<MonitorEvent>> {
        if !self.state.pause(now) {
            bail!("session {} is not running", self.state.session_id);
        }
        self.pending = None;

        let mut events = Vec::new();
        if let Some(transition) = self.guard.pause() {
            events.push(self.guard_event(transition));
        }
        if let Some(alert) = self.alert.restart(now) {
            events.push(self.alert_event(alert));
        }
        events.push(MonitorEvent::SessionPaused {
            session_id: self.state.session_id.clone(),
        });
        Ok(events)
    }

    /// Resuming starts a fresh blink window, blink-rate clock and trend history.
    pub fn resume(&mut self, now: Instant) -> Result<Vec<MonitorEvent>> {
        if !self.state.resume(now) {
            bail!("session {} is not paused", self.state.session_id);
        }
        self.guard.resume();
        self.monitor.reset_session(now);

        let mut events = Vec::new();
        if let Some(alert) = self.alert.restart(now) {
            events.push(self.alert_event(alert));
        }
        events.push(MonitorEvent::SessionResumed {
            session_id: self.state.session_id.clone(),
        });
        Ok(events)
    }

    pub fn progress(&mut self, now: Instant, updated_at: DateTime<Utc>) -> SessionProgress {
        self.state.sync(now);
        SessionProgress {
            active_ms: self.state.active_ms,
            paused_ms: self.state.paused_ms,
            blink_count: self.total_blinks,
            score: self.latest_score.as_ref().map(SessionScore::from),
            updated_at,
        }
    }

    pub fn snapshot(&mut self, now: Instant) -> SessionSnapshot {
        self.state.sync(now);
        SessionSnapshot {
            state: self.state.clone(),
            guard: self.guard.state().clone(),
            alert_active: self.alert.is_active(),
            blink_count: self.total_blinks,
            blink_rate_per_minute: self.monitor.blinks().rate_per_minute(),
            ambient_lux: self.ambient_lux,
            latest_score: self.latest_score.clone(),
        }
    }

    /// Stop the session and build its final record. Any pending frame is discarded.
    pub fn finish(&mut self, now: Instant, stopped_at: DateTime<Utc>) -> Session {
        self.state.stop(now);
        self.pending = None;

        Session {
            id: self.state.session_id.clone(),
            started_at: self.state.started_at,
            stopped_at: Some(stopped_at),
            status: SessionStatus::Completed,
            active_ms: self.state.active_ms,
            paused_ms: self.state.paused_ms,
            blink_count: self.total_blinks,
            score: self.latest_score.as_ref().map(SessionScore::from),
            created_at: self.state.started_at,
            updated_at: stopped_at,
        }
    }

    fn guard_event(&self, transition: GuardTransition) -> MonitorEvent {
        MonitorEvent::Guard {
            session_id: self.state.session_id.clone(),
            transition,
        }
    }

    fn alert_event(&self, alert: AlertEvent) -> MonitorEvent {
        MonitorEvent::Alert {
            session_id: self.state.session_id.clone(),
            alert,
        }
    }
}
