use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MonitorStatus {
    Running,
    Paused,
    Stopped,
}

/// Wall-clock identity of a session plus the active/paused accounting.
///
/// Time accumulates in a baseline and an anchor per status, so the running totals can be read
/// at any instant without a ticking counter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: String,
    pub status: MonitorStatus,
    pub started_at: DateTime<Utc>,
    pub active_ms: u64,
    pub paused_ms: u64,
    #[serde(skip)]
    active_ms_baseline: u64,
    #[serde(skip)]
    running_anchor: Option<Instant>,
    #[serde(skip)]
    paused_ms_baseline: u64,
    #[serde(skip)]
    pause_anchor: Option<Instant>,
}

impl SessionState {
    pub fn begin(session_id: String, started_at: DateTime<Utc>, now: Instant) -> Self {
        Self {
            session_id,
            status: MonitorStatus::Running,
            started_at,
            active_ms: 0,
            paused_ms: 0,
            active_ms_baseline: 0,
            running_anchor: Some(now),
            paused_ms_baseline: 0,
            pause_anchor: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == MonitorStatus::Running
    }

    pub fn current_active_ms(&self, now: Instant) -> u64 {
        match (self.status, self.running_anchor) {
            (MonitorStatus::Running, Some(anchor)) => self
                .active_ms_baseline
                .saturating_add(elapsed_ms(anchor, now)),
            _ => self.active_ms_baseline,
        }
    }

    pub fn current_paused_ms(&self, now: Instant) -> u64 {
        match (self.status, self.pause_anchor) {
            (MonitorStatus::Paused, Some(anchor)) => self
                .paused_ms_baseline
                .saturating_add(elapsed_ms(anchor, now)),
            _ => self.paused_ms_baseline,
        }
    }

    pub fn sync(&mut self, now: Instant) {
        self.active_ms = self.current_active_ms(now);
        self.paused_ms = self.current_paused_ms(now);
    }

    /// Returns `false` when the session was not running.
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.status != MonitorStatus::Running {
            return false;
        }
        self.sync(now);
        self.active_ms_baseline = self.active_ms;
        self.running_anchor = None;
        self.pause_anchor = Some(now);
        self.status = MonitorStatus::Paused;
        true
    }

    /// Returns `false` when the session was not paused.
    pub fn resume(&mut self, now: Instant) -> bool {
        if self.status != MonitorStatus::Paused {
            return false;
        }
        self.sync(now);
        self.paused_ms_baseline = self.paused_ms;
        self.pause_anchor = None;
        self.running_anchor = Some(now);
        self.status = MonitorStatus::Running;
        true
    }

    pub fn stop(&mut self, now: Instant) {
        self.sync(now);
        self.active_ms_baseline = self.active_ms;
        self.paused_ms_baseline = self.paused_ms;
        self.running_anchor = None;
        self.pause_anchor = None;
        self.status = MonitorStatus::Stopped;
    }
}

fn elapsed_ms(anchor: Instant, now: Instant) -> u64 {
    now.saturating_duration_since(anchor).as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration;

    #[test]
    fn active_and_paused_time_accumulate_separately() {
        let t0 = Instant::now();
        let mut state = SessionState::begin("s".into(), Utc::now(), t0);

        assert_eq!(state.current_active_ms(t0 + Duration::from_secs(5)), 5_000);

        assert!(state.pause(t0 + Duration::from_secs(5)));
        assert!(!state.pause(t0 + Duration::from_secs(6)));
        assert_eq!(state.current_active_ms(t0 + Duration::from_secs(20)), 5_000);
        assert_eq!(state.current_paused_ms(t0 + Duration::from_secs(20)), 15_000);

        assert!(state.resume(t0 + Duration::from_secs(20)));
        state.stop(t0 + Duration::from_secs(30));

        assert_eq!(state.status, MonitorStatus::Stopped);
        assert_eq!(state.active_ms, 15_000);
        assert_eq!(state.paused_ms, 15_000);
        assert_eq!(state.current_active_ms(t0 + Duration::from_secs(99)), 15_000);
    }

    #[test]
    fn resume_requires_pause() {
        let t0 = Instant::now();
        let mut state = SessionState::begin("s".into(), Utc::now(), t0);
        assert!(!state.resume(t0));
        assert!(state.is_running());
    }
}
