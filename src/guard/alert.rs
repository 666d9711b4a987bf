use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlertConfig {
    /// Continuous time without a blink before the alert fires
    pub no_blink_timeout_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            no_blink_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AlertEvent {
    AlertRaised,
    AlertCleared,
}

/// One-shot "you have not blinked" alert.
///
/// The alert is raised once per violation and stays raised until a blink arrives; repeated
/// checks while it is raised do nothing.
#[derive(Debug, Clone)]
pub struct BlinkAlertTimer {
    timeout: Duration,
    window_start: Instant,
    alert_active: bool,
}

impl BlinkAlertTimer {
    pub fn new(config: &AlertConfig, now: Instant) -> Self {
        Self {
            timeout: Duration::from_millis(config.no_blink_timeout_ms),
            window_start: now,
            alert_active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.alert_active
    }

    pub fn since_last_blink(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.window_start)
    }

    /// Periodic check. `eligible` is false while paused or while the guard is frozen.
    pub fn check(&mut self, now: Instant, eligible: bool) -> Option<AlertEvent> {
        if !eligible || self.alert_active {
            return None;
        }

        if self.since_last_blink(now) >= self.timeout {
            self.alert_active = true;
            Some(AlertEvent::AlertRaised)
        } else {
            None
        }
    }

    pub fn on_blink(&mut self, now: Instant) -> Option<AlertEvent> {
        self.restart(now)
    }

    /// Freeze, pause and resume all restart the no-blink window and drop a raised alert.
    pub fn restart(&mut self, now: Instant) -> Option<AlertEvent> {
        self.window_start = now;
        self.clear()
    }

    fn clear(&mut self) -> Option<AlertEvent> {
        if self.alert_active {
            self.alert_active = false;
            Some(AlertEvent::AlertCleared)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(now: Instant) -> BlinkAlertTimer {
        BlinkAlertTimer::new(&AlertConfig::default(), now)
    }

    #[test]
    fn fires_once_after_timeout() {
        let start = Instant::now();
        let mut alert = timer(start);
        let mut raised = 0;

        for tick in 1..=30u64 {
            if alert.check(start + Duration::from_secs(tick), true) == Some(AlertEvent::AlertRaised)
            {
                raised += 1;
                assert_eq!(tick, 10);
            }
        }

        assert_eq!(raised, 1);
        assert!(alert.is_active());
    }

    #[test]
    fn fires_inside_the_tenth_second() {
        let start = Instant::now();
        let mut alert = timer(start);
        assert_eq!(alert.check(start + Duration::from_millis(9_999), true), None);
        assert_eq!(
            alert.check(start + Duration::from_millis(10_500), true),
            Some(AlertEvent::AlertRaised)
        );
    }

    #[test]
    fn blink_clears_an_active_alert_once() {
        let start = Instant::now();
        let mut alert = timer(start);
        alert.check(start + Duration::from_secs(11), true);

        let blink_at = start + Duration::from_secs(12);
        assert_eq!(alert.on_blink(blink_at), Some(AlertEvent::AlertCleared));
        assert_eq!(alert.on_blink(blink_at), None);
        assert_eq!(alert.check(start + Duration::from_secs(21), true), None);
        assert_eq!(
            alert.check(start + Duration::from_secs(22), true),
            Some(AlertEvent::AlertRaised)
        );
    }

    #[test]
    fn ineligible_checks_never_fire() {
        let start = Instant::now();
        let mut alert = timer(start);
        assert_eq!(alert.check(start + Duration::from_secs(60), false), None);
        assert!(!alert.is_active());
        assert_eq!(
            alert.check(start + Duration::from_secs(61), true),
            Some(AlertEvent::AlertRaised)
        );
    }
}
