use tokio::time::{Duration, Instant};

use crate::health::config::BlinkConfig;

/// Counts blinks for the current session and estimates a per-minute rate.
///
/// A blink is an open -> closed edge between two consecutive frames that both carry
/// eye-openness probabilities. Frames without probabilities leave the edge memory alone.
#[derive(Debug, Clone)]
pub struct BlinkTracker {
    config: BlinkConfig,
    session_start: Instant,
    blink_count: u32,
    rate_per_minute: f32,
    last_blink_at: Option<Instant>,
    eyes_were_open: bool,
}

impl BlinkTracker {
    pub fn new(config: BlinkConfig, session_start: Instant) -> Self {
        Self {
            rate_per_minute: config.default_rate_per_minute,
            config,
            session_start,
            blink_count: 0,
            last_blink_at: None,
            eyes_were_open: true,
        }
    }

    pub fn blink_count(&self) -> u32 {
        self.blink_count
    }

    pub fn rate_per_minute(&self) -> f32 {
        self.rate_per_minute
    }

    pub fn last_blink_at(&self) -> Option<Instant> {
        self.last_blink_at
    }

    pub fn session_start(&self) -> Instant {
        self.session_start
    }

    /// Feed one frame's eye probabilities. Returns `true` when this frame completes a blink.
    pub fn observe_eyes(
        &mut self,
        left_open: Option<f32>,
        right_open: Option<f32>,
        now: Instant,
    ) -> bool {
        let (Some(left), Some(right)) = (left_open, right_open) else {
            return false;
        };

        let threshold = self.config.eye_open_threshold;
        let eyes_open = left > threshold || right > threshold;
        let blinked = self.eyes_were_open && !eyes_open;
        self.eyes_were_open = eyes_open;

        if blinked {
            self.register_blink(now);
        }
        blinked
    }

    pub fn register_blink(&mut self, now: Instant) {
        self.blink_count = self.blink_count.saturating_add(1);
        self.last_blink_at = Some(now);

        let elapsed = now.saturating_duration_since(self.session_start);
        if elapsed > Duration::from_secs(self.config.rate_warmup_secs) {
            let minutes = elapsed.as_secs_f32() / 60.0;
            self.rate_per_minute = self.blink_count as f32 / minutes;
        }
    }

    /// Fresh session clock, zero count, default rate.
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(self.config.clone(), now);
    }
}
