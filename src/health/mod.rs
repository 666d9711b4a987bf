pub mod blink;
pub mod config;
pub mod prediction;
pub mod scoring;
pub mod types;

pub use blink::BlinkTracker;
pub use config::{BlinkConfig, PredictionConfig, ScoringConfig};
pub use prediction::StrainRiskPredictor;
pub use scoring::{EyeHealthScorer, ScoringInputs};
pub use types::{ComponentScores, EyeHealthScore, RiskLevel};

use tokio::time::Instant;

use crate::sensing::Measurement;

/// Per-session scoring pipeline: blink bookkeeping, the pure scorer and the trend predictor.
#[derive(Debug, Clone)]
pub struct EyeHealthMonitor {
    scorer: EyeHealthScorer,
    blinks: BlinkTracker,
    predictor: StrainRiskPredictor,
}

impl EyeHealthMonitor {
    pub fn new(
        scoring: ScoringConfig,
        blink: BlinkConfig,
        prediction: PredictionConfig,
        session_start: Instant,
    ) -> Self {
        Self {
            scorer: EyeHealthScorer::new(scoring),
            blinks: BlinkTracker::new(blink, session_start),
            predictor: StrainRiskPredictor::new(prediction),
        }
    }

    pub fn blinks(&self) -> &BlinkTracker {
        &self.blinks
    }

    pub fn predictor(&self) -> &StrainRiskPredictor {
        &self.predictor
    }

    /// Returns `true` when the frame completed a blink.
    pub fn observe_eyes(&mut self, measurement: &Measurement, now: Instant) -> bool {
        self.blinks.observe_eyes(
            measurement.left_eye_open_probability,
            measurement.right_eye_open_probability,
            now,
        )
    }

    pub fn evaluate(&mut self, measurement: &Measurement, now: Instant) -> EyeHealthScore {
        let inputs = ScoringInputs {
            face_coverage: measurement.face_coverage,
            ambient_lux: measurement.ambient_lux,
            head_tilt_degrees: measurement.head_tilt_degrees,
            blink_rate_per_minute: self.blinks.rate_per_minute(),
            session_elapsed: now.saturating_duration_since(self.blinks.session_start()),
        };

        let components = self.scorer.components(&inputs);
        let risk = self.predictor.record_and_predict(now, components.total());
        self.scorer.finish(components, risk)
    }

    /// Restart the session clock; blink count, rate and trend history start over.
    pub fn reset_session(&mut self, now: Instant) {
        self.blinks.reset(now);
        self.predictor.clear();
    }
}
