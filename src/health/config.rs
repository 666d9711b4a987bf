use serde::{Deserialize, Serialize};

/// Thresholds for the five scoring components. Downstream thresholds are calibrated against
/// the coverage estimate in `sensing::coverage`, so change these together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Coverage above this is "too close" and scores zero distance points
    pub too_close_coverage: f32,

    /// Inclusive optimal coverage band
    pub optimal_coverage_min: f32,
    pub optimal_coverage_max: f32,

    /// Session length that still earns full duration points
    pub max_session_secs: u64,

    /// Blink rate (per minute) that earns full blink points
    pub min_healthy_blink_rate: f32,

    /// Below this the room is hazardously dark
    pub dark_lux: f32,
    pub optimal_lux_min: f32,
    pub optimal_lux_max: f32,

    /// Absolute head tilt (degrees) tolerated before posture points are lost
    pub max_tilt_degrees: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            too_close_coverage: 0.7,
            optimal_coverage_min: 0.3,
            optimal_coverage_max: 0.6,
            max_session_secs: 20 * 60,
            min_healthy_blink_rate: 10.0,
            dark_lux: 50.0,
            optimal_lux_min: 300.0,
            optimal_lux_max: 1000.0,
            max_tilt_degrees: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlinkConfig {
    /// Either eye above this open-probability counts as "eyes open"
    pub eye_open_threshold: f32,

    /// Rate assumed until the session is old enough to measure one
    pub default_rate_per_minute: f32,

    /// Session age before the measured rate replaces the default
    pub rate_warmup_secs: u64,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            eye_open_threshold: 0.4,
            default_rate_per_minute: 15.0,
            rate_warmup_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PredictionConfig {
    /// Trailing history window
    pub window_secs: u64,

    /// Minimum samples and span before a trend is trusted
    pub min_samples: usize,
    pub min_span_secs: u64,

    /// How far ahead the trend is projected, in minutes
    pub horizon_minutes: f64,

    /// Projected score below `high_risk_below` is High, below `medium_risk_below` is Medium
    pub high_risk_below: f64,
    pub medium_risk_below: f64,

    /// Hard cap on retained samples. Derived from the window and the evaluation cadence so the
    /// buffer can never outgrow what the window admits at 1 Hz.
    pub max_samples: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            window_secs: 10 * 60,
            min_samples: 10,
            min_span_secs: 60,
            horizon_minutes: 30.0,
            high_risk_below: 40.0,
            medium_risk_below: 70.0,
            max_samples: 10 * 60 + 1,
        }
    }
}
