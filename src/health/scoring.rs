use std::time::Duration;

use crate::health::config::ScoringConfig;
use crate::health::types::{
    ComponentScores, EyeHealthScore, RiskLevel, BLINK_MAX, DISTANCE_MAX, DURATION_MAX,
    LIGHTING_MAX, POSTURE_MAX,
};

pub const MOVE_BACK: &str = "Move further back from the screen";
pub const TAKE_BREAK: &str = "Take a break (20-20-20 rule)";
pub const BLINK_MORE: &str = "Blink more often";
pub const ADJUST_LIGHTING: &str = "Adjust room lighting";
pub const STRAIGHTEN_HEAD: &str = "Straighten your head";
pub const STOP_NOW: &str = "Stop using the screen now and rest your eyes";

/// Everything one scoring call looks at. Built fresh per evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringInputs {
    pub face_coverage: f32,
    pub ambient_lux: Option<f32>,
    pub head_tilt_degrees: Option<f32>,
    pub blink_rate_per_minute: f32,
    pub session_elapsed: Duration,
}

/// Pure scoring function. History and blink bookkeeping live elsewhere; identical inputs
/// always produce identical scores.
#[derive(Debug, Clone, Default)]
pub struct EyeHealthScorer {
    config: ScoringConfig,
}

impl EyeHealthScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn components(&self, inputs: &ScoringInputs) -> ComponentScores {
        let config = &self.config;
        ComponentScores {
            distance: score_distance(inputs.face_coverage, config),
            duration: score_duration(inputs.session_elapsed, config),
            blink: score_blink(inputs.blink_rate_per_minute, config),
            lighting: score_lighting(inputs.ambient_lux, config),
            posture: score_posture(inputs.head_tilt_degrees, config),
        }
    }

    /// Attach advice to already-computed components once the trend risk is known.
    pub fn finish(&self, components: ComponentScores, risk: RiskLevel) -> EyeHealthScore {
        EyeHealthScore::new(components, recommendations(&components, risk), risk)
    }

    /// Convenience for callers that have no history (risk fixed by the caller).
    pub fn score(&self, inputs: &ScoringInputs, risk: RiskLevel) -> EyeHealthScore {
        self.finish(self.components(inputs), risk)
    }
}

/// Three bands in literal conditional order: too close, optimal, everything else.
fn score_distance(coverage: f32, config: &ScoringConfig) -> u8 {
    if coverage > config.too_close_coverage {
        0
    } else if (config.optimal_coverage_min..=config.optimal_coverage_max).contains(&coverage) {
        DISTANCE_MAX
    } else {
        DISTANCE_MAX / 2
    }
}

/// Full points up to the limit, then one point per full minute of overrun.
fn score_duration(elapsed: Duration, config: &ScoringConfig) -> u8 {
    let limit = Duration::from_secs(config.max_session_secs);
    let overrun_minutes = elapsed.saturating_sub(limit).as_secs() / 60;
    (DURATION_MAX as u64).saturating_sub(overrun_minutes) as u8
}

fn score_blink(rate_per_minute: f32, config: &ScoringConfig) -> u8 {
    if rate_per_minute >= config.min_healthy_blink_rate {
        return BLINK_MAX;
    }
    let proportional = (rate_per_minute / config.min_healthy_blink_rate) * BLINK_MAX as f32;
    proportional.round().clamp(0.0, BLINK_MAX as f32) as u8
}

/// No sensor gets the benefit of the doubt.
fn score_lighting(lux: Option<f32>, config: &ScoringConfig) -> u8 {
    match lux {
        None => LIGHTING_MAX,
        Some(lux) if lux < config.dark_lux => 0,
        Some(lux) if (config.optimal_lux_min..=config.optimal_lux_max).contains(&lux) => {
            LIGHTING_MAX
        }
        Some(_) => 5,
    }
}

fn score_posture(tilt: Option<f32>, config: &ScoringConfig) -> u8 {
    match tilt {
        Some(degrees) if degrees.abs() >= config.max_tilt_degrees => 0,
        _ => POSTURE_MAX,
    }
}

/// Advice in fixed component order, then the urgent one when the trend is bad.
pub fn recommendations(components: &ComponentScores, risk: RiskLevel) -> Vec<String> {
    let checks = [
        (components.distance < 15, MOVE_BACK),
        (components.duration < 10, TAKE_BREAK),
        (components.blink < 10, BLINK_MORE),
        (components.lighting < 10, ADJUST_LIGHTING),
        (components.posture < 10, STRAIGHTEN_HEAD),
        (risk == RiskLevel::High, STOP_NOW),
    ];

    checks
        .iter()
        .filter(|(triggered, _)| *triggered)
        .map(|(_, text)| text.to_string())
        .collect()
}
