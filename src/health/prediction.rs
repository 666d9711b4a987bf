use std::collections::VecDeque;

use tokio::time::{Duration, Instant};

use crate::health::config::PredictionConfig;
use crate::health::types::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreSample {
    pub at: Instant,
    pub total_score: u8,
}

/// Trailing window of total scores, projected forward to a risk class.
#[derive(Debug, Clone)]
pub struct StrainRiskPredictor {
    config: PredictionConfig,
    history: VecDeque<ScoreSample>,
}

impl StrainRiskPredictor {
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.max_samples.min(1024)),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &ScoreSample> {
        self.history.iter()
    }

    /// Append a sample and drop everything older than the window. Each sample is pushed and
    /// popped at most once, so pruning is amortised O(1) per call.
    pub fn record(&mut self, at: Instant, total_score: u8) {
        self.history.push_back(ScoreSample { at, total_score });

        let window = Duration::from_secs(self.config.window_secs);
        while let Some(oldest) = self.history.front() {
            if at.saturating_duration_since(oldest.at) > window {
                self.history.pop_front();
            } else {
                break;
            }
        }

        while self.history.len() > self.config.max_samples.max(1) {
            self.history.pop_front();
        }
    }

    pub fn predict(&self, current_score: u8) -> RiskLevel {
        if self.history.len() < self.config.min_samples {
            return RiskLevel::Low;
        }

        let (Some(oldest), Some(newest)) = (self.history.front(), self.history.back()) else {
            return RiskLevel::Low;
        };

        let span = newest.at.saturating_duration_since(oldest.at);
        if span < Duration::from_secs(self.config.min_span_secs) {
            return RiskLevel::Low;
        }

        project_risk(*oldest, *newest, current_score, &self.config)
    }

    /// Record then predict, the order every evaluation uses.
    pub fn record_and_predict(&mut self, at: Instant, total_score: u8) -> RiskLevel {
        self.record(at, total_score);
        self.predict(total_score)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

/// Endpoint-to-endpoint slope, projected `horizon_minutes` ahead from the current score.
/// A single late spike can hide an otherwise falling trend; callers rely on this exact shape.
pub fn project_risk(
    oldest: ScoreSample,
    newest: ScoreSample,
    current_score: u8,
    config: &PredictionConfig,
) -> RiskLevel {
    let minutes = newest.at.saturating_duration_since(oldest.at).as_secs_f64() / 60.0;
    if minutes <= 0.0 {
        return RiskLevel::Low;
    }

    let slope = (newest.total_score as f64 - oldest.total_score as f64) / minutes;
    let projected = current_score as f64 + slope * config.horizon_minutes;

    if projected < config.high_risk_below {
        RiskLevel::High
    } else if projected < config.medium_risk_below {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(start: Instant, secs: u64) -> Instant {
        start + Duration::from_secs(secs)
    }

    #[test]
    fn falling_endpoints_project_high_risk() {
        let start = Instant::now();
        let oldest = ScoreSample { at: start, total_score: 90 };
        let newest = ScoreSample { at: at(start, 60), total_score: 60 };

        let risk = project_risk(oldest, newest, 60, &PredictionConfig::default());
        assert_eq!(risk, RiskLevel::High);
    }

    #[test]
    fn gentle_decline_is_medium() {
        let start = Instant::now();
        let oldest = ScoreSample { at: start, total_score: 80 };
        let newest = ScoreSample { at: at(start, 300), total_score: 75 };

        // slope -1/min, projected 75 - 30 = 45
        let risk = project_risk(oldest, newest, 75, &PredictionConfig::default());
        assert_eq!(risk, RiskLevel::Medium);
    }

    #[test]
    fn too_few_samples_is_low() {
        let start = Instant::now();
        let mut predictor = StrainRiskPredictor::new(PredictionConfig::default());
        for i in 0..9 {
            predictor.record(at(start, i * 20), 100 - (i as u8) * 10);
        }
        assert_eq!(predictor.predict(10), RiskLevel::Low);
    }

    #[test]
    fn short_span_is_low() {
        let start = Instant::now();
        let mut predictor = StrainRiskPredictor::new(PredictionConfig::default());
        for i in 0..20 {
            predictor.record(at(start, i * 3), 100 - (i as u8) * 4);
        }
        // 57 seconds between endpoints
        assert_eq!(predictor.predict(24), RiskLevel::Low);
    }

    #[test]
    fn ten_falling_samples_over_a_minute_are_high() {
        let start = Instant::now();
        let mut predictor = StrainRiskPredictor::new(PredictionConfig::default());
        let mut last = RiskLevel::Low;
        for i in 0..=10u64 {
            let score = 90 - (i as u8) * 3;
            last = predictor.record_and_predict(at(start, i * 6), score);
        }
        assert_eq!(predictor.len(), 11);
        assert_eq!(last, RiskLevel::High);
    }

    #[test]
    fn late_spike_masks_falling_trend() {
        let start = Instant::now();
        let mut predictor = StrainRiskPredictor::new(PredictionConfig::default());
        predictor.record(start, 60);
        for i in 1..10u64 {
            predictor.record(at(start, i * 10), 40);
        }
        predictor.record(at(start, 120), 80);

        assert_eq!(predictor.predict(80), RiskLevel::Low);
    }

    #[test]
    fn history_never_outlives_window() {
        let start = Instant::now();
        let config = PredictionConfig::default();
        let window = config.window_secs;
        let mut predictor = StrainRiskPredictor::new(config);

        for i in 0..(window * 2) {
            let now = at(start, i);
            predictor.record(now, 80);
            let oldest = predictor.samples().next().map(|s| s.at).unwrap_or(now);
            assert!(now.duration_since(oldest) <= Duration::from_secs(window));
            assert!(predictor.len() as u64 <= window + 1);
        }
    }

    #[test]
    fn sample_cap_bounds_bursty_input() {
        let start = Instant::now();
        let config = PredictionConfig {
            max_samples: 16,
            ..PredictionConfig::default()
        };
        let mut predictor = StrainRiskPredictor::new(config);
        for _ in 0..100 {
            predictor.record(start, 50);
        }
        assert_eq!(predictor.len(), 16);
    }
}
