use std::time::Duration;

use proptest::prelude::*;
use tokio::time::Instant;

use eyeguard_lib::guard::{GuardConfig, GuardStatus, ScreenGuardStateMachine};
use eyeguard_lib::health::prediction::{project_risk, ScoreSample};
use eyeguard_lib::health::{
    EyeHealthScorer, PredictionConfig, RiskLevel, ScoringConfig, ScoringInputs,
    StrainRiskPredictor,
};
use eyeguard_lib::sensing::{FrameSample, Measurement};

fn inputs() -> impl Strategy<Value = ScoringInputs> {
    (
        -1.0_f32..2.0,
        proptest::option::of(0.0_f32..5_000.0),
        proptest::option::of(-90.0_f32..90.0),
        0.0_f32..60.0,
        0_u64..20_000,
    )
        .prop_map(|(coverage, lux, tilt, rate, secs)| ScoringInputs {
            face_coverage: coverage,
            ambient_lux: lux,
            head_tilt_degrees: tilt,
            blink_rate_per_minute: rate,
            session_elapsed: Duration::from_secs(secs),
        })
}

fn risk_level() -> impl Strategy<Value = RiskLevel> {
    prop_oneof![
        Just(RiskLevel::Low),
        Just(RiskLevel::Medium),
        Just(RiskLevel::High)
    ]
}

fn valid_face(coverage: f32) -> FrameSample {
    FrameSample::Face(Measurement {
        face_coverage: coverage,
        ambient_lux: None,
        head_tilt_degrees: None,
        left_eye_open_probability: None,
        right_eye_open_probability: None,
        face_landmarks_valid: true,
    })
}

fn classify(score: f64, config: &PredictionConfig) -> RiskLevel {
    if score < config.high_risk_below {
        RiskLevel::High
    } else if score < config.medium_risk_below {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

proptest! {
    #[test]
    fn pt_components_sum_to_total(input in inputs(), risk in risk_level()) {
        let scorer = EyeHealthScorer::new(ScoringConfig::default());
        let score = scorer.score(&input, risk);
        let c = score.components;

        prop_assert_eq!(
            c.distance as u32 + c.duration as u32 + c.blink as u32 + c.lighting as u32 + c.posture as u32,
            score.total_score as u32
        );
        prop_assert!(score.total_score <= 100);
        prop_assert!(c.distance <= 30 && c.duration <= 20 && c.blink <= 20);
        prop_assert!(c.lighting <= 15 && c.posture <= 15);
    }

    #[test]
    fn pt_scoring_is_idempotent(input in inputs(), risk in risk_level()) {
        let scorer = EyeHealthScorer::new(ScoringConfig::default());
        prop_assert_eq!(scorer.score(&input, risk), scorer.score(&input, risk));
    }

    #[test]
    fn pt_urgent_advice_only_for_high_risk(input in inputs(), risk in risk_level()) {
        let scorer = EyeHealthScorer::new(ScoringConfig::default());
        let score = scorer.score(&input, risk);
        let urgent = score
            .recommendations
            .iter()
            .any(|r| r == eyeguard_lib::health::scoring::STOP_NOW);
        prop_assert_eq!(urgent, risk == RiskLevel::High);
    }

    #[test]
    fn pt_history_never_outgrows_window(
        gaps in proptest::collection::vec(0_u64..120_000, 1..400),
        scores in proptest::collection::vec(0_u8..=100, 400),
    ) {
        let config = PredictionConfig::default();
        let window = Duration::from_secs(config.window_secs);
        let mut predictor = StrainRiskPredictor::new(config.clone());
        let mut now = Instant::now();

        for (gap, score) in gaps.iter().zip(scores.iter()) {
            now += Duration::from_millis(*gap);
            predictor.record(now, *score);

            prop_assert!(predictor.len() <= config.max_samples);
            for sample in predictor.samples() {
                prop_assert!(now.saturating_duration_since(sample.at) <= window);
            }
        }
    }

    #[test]
    fn pt_rising_trend_never_worsens_risk(start in 0_u8..=100, rise in 0_u8..=100) {
        let config = PredictionConfig::default();
        let t0 = Instant::now();
        let end = start.saturating_add(rise).min(100);
        let oldest = ScoreSample { at: t0, total_score: start };
        let newest = ScoreSample { at: t0 + Duration::from_secs(60), total_score: end };

        let risk = project_risk(oldest, newest, end, &config);
        prop_assert!(risk <= classify(end as f64, &config));
    }

    #[test]
    fn pt_guard_status_follows_transitions(coverages in proptest::collection::vec(0.0_f32..1.0, 1..100)) {
        let mut guard = ScreenGuardStateMachine::new(GuardConfig::default());
        for coverage in coverages {
            let before = guard.status();
            match guard.evaluate(&valid_face(coverage)) {
                Some(transition) => {
                    prop_assert_ne!(transition.target(), before);
                    prop_assert_eq!(guard.status(), transition.target());
                }
                None => prop_assert_eq!(guard.status(), before),
            }
            if coverage > 0.7 {
                prop_assert_eq!(guard.status(), GuardStatus::Frozen);
            }
        }
    }
}
