use serde::{Deserialize, Serialize};

use crate::sensing::{FrameSample, Measurement};

use super::state::{GuardReason, GuardState, GuardStatus, GuardTransition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuardConfig {
    /// Freeze strictly above this coverage
    pub freeze_above_coverage: f32,

    /// Unfreeze at or below this coverage. Lower than the freeze threshold on purpose.
    pub unfreeze_at_or_below_coverage: f32,

    /// Consecutive absent/invalid faces before a frozen surface is released
    pub max_no_face_frames: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            freeze_above_coverage: 0.7,
            unfreeze_at_or_below_coverage: 0.4,
            max_no_face_frames: 3,
        }
    }
}

/// Clear/Frozen state machine with hysteresis on coverage and a debounce on face absence.
///
/// Every method returns the transition it made, if any. A transition always flips the status,
/// so callers can forward it straight to the protect-surface sink.
#[derive(Debug, Clone, Default)]
pub struct ScreenGuardStateMachine {
    config: GuardConfig,
    state: GuardState,
}

impl ScreenGuardStateMachine {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            state: GuardState::new(),
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn status(&self) -> GuardStatus {
        self.state.status
    }

    pub fn evaluate(&mut self, sample: &FrameSample) -> Option<GuardTransition> {
        match sample {
            FrameSample::Face(measurement) if measurement.face_landmarks_valid => {
                self.evaluate_face(measurement)
            }
            _ => self.evaluate_absence(),
        }
    }

    fn evaluate_face(&mut self, measurement: &Measurement) -> Option<GuardTransition> {
        self.state.consecutive_no_face_frames = 0;
        let coverage = measurement.face_coverage;

        if coverage > self.config.freeze_above_coverage {
            return self.transition(GuardStatus::Frozen, GuardReason::TooClose);
        }

        let reason = if coverage <= self.config.unfreeze_at_or_below_coverage {
            GuardReason::OptimalDistance
        } else {
            GuardReason::AcceptableDistance
        };

        if !self.state.baseline_set {
            self.state.baseline_set = true;
            if reason == GuardReason::AcceptableDistance {
                self.state.baseline_coverage = Some(coverage);
            }
        }

        self.transition(GuardStatus::Clear, reason)
    }

    fn evaluate_absence(&mut self) -> Option<GuardTransition> {
        self.state.consecutive_no_face_frames =
            self.state.consecutive_no_face_frames.saturating_add(1);

        if self.state.consecutive_no_face_frames >= self.config.max_no_face_frames {
            self.transition(GuardStatus::Clear, GuardReason::NoFace)
        } else {
            None
        }
    }

    /// Pausing unblurs immediately and forgets the absence streak.
    pub fn pause(&mut self) -> Option<GuardTransition> {
        self.state.consecutive_no_face_frames = 0;
        self.transition(GuardStatus::Clear, GuardReason::Paused)
    }

    /// Resuming re-learns the baseline; the status is left alone until the next evaluation.
    pub fn resume(&mut self) {
        self.state.baseline_set = false;
        self.state.baseline_coverage = None;
        self.state.consecutive_no_face_frames = 0;
    }

    fn transition(&mut self, target: GuardStatus, reason: GuardReason) -> Option<GuardTransition> {
        if self.state.status == target {
            return None;
        }
        self.state.status = target;
        Some(match target {
            GuardStatus::Frozen => GuardTransition::Freeze { reason },
            GuardStatus::Clear => GuardTransition::Unfreeze { reason },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(coverage: f32) -> FrameSample {
        FrameSample::Face(Measurement {
            face_coverage: coverage,
            ambient_lux: None,
            head_tilt_degrees: None,
            left_eye_open_probability: None,
            right_eye_open_probability: None,
            face_landmarks_valid: true,
        })
    }

    fn invalid_face(coverage: f32) -> FrameSample {
        match face(coverage) {
            FrameSample::Face(mut m) => {
                m.face_landmarks_valid = false;
                FrameSample::Face(m)
            }
            other => other,
        }
    }

    fn frozen_machine() -> ScreenGuardStateMachine {
        let mut machine = ScreenGuardStateMachine::default();
        assert!(machine.evaluate(&face(0.8)).is_some());
        assert_eq!(machine.status(), GuardStatus::Frozen);
        machine
    }

    #[test]
    fn hysteresis_sequence() {
        let mut machine = ScreenGuardStateMachine::default();
        let mut statuses = Vec::new();
        for coverage in [0.5, 0.75, 0.75, 0.5] {
            machine.evaluate(&face(coverage));
            statuses.push(machine.status());
        }
        assert_eq!(
            statuses,
            vec![
                GuardStatus::Clear,
                GuardStatus::Frozen,
                GuardStatus::Frozen,
                GuardStatus::Clear
            ]
        );
    }

    #[test]
    fn exactly_at_freeze_threshold_stays_clear() {
        let mut machine = ScreenGuardStateMachine::default();
        assert_eq!(machine.evaluate(&face(0.7)), None);
        assert_eq!(machine.status(), GuardStatus::Clear);
    }

    #[test]
    fn transitions_never_repeat() {
        let mut machine = ScreenGuardStateMachine::default();
        assert_eq!(
            machine.evaluate(&face(0.9)),
            Some(GuardTransition::Freeze { reason: GuardReason::TooClose })
        );
        assert_eq!(machine.evaluate(&face(0.95)), None);
        assert_eq!(
            machine.evaluate(&face(0.35)),
            Some(GuardTransition::Unfreeze { reason: GuardReason::OptimalDistance })
        );
        assert_eq!(machine.evaluate(&face(0.2)), None);
    }

    #[test]
    fn ambiguous_band_releases_a_frozen_surface() {
        let mut machine = frozen_machine();
        assert_eq!(
            machine.evaluate(&face(0.55)),
            Some(GuardTransition::Unfreeze { reason: GuardReason::AcceptableDistance })
        );
    }

    #[test]
    fn three_absent_frames_release_two_do_not() {
        let mut machine = frozen_machine();
        assert_eq!(machine.evaluate(&FrameSample::NoFace), None);
        assert_eq!(machine.evaluate(&invalid_face(0.9)), None);
        assert_eq!(machine.status(), GuardStatus::Frozen);
        assert_eq!(
            machine.evaluate(&FrameSample::NoFace),
            Some(GuardTransition::Unfreeze { reason: GuardReason::NoFace })
        );
        assert_eq!(machine.state().consecutive_no_face_frames, 3);
    }

    #[test]
    fn valid_face_resets_absence_streak() {
        let mut machine = frozen_machine();
        machine.evaluate(&FrameSample::NoFace);
        machine.evaluate(&FrameSample::NoFace);
        machine.evaluate(&face(0.9));
        assert_eq!(machine.state().consecutive_no_face_frames, 0);
        machine.evaluate(&FrameSample::NoFace);
        machine.evaluate(&FrameSample::NoFace);
        assert_eq!(machine.status(), GuardStatus::Frozen);
    }

    #[test]
    fn invalid_close_face_never_freezes() {
        let mut machine = ScreenGuardStateMachine::default();
        for _ in 0..5 {
            assert_eq!(machine.evaluate(&invalid_face(0.95)), None);
        }
        assert_eq!(machine.status(), GuardStatus::Clear);
    }

    #[test]
    fn baseline_is_recorded_once() {
        let mut machine = ScreenGuardStateMachine::default();
        machine.evaluate(&face(0.9));
        assert_eq!(machine.state().baseline_coverage, None);
        machine.evaluate(&face(0.5));
        machine.evaluate(&face(0.6));
        assert_eq!(machine.state().baseline_coverage, Some(0.5));
    }

    #[test]
    fn optimal_first_face_sets_baseline_without_a_value() {
        let mut machine = ScreenGuardStateMachine::default();
        machine.evaluate(&face(0.35));
        assert!(machine.state().baseline_set);
        assert_eq!(machine.state().baseline_coverage, None);

        machine.evaluate(&face(0.5));
        assert_eq!(machine.state().baseline_coverage, None);

        machine.resume();
        assert!(!machine.state().baseline_set);
        machine.evaluate(&face(0.5));
        assert_eq!(machine.state().baseline_coverage, Some(0.5));
    }

    #[test]
    fn pause_unfreezes_and_resume_forgets_baseline() {
        let mut machine = frozen_machine();
        machine.evaluate(&FrameSample::NoFace);
        assert_eq!(
            machine.pause(),
            Some(GuardTransition::Unfreeze { reason: GuardReason::Paused })
        );
        assert_eq!(machine.state().consecutive_no_face_frames, 0);
        assert_eq!(machine.pause(), None);

        machine.evaluate(&face(0.5));
        assert!(machine.state().baseline_coverage.is_some());
        machine.resume();
        assert!(!machine.state().baseline_set);
        assert_eq!(machine.state().baseline_coverage, None);
        assert_eq!(machine.status(), GuardStatus::Clear);
    }
}
