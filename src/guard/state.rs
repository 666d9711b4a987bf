use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GuardStatus {
    Clear,
    Frozen,
}

impl Default for GuardStatus {
    fn default() -> Self {
        GuardStatus::Clear
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuardState {
    pub status: GuardStatus,
    pub consecutive_no_face_frames: u32,
    /// Set by the first comfortable face. Only an acceptable-band face stores a coverage value.
    pub baseline_set: bool,
    pub baseline_coverage: Option<f32>,
}

impl GuardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_frozen(&self) -> bool {
        self.status == GuardStatus::Frozen
    }
}

/// Why the surface was shown or hidden. Rendered verbatim by the protect-surface sink.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GuardReason {
    TooClose,
    OptimalDistance,
    AcceptableDistance,
    NoFace,
    Paused,
}

impl GuardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardReason::TooClose => "Too close to screen",
            GuardReason::OptimalDistance => "Optimal distance",
            GuardReason::AcceptableDistance => "Acceptable distance",
            GuardReason::NoFace => "No face detected",
            GuardReason::Paused => "Protection paused",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GuardTransition {
    Freeze { reason: GuardReason },
    Unfreeze { reason: GuardReason },
}

impl GuardTransition {
    pub fn reason(&self) -> GuardReason {
        match self {
            GuardTransition::Freeze { reason } | GuardTransition::Unfreeze { reason } => *reason,
        }
    }

    pub fn target(&self) -> GuardStatus {
        match self {
            GuardTransition::Freeze { .. } => GuardStatus::Frozen,
            GuardTransition::Unfreeze { .. } => GuardStatus::Clear,
        }
    }
}
