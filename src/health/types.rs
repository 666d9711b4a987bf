use serde::{Deserialize, Serialize};

pub const DISTANCE_MAX: u8 = 30;
pub const DURATION_MAX: u8 = 20;
pub const BLINK_MAX: u8 = 20;
pub const LIGHTING_MAX: u8 = 15;
pub const POSTURE_MAX: u8 = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Low" => Some(RiskLevel::Low),
            "Medium" => Some(RiskLevel::Medium),
            "High" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

/// The five component scores, each already clamped to its own maximum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentScores {
    pub distance: u8,
    pub duration: u8,
    pub blink: u8,
    pub lighting: u8,
    pub posture: u8,
}

impl ComponentScores {
    pub fn total(&self) -> u8 {
        self.distance + self.duration + self.blink + self.lighting + self.posture
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EyeHealthScore {
    pub total_score: u8,
    #[serde(flatten)]
    pub components: ComponentScores,
    pub recommendations: Vec<String>,
    pub predicted_risk: RiskLevel,
}

impl EyeHealthScore {
    pub fn new(components: ComponentScores, recommendations: Vec<String>, risk: RiskLevel) -> Self {
        Self {
            total_score: components.total(),
            components,
            recommendations,
            predicted_risk: risk,
        }
    }
}
