//! Persisted session history.
//!
//! One row per monitoring session. The row is created as `Running` when the session starts,
//! refreshed by the heartbeat, and finalised exactly once when the session stops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::health::{ComponentScores, EyeHealthScore, RiskLevel};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Running,
    Paused,
    Completed,
    Interrupted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "Running",
            SessionStatus::Paused => "Paused",
            SessionStatus::Completed => "Completed",
            SessionStatus::Interrupted => "Interrupted",
        }
    }
}

/// The score columns stored with a session. Recommendations are advisory and not kept.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionScore {
    pub total_score: u8,
    #[serde(flatten)]
    pub components: ComponentScores,
    pub predicted_risk: RiskLevel,
}

impl From<&EyeHealthScore> for SessionScore {
    fn from(score: &EyeHealthScore) -> Self {
        Self {
            total_score: score.total_score,
            components: score.components,
            predicted_risk: score.predicted_risk,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub active_ms: u64,
    pub paused_ms: u64,
    pub blink_count: u32,
    pub score: Option<SessionScore>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn started(id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            stopped_at: None,
            status: SessionStatus::Running,
            active_ms: 0,
            paused_ms: 0,
            blink_count: 0,
            score: None,
            created_at: started_at,
            updated_at: started_at,
        }
    }
}

/// End-of-session record handed to persistence and to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub active_ms: u64,
    pub final_score: Option<SessionScore>,
}

impl From<Session> for SessionInfo {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            started_at: session.started_at,
            stopped_at: session.stopped_at,
            status: session.status,
            active_ms: session.active_ms,
            final_score: session.score,
        }
    }
}

/// Progress written by the heartbeat while a session runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionProgress {
    pub active_ms: u64,
    pub paused_ms: u64,
    pub blink_count: u32,
    pub score: Option<SessionScore>,
    pub updated_at: DateTime<Utc>,
}
