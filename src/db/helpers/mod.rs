use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::{SessionScore, SessionStatus};
use crate::health::{ComponentScores, RiskLevel};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn to_u8(value: i64, field: &str) -> Result<u8> {
    u8::try_from(value).map_err(|_| anyhow!("{field} out of score range: {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_status(value: &str) -> Result<SessionStatus> {
    match value {
        "Running" => Ok(SessionStatus::Running),
        "Paused" => Ok(SessionStatus::Paused),
        "Completed" => Ok(SessionStatus::Completed),
        "Interrupted" => Ok(SessionStatus::Interrupted),
        other => Err(anyhow!("unknown session status {other}")),
    }
}

/// Raw nullable score columns in table order: total, distance, duration, blink, lighting,
/// posture, risk.
pub type ScoreColumns = (
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<String>,
);

pub fn score_to_columns(score: Option<&SessionScore>) -> ScoreColumns {
    match score {
        Some(score) => (
            Some(score.total_score as i64),
            Some(score.components.distance as i64),
            Some(score.components.duration as i64),
            Some(score.components.blink as i64),
            Some(score.components.lighting as i64),
            Some(score.components.posture as i64),
            Some(score.predicted_risk.as_str().to_string()),
        ),
        None => (None, None, None, None, None, None, None),
    }
}

/// A score is stored all-or-nothing; a partially filled row is treated as corrupt.
pub fn score_from_columns(columns: ScoreColumns) -> Result<Option<SessionScore>> {
    match columns {
        (None, None, None, None, None, None, None) => Ok(None),
        (
            Some(total),
            Some(distance),
            Some(duration),
            Some(blink),
            Some(lighting),
            Some(posture),
            Some(risk),
        ) => Ok(Some(SessionScore {
            total_score: to_u8(total, "final_total_score")?,
            components: ComponentScores {
                distance: to_u8(distance, "distance_score")?,
                duration: to_u8(duration, "duration_score")?,
                blink: to_u8(blink, "blink_score")?,
                lighting: to_u8(lighting, "lighting_score")?,
                posture: to_u8(posture, "posture_score")?,
            },
            predicted_risk: RiskLevel::parse(&risk)
                .ok_or_else(|| anyhow!("unknown predicted_risk {risk}"))?,
        })),
        _ => Err(anyhow!("session row has a partially stored score")),
    }
}
