use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    helpers::{
        parse_datetime, parse_optional_datetime, parse_status, score_from_columns,
        score_to_columns, to_i64, to_u64,
    },
    models::{Session, SessionProgress, SessionStatus},
    Database, OPEN_SESSION,
};

const SESSION_COLUMNS: &str = "id, started_at, stopped_at, status, active_ms, paused_ms, blink_count,
     final_total_score, distance_score, duration_score, blink_score, lighting_score, posture_score,
     predicted_risk, created_at, updated_at";

fn row_to_session(row: &Row) -> Result<Session> {
    let started_at: String = row.get("started_at")?;
    let stopped_at: Option<String> = row.get("stopped_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let status: String = row.get("status")?;
    let active_ms: i64 = row.get("active_ms")?;
    let paused_ms: i64 = row.get("paused_ms")?;
    let blink_count: i64 = row.get("blink_count")?;

    let score = score_from_columns((
        row.get("final_total_score")?,
        row.get("distance_score")?,
        row.get("duration_score")?,
        row.get("blink_score")?,
        row.get("lighting_score")?,
        row.get("posture_score")?,
        row.get("predicted_risk")?,
    ))?;

    Ok(Session {
        id: row.get("id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        stopped_at: parse_optional_datetime(stopped_at, "stopped_at")?,
        status: parse_status(&status)?,
        active_ms: to_u64(active_ms, "active_ms")?,
        paused_ms: to_u64(paused_ms, "paused_ms")?,
        blink_count: u32::try_from(blink_count).context("blink_count out of range")?,
        score,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn collect_sessions(
    stmt: &mut rusqlite::Statement<'_>,
    query_params: impl rusqlite::Params,
) -> Result<Vec<Session>> {
    let mut rows = stmt.query(query_params)?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_session(row)?);
    }
    Ok(sessions)
}

impl Database {
    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.with_conn(move |conn| {
            let score = score_to_columns(record.score.as_ref());
            conn.execute(
                "INSERT INTO sessions (id, started_at, stopped_at, status, active_ms, paused_ms, blink_count,
                     final_total_score, distance_score, duration_score, blink_score, lighting_score,
                     posture_score, predicted_risk, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    record.id,
                    record.started_at.to_rfc3339(),
                    record.stopped_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    to_i64(record.active_ms)?,
                    to_i64(record.paused_ms)?,
                    record.blink_count,
                    score.0,
                    score.1,
                    score.2,
                    score.3,
                    score.4,
                    score.5,
                    score.6,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert session")?;
            Ok(())
        })
        .await
    }

    /// Heartbeat write. Returns false once the row has been finalized.
    pub async fn update_session_progress(
        &self,
        session_id: &str,
        progress: SessionProgress,
    ) -> Result<bool> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let score = score_to_columns(progress.score.as_ref());
            let sql = format!(
                "UPDATE sessions
                 SET active_ms = ?1,
                     paused_ms = ?2,
                     blink_count = ?3,
                     final_total_score = ?4,
                     distance_score = ?5,
                     duration_score = ?6,
                     blink_score = ?7,
                     lighting_score = ?8,
                     posture_score = ?9,
                     predicted_risk = ?10,
                     updated_at = ?11
                 WHERE id = ?12 AND {OPEN_SESSION}"
            );
            let changed = conn
                .execute(
                    &sql,
                    params![
                        to_i64(progress.active_ms)?,
                        to_i64(progress.paused_ms)?,
                        progress.blink_count,
                        score.0,
                        score.1,
                        score.2,
                        score.3,
                        score.4,
                        score.5,
                        score.6,
                        progress.updated_at.to_rfc3339(),
                        session_id,
                    ],
                )
                .with_context(|| "failed to update session progress")?;
            Ok(changed > 0)
        })
        .await
    }

    /// Write the end-of-session record. A row can be finalized only once.
    pub async fn finalize_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.with_conn(move |conn| {
            let stopped_at = record.stopped_at.unwrap_or(record.updated_at);
            let score = score_to_columns(record.score.as_ref());
            let sql = format!(
                "UPDATE sessions
                 SET status = ?1,
                     stopped_at = ?2,
                     active_ms = ?3,
                     paused_ms = ?4,
                     blink_count = ?5,
                     final_total_score = ?6,
                     distance_score = ?7,
                     duration_score = ?8,
                     blink_score = ?9,
                     lighting_score = ?10,
                     posture_score = ?11,
                     predicted_risk = ?12,
                     updated_at = ?13
                 WHERE id = ?14 AND {OPEN_SESSION}"
            );
            let changed = conn
                .execute(
                    &sql,
                    params![
                        record.status.as_str(),
                        stopped_at.to_rfc3339(),
                        to_i64(record.active_ms)?,
                        to_i64(record.paused_ms)?,
                        record.blink_count,
                        score.0,
                        score.1,
                        score.2,
                        score.3,
                        score.4,
                        score.5,
                        score.6,
                        record.updated_at.to_rfc3339(),
                        record.id,
                    ],
                )
                .with_context(|| "failed to finalize session")?;

            if changed == 0 {
                bail!("session {} is unknown or already finalized", record.id);
            }
            Ok(())
        })
        .await
    }

    /// Move an open session to `status`. Returns false when the row is missing or already
    /// finalized; such rows are left untouched.
    pub async fn mark_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        stopped_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "UPDATE sessions
                 SET status = ?1,
                     stopped_at = COALESCE(?2, stopped_at),
                     updated_at = ?3
                 WHERE id = ?4 AND {OPEN_SESSION}"
            );
            let changed = conn
                .execute(
                    &sql,
                    params![
                        status.as_str(),
                        stopped_at.map(|dt| dt.to_rfc3339()),
                        updated_at.to_rfc3339(),
                        session_id,
                    ],
                )
                .with_context(|| "failed to update session status")?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![session_id])?;
            let session = match rows.next()? {
                Some(row) => Some(row_to_session(row)?),
                None => None,
            };
            Ok(session)
        })
        .await
    }

    /// Sessions left `Running` or `Paused` by a previous process.
    pub async fn get_incomplete_sessions(&self) -> Result<Vec<Session>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE {OPEN_SESSION}
                 ORDER BY started_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            collect_sessions(&mut stmt, params![])
        })
        .await
    }

    pub async fn list_sessions_since(&self, since: DateTime<Utc>) -> Result<Vec<Session>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE started_at >= ?1
                 ORDER BY started_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            collect_sessions(&mut stmt, params![since.to_rfc3339()])
        })
        .await
    }

    /// Mean final score of sessions started since `since`; sessions without a score are
    /// ignored. `None` when nothing qualifies.
    pub async fn average_score_since(&self, since: DateTime<Utc>) -> Result<Option<f64>> {
        self.with_conn(move |conn| {
            let average: Option<f64> = conn.query_row(
                "SELECT AVG(final_total_score) FROM sessions
                 WHERE started_at >= ?1 AND final_total_score IS NOT NULL",
                params![since.to_rfc3339()],
                |row| row.get(0),
            )?;
            Ok(average)
        })
        .await
    }
}
