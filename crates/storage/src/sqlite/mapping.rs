use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use talk_core::gamification::BadgeId;
use talk_core::model::{
    Correction, FluencyScore, NewSession, ProgressParts, RecentSession, Session, SessionId,
    SessionSource, UserKey, UserProgress, WeeklyStats,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(v: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::<Utc>::from_timestamp_millis(v)
        .ok_or_else(|| StorageError::Serialization(format!("invalid timestamp: {v}")))
}

pub(crate) fn parse_source(s: &str) -> Result<SessionSource, StorageError> {
    match s {
        "text" => Ok(SessionSource::Text),
        "voice" => Ok(SessionSource::Voice),
        _ => Err(StorageError::Serialization(format!("invalid source: {s}"))),
    }
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<Session, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let id: SessionId = id.parse().map_err(ser)?;
    let user = UserKey::new(row.try_get::<String, _>("user_key").map_err(ser)?).map_err(ser)?;
    let score = FluencyScore::new(row.try_get::<i64, _>("score").map_err(ser)?).map_err(ser)?;
    let corrections: Vec<Correction> =
        serde_json::from_str(&row.try_get::<String, _>("corrections").map_err(ser)?)
            .map_err(ser)?;
    let source = parse_source(&row.try_get::<String, _>("source").map_err(ser)?)?;
    let created_at = from_millis(row.try_get::<i64, _>("created_at_ms").map_err(ser)?)?;

    Ok(Session::from_persisted(
        id,
        NewSession {
            user,
            transcript: row.try_get("transcript").map_err(ser)?,
            corrected: row.try_get("corrected").map_err(ser)?,
            score,
            reply: row.try_get("reply").map_err(ser)?,
            feedback: row.try_get("feedback").map_err(ser)?,
            corrections,
            source,
        },
        created_at,
    ))
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<UserProgress, StorageError> {
    let user = UserKey::new(row.try_get::<String, _>("user_key").map_err(ser)?).map_err(ser)?;
    let badges: Vec<BadgeId> =
        serde_json::from_str(&row.try_get::<String, _>("badges").map_err(ser)?).map_err(ser)?;
    let recent_sessions: Vec<RecentSession> =
        serde_json::from_str(&row.try_get::<String, _>("recent_sessions").map_err(ser)?)
            .map_err(ser)?;
    let last_active: Option<NaiveDate> = row.try_get("last_active").map_err(ser)?;
    let week_start: NaiveDate = row.try_get("week_start").map_err(ser)?;

    UserProgress::from_persisted(ProgressParts {
        user,
        total_xp: u32_from_i64("total_xp", row.try_get("total_xp").map_err(ser)?)?,
        streak: u32_from_i64("streak", row.try_get("streak").map_err(ser)?)?,
        last_active,
        badges,
        total_sessions: u32_from_i64(
            "total_sessions",
            row.try_get("total_sessions").map_err(ser)?,
        )?,
        had_voice_message: row.try_get::<i64, _>("had_voice_message").map_err(ser)? != 0,
        recent_sessions,
        weekly_stats: WeeklyStats {
            current_week_xp: u32_from_i64(
                "current_week_xp",
                row.try_get("current_week_xp").map_err(ser)?,
            )?,
            current_week_sessions: u32_from_i64(
                "current_week_sessions",
                row.try_get("current_week_sessions").map_err(ser)?,
            )?,
            week_start,
        },
    })
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use talk_core::time::fixed_now;

    #[test]
    fn millis_round_trip() {
        let at = fixed_now();
        assert_eq!(from_millis(millis(at)).unwrap(), at);
    }

    #[test]
    fn source_parsing() {
        assert_eq!(parse_source("voice").unwrap(), SessionSource::Voice);
        assert_eq!(parse_source(SessionSource::Text.as_str()).unwrap(), SessionSource::Text);
        assert!(parse_source("video").is_err());
    }
}
