use chrono::{DateTime, Utc};
use talk_core::model::{Session, SessionId, UserKey};

use super::SqliteRepository;
use super::mapping::{conn, map_session_row, millis, ser};
use crate::repository::{SessionRepository, StorageError};

const SESSION_COLUMNS: &str = r"
    id, user_key, transcript, corrected, score, reply,
    feedback, corrections, source, created_at_ms
";

fn map_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Session>, StorageError> {
    rows.iter().map(map_session_row).collect()
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn append_session(&self, session: &Session) -> Result<(), StorageError> {
        let corrections = serde_json::to_string(session.corrections()).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO sessions (
                    id, user_key, transcript, corrected, score, reply,
                    feedback, corrections, source, created_at_ms
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(session.id().to_string())
        .bind(session.user().as_str())
        .bind(session.transcript())
        .bind(session.corrected())
        .bind(i64::from(session.score().value()))
        .bind(session.reply())
        .bind(session.feedback())
        .bind(corrections)
        .bind(session.source().as_str())
        .bind(millis(session.created_at()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        tracing::debug!(session = %session.id(), user = %session.user(), "session stored");
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_session_row(&row)
    }

    async fn list_user_sessions(
        &self,
        user: &UserKey,
        limit: u32,
    ) -> Result<Vec<Session>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE user_key = ?1
             ORDER BY created_at_ms DESC, id DESC
             LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        map_rows(&rows)
    }

    async fn sessions_between(
        &self,
        user: &UserKey,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Session>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE user_key = ?1 AND created_at_ms >= ?2 AND created_at_ms <= ?3
             ORDER BY created_at_ms ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(millis(from))
            .bind(millis(until))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        map_rows(&rows)
    }

    async fn list_all_sessions(&self, limit: u32) -> Result<Vec<Session>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             ORDER BY created_at_ms DESC, id DESC
             LIMIT ?1"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        map_rows(&rows)
    }
}
