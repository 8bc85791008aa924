use chrono::{NaiveDate, Utc};
use talk_core::model::{LeaderboardOrder, UserKey, UserProgress};

use super::SqliteRepository;
use super::mapping::{conn, map_progress_row, ser};
use crate::repository::{ProgressRepository, StorageError};

const PROGRESS_COLUMNS: &str = r"
    user_key, total_xp, level, streak, last_active, badges, total_sessions,
    had_voice_message, recent_sessions, week_start, current_week_xp, current_week_sessions
";

fn order_clause(order: LeaderboardOrder) -> &'static str {
    match order {
        LeaderboardOrder::Xp => "total_xp DESC, user_key ASC",
        LeaderboardOrder::Level => "level DESC, total_xp DESC, user_key ASC",
        LeaderboardOrder::Streak => "streak DESC, total_xp DESC, user_key ASC",
        LeaderboardOrder::Weekly => "current_week_xp DESC, user_key ASC",
    }
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(&self, user: &UserKey) -> Result<Option<UserProgress>, StorageError> {
        let sql = format!("SELECT {PROGRESS_COLUMNS} FROM user_progress WHERE user_key = ?1");
        let row = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn save_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        let badges = serde_json::to_string(progress.badges()).map_err(ser)?;
        let recent = serde_json::to_string(&progress.recent_sessions().to_vec()).map_err(ser)?;
        let weekly = progress.weekly_stats();

        sqlx::query(
            r"
            INSERT INTO user_progress (
                user_key, total_xp, level, streak, last_active, badges, total_sessions,
                had_voice_message, recent_sessions, week_start, current_week_xp,
                current_week_sessions, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(user_key) DO UPDATE SET
                total_xp = excluded.total_xp,
                level = excluded.level,
                streak = excluded.streak,
                last_active = excluded.last_active,
                badges = excluded.badges,
                total_sessions = excluded.total_sessions,
                had_voice_message = excluded.had_voice_message,
                recent_sessions = excluded.recent_sessions,
                week_start = excluded.week_start,
                current_week_xp = excluded.current_week_xp,
                current_week_sessions = excluded.current_week_sessions,
                updated_at = excluded.updated_at
            ",
        )
        .bind(progress.user().as_str())
        .bind(i64::from(progress.total_xp()))
        .bind(i64::from(progress.level()))
        .bind(i64::from(progress.streak()))
        .bind(progress.last_active())
        .bind(badges)
        .bind(i64::from(progress.total_sessions()))
        .bind(i64::from(progress.had_voice_message()))
        .bind(recent)
        .bind(weekly.week_start)
        .bind(i64::from(weekly.current_week_xp))
        .bind(i64::from(weekly.current_week_sessions))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        tracing::debug!(user = %progress.user(), total_xp = progress.total_xp(), "progress stored");
        Ok(())
    }

    async fn leaderboard(
        &self,
        order: LeaderboardOrder,
        limit: u32,
    ) -> Result<Vec<UserProgress>, StorageError> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress ORDER BY {} LIMIT ?1",
            order_clause(order)
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_progress_row).collect()
    }

    async fn reset_stale_weekly_stats(&self, week_start: NaiveDate) -> Result<u64, StorageError> {
        let res = sqlx::query(
            r"
            UPDATE user_progress
            SET current_week_xp = 0,
                current_week_sessions = 0,
                week_start = ?1,
                updated_at = ?2
            WHERE week_start <> ?1
            ",
        )
        .bind(week_start)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected())
    }
}
