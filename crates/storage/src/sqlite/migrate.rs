use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// One schema version: statements applied together in a transaction.
struct Migration {
    version: i64,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    statements: &[
        r"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_key TEXT NOT NULL,
            transcript TEXT NOT NULL,
            corrected TEXT NOT NULL,
            score INTEGER NOT NULL CHECK (score BETWEEN 1 AND 10),
            reply TEXT NOT NULL,
            feedback TEXT NOT NULL DEFAULT '',
            corrections TEXT NOT NULL DEFAULT '[]',
            source TEXT NOT NULL DEFAULT 'text',
            created_at_ms INTEGER NOT NULL
        )",
        r"
        CREATE TABLE IF NOT EXISTS user_progress (
            user_key TEXT PRIMARY KEY,
            total_xp INTEGER NOT NULL CHECK (total_xp >= 0),
            level INTEGER NOT NULL CHECK (level >= 1),
            streak INTEGER NOT NULL CHECK (streak >= 0),
            last_active TEXT,
            badges TEXT NOT NULL DEFAULT '[]',
            total_sessions INTEGER NOT NULL CHECK (total_sessions >= 0),
            had_voice_message INTEGER NOT NULL DEFAULT 0,
            recent_sessions TEXT NOT NULL DEFAULT '[]',
            week_start TEXT NOT NULL,
            current_week_xp INTEGER NOT NULL CHECK (current_week_xp >= 0),
            current_week_sessions INTEGER NOT NULL CHECK (current_week_sessions >= 0),
            updated_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sessions_user_created ON sessions (user_key, created_at_ms)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions (created_at_ms)",
        "CREATE INDEX IF NOT EXISTS idx_user_progress_xp ON user_progress (total_xp DESC)",
        "CREATE INDEX IF NOT EXISTS idx_user_progress_week ON user_progress (week_start, current_week_xp DESC)",
    ],
}];

/// Applies every migration newer than the recorded schema version.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    let current = current.unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let mut tx = pool.begin().await?;
        for statement in migration.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|source| SqliteInitError::Migration {
                    version: migration.version,
                    source,
                })?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
            .bind(migration.version)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::debug!(version = migration.version, "schema migration applied");
    }

    Ok(())
}
