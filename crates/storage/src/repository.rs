use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use talk_core::gamification::BadgeId;
use talk_core::model::{
    Correction, FluencyScore, LeaderboardOrder, NewSession, ProgressParts, RecentSession, Session,
    SessionId, SessionSource, UserKey, UserProgress, WeeklyStats,
};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── PERSISTED SHAPES ─────────────────────────────────────────────────────────
//

/// Persisted shape of a session.
///
/// Mirrors the domain `Session` so adapters can serialize it without
/// leaking storage concerns into the domain layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: SessionId,
    pub user: UserKey,
    pub transcript: String,
    pub corrected: String,
    pub score: FluencyScore,
    pub reply: String,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub corrections: Vec<Correction>,
    #[serde(default)]
    pub source: SessionSource,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            id: session.id(),
            user: session.user().clone(),
            transcript: session.transcript().to_owned(),
            corrected: session.corrected().to_owned(),
            score: session.score(),
            reply: session.reply().to_owned(),
            feedback: session.feedback().to_owned(),
            corrections: session.corrections().to_vec(),
            source: session.source(),
            created_at: session.created_at(),
        }
    }

    #[must_use]
    pub fn into_session(self) -> Session {
        Session::from_persisted(
            self.id,
            NewSession {
                user: self.user,
                transcript: self.transcript,
                corrected: self.corrected,
                score: self.score,
                reply: self.reply,
                feedback: self.feedback,
                corrections: self.corrections,
                source: self.source,
            },
            self.created_at,
        )
    }
}

/// Persisted shape of a user's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub user: UserKey,
    #[serde(rename = "totalXP")]
    pub total_xp: u32,
    /// Stored for readers of the raw document; recomputed on load.
    pub level: u32,
    pub streak: u32,
    pub last_active: Option<NaiveDate>,
    #[serde(default)]
    pub badges: Vec<BadgeId>,
    pub total_sessions: u32,
    #[serde(default)]
    pub had_voice_message: bool,
    #[serde(default)]
    pub recent_sessions: Vec<RecentSession>,
    pub weekly_stats: WeeklyStats,
}

impl ProgressRecord {
    #[must_use]
    pub fn from_progress(progress: &UserProgress) -> Self {
        Self {
            user: progress.user().clone(),
            total_xp: progress.total_xp(),
            level: progress.level(),
            streak: progress.streak(),
            last_active: progress.last_active(),
            badges: progress.badges().to_vec(),
            total_sessions: progress.total_sessions(),
            had_voice_message: progress.had_voice_message(),
            recent_sessions: progress.recent_sessions().to_vec(),
            weekly_stats: progress.weekly_stats(),
        }
    }

    /// Convert the record back into domain `UserProgress`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored state violates
    /// progress invariants.
    pub fn into_progress(self) -> Result<UserProgress, StorageError> {
        UserProgress::from_persisted(ProgressParts {
            user: self.user,
            total_xp: self.total_xp,
            streak: self.streak,
            last_active: self.last_active,
            badges: self.badges,
            total_sessions: self.total_sessions,
            had_voice_message: self.had_voice_message,
            recent_sessions: self.recent_sessions,
            weekly_stats: self.weekly_stats,
        })
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

//
// ─── REPOSITORY CONTRACTS ─────────────────────────────────────────────────────
//

/// Append-only store of coached sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a new session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already exists, or other storage errors.
    async fn append_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Fetch a session by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError>;

    /// A user's sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_user_sessions(
        &self,
        user: &UserKey,
        limit: u32,
    ) -> Result<Vec<Session>, StorageError>;

    /// A user's sessions with `from <= created_at <= until`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn sessions_between(
        &self,
        user: &UserKey,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Session>, StorageError>;

    /// Sessions of every user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_all_sessions(&self, limit: u32) -> Result<Vec<Session>, StorageError>;
}

/// Keyed store of per-user progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch progress for a user, `None` if the user has no sessions yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures or corrupt rows.
    async fn get_progress(&self, user: &UserKey) -> Result<Option<UserProgress>, StorageError>;

    /// Insert or replace a user's progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the progress cannot be stored.
    async fn save_progress(&self, progress: &UserProgress) -> Result<(), StorageError>;

    /// Top `limit` users under `order`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn leaderboard(
        &self,
        order: LeaderboardOrder,
        limit: u32,
    ) -> Result<Vec<UserProgress>, StorageError>;

    /// Zero weekly counters of every user whose week is not `week_start`.
    ///
    /// Returns how many users were changed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn reset_stale_weekly_stats(&self, week_start: NaiveDate) -> Result<u64, StorageError>;
}

pub(crate) fn limit_usize(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

/// Newest-first ordering with the id as tie breaker.
pub(crate) fn newest_first(a: &Session, b: &Session) -> std::cmp::Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| b.id().cmp(&a.id()))
}

//
// ─── IN-MEMORY ────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<Vec<Session>>>,
    progress: Arc<Mutex<HashMap<UserKey, UserProgress>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn append_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.iter().any(|s| s.id() == session.id()) {
            return Err(StorageError::Conflict);
        }
        guard.push(session.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|s| s.id() == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_user_sessions(
        &self,
        user: &UserKey,
        limit: u32,
    ) -> Result<Vec<Session>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<Session> = guard.iter().filter(|s| s.user() == user).cloned().collect();
        found.sort_by(newest_first);
        found.truncate(limit_usize(limit));
        Ok(found)
    }

    async fn sessions_between(
        &self,
        user: &UserKey,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Session>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<Session> = guard
            .iter()
            .filter(|s| s.user() == user && s.created_at() >= from && s.created_at() <= until)
            .cloned()
            .collect();
        found.sort_by(|a, b| newest_first(b, a));
        Ok(found)
    }

    async fn list_all_sessions(&self, limit: u32) -> Result<Vec<Session>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut all = guard.clone();
        all.sort_by(newest_first);
        all.truncate(limit_usize(limit));
        Ok(all)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(&self, user: &UserKey) -> Result<Option<UserProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(user).cloned())
    }

    async fn save_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(progress.user().clone(), progress.clone());
        Ok(())
    }

    async fn leaderboard(
        &self,
        order: LeaderboardOrder,
        limit: u32,
    ) -> Result<Vec<UserProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut entries: Vec<UserProgress> = guard.values().cloned().collect();
        order.rank(&mut entries, limit_usize(limit));
        Ok(entries)
    }

    async fn reset_stale_weekly_stats(&self, week_start: NaiveDate) -> Result<u64, StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let changed = guard
            .values_mut()
            .map(|p| p.roll_week(week_start))
            .filter(|changed| *changed)
            .count();
        Ok(u64::try_from(changed).unwrap_or(u64::MAX))
    }
}

//
// ─── BACKEND SELECTION ────────────────────────────────────────────────────────
//

/// Which storage implementation to open at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite { url: String },
    JsonFile { path: PathBuf },
    InMemory,
}

impl StorageBackend {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqlite { .. } => "sqlite",
            Self::JsonFile { .. } => "json",
            Self::InMemory => "memory",
        }
    }
}

/// Aggregates session and progress repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self { sessions, progress }
    }

    /// Open the backend chosen by configuration.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the backend cannot be opened.
    pub async fn open(backend: &StorageBackend) -> Result<Self, StorageError> {
        tracing::debug!(backend = backend.name(), "opening storage");
        match backend {
            StorageBackend::Sqlite { url } => Self::sqlite(url)
                .await
                .map_err(|e| StorageError::Connection(e.to_string())),
            StorageBackend::JsonFile { path } => Ok(Self::json_file(path.clone())),
            StorageBackend::InMemory => Ok(Self::in_memory()),
        }
    }
}
