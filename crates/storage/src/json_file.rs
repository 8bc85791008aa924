//! Flat-file backend: one JSON document holding every session and every
//! progress record. Suited to single-process deployments and local use.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use talk_core::model::{LeaderboardOrder, Session, SessionId, UserKey, UserProgress};
use tokio::sync::Mutex;

use crate::repository::{
    ProgressRecord, ProgressRepository, SessionRecord, SessionRepository, Storage, StorageError,
    limit_usize, newest_first,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    sessions: Vec<SessionRecord>,
    #[serde(default)]
    progress: Vec<ProgressRecord>,
}

/// JSON document store. Every write rewrites the file through a temporary
/// sibling and an atomic rename.
#[derive(Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonFileRepository {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Document, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Document::default()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::default()),
            Err(e) => Err(StorageError::Connection(e.to_string())),
        }
    }

    async fn store(&self, doc: &Document) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn read<T>(&self, f: impl FnOnce(Document) -> Result<T, StorageError>) -> Result<T, StorageError> {
        let _guard = self.lock.lock().await;
        let doc = self.load().await?;
        f(doc)
    }

    async fn update<T>(
        &self,
        f: impl FnOnce(&mut Document) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let out = f(&mut doc)?;
        self.store(&doc).await?;
        Ok(out)
    }
}

fn sessions_of(doc: Document, keep: impl Fn(&SessionRecord) -> bool) -> Vec<Session> {
    doc.sessions
        .into_iter()
        .filter(|r| keep(r))
        .map(SessionRecord::into_session)
        .collect()
}

#[async_trait]
impl SessionRepository for JsonFileRepository {
    async fn append_session(&self, session: &Session) -> Result<(), StorageError> {
        let record = SessionRecord::from_session(session);
        self.update(move |doc| {
            if doc.sessions.iter().any(|s| s.id == record.id) {
                return Err(StorageError::Conflict);
            }
            doc.sessions.push(record);
            Ok(())
        })
        .await?;
        tracing::debug!(session = %session.id(), path = %self.path.display(), "session stored");
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        self.read(|doc| {
            doc.sessions
                .into_iter()
                .find(|s| s.id == id)
                .map(SessionRecord::into_session)
                .ok_or(StorageError::NotFound)
        })
        .await
    }

    async fn list_user_sessions(
        &self,
        user: &UserKey,
        limit: u32,
    ) -> Result<Vec<Session>, StorageError> {
        self.read(|doc| {
            let mut found = sessions_of(doc, |r| &r.user == user);
            found.sort_by(newest_first);
            found.truncate(limit_usize(limit));
            Ok(found)
        })
        .await
    }

    async fn sessions_between(
        &self,
        user: &UserKey,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Session>, StorageError> {
        self.read(|doc| {
            let mut found = sessions_of(doc, |r| {
                &r.user == user && r.created_at >= from && r.created_at <= until
            });
            found.sort_by(|a, b| newest_first(b, a));
            Ok(found)
        })
        .await
    }

    async fn list_all_sessions(&self, limit: u32) -> Result<Vec<Session>, StorageError> {
        self.read(|doc| {
            let mut all = sessions_of(doc, |_| true);
            all.sort_by(newest_first);
            all.truncate(limit_usize(limit));
            Ok(all)
        })
        .await
    }
}

#[async_trait]
impl ProgressRepository for JsonFileRepository {
    async fn get_progress(&self, user: &UserKey) -> Result<Option<UserProgress>, StorageError> {
        self.read(|doc| {
            doc.progress
                .into_iter()
                .find(|p| &p.user == user)
                .map(ProgressRecord::into_progress)
                .transpose()
        })
        .await
    }

    async fn save_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        let record = ProgressRecord::from_progress(progress);
        self.update(move |doc| {
            match doc.progress.iter_mut().find(|p| p.user == record.user) {
                Some(existing) => *existing = record,
                None => doc.progress.push(record),
            }
            Ok(())
        })
        .await
    }

    async fn leaderboard(
        &self,
        order: LeaderboardOrder,
        limit: u32,
    ) -> Result<Vec<UserProgress>, StorageError> {
        self.read(|doc| {
            let mut entries = doc
                .progress
                .into_iter()
                .map(ProgressRecord::into_progress)
                .collect::<Result<Vec<_>, _>>()?;
            order.rank(&mut entries, limit_usize(limit));
            Ok(entries)
        })
        .await
    }

    async fn reset_stale_weekly_stats(&self, week_start: NaiveDate) -> Result<u64, StorageError> {
        self.update(|doc| {
            let mut changed = 0_u64;
            for record in &mut doc.progress {
                let rolled = record.weekly_stats.for_week(week_start);
                if rolled != record.weekly_stats {
                    record.weekly_stats = rolled;
                    changed += 1;
                }
            }
            Ok(changed)
        })
        .await
    }
}

impl Storage {
    /// Build a `Storage` backed by a single JSON file at `path`.
    ///
    /// The file is created on first write.
    #[must_use]
    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        let repo = JsonFileRepository::new(path);
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self { sessions, progress }
    }
}
