use std::sync::Arc;

use serde::Serialize;

use talk_core::gamification::{SessionOutcome, WeeklySummary, summarize_week, weekly};
use talk_core::model::{NewSession, Session, SessionId, SessionSource, UserKey};
use talk_core::{CalendarZone, Clock};
use talk_storage::SessionRepository;

use crate::coach::{FluencyAnalysis, FluencyAnalyzer};
use crate::error::ChatError;
use crate::progress_service::{ProgressService, ProgressUpdateReport};

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const DEFAULT_SESSIONS_LIMIT: u32 = 100;

/// Outcome of one chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub analysis: FluencyAnalysis,
    pub source: SessionSource,
    /// Whether the session reached storage.
    pub saved: bool,
    /// `None` when progress could not be updated.
    pub progress: Option<ProgressUpdateReport>,
}

/// Runs chat turns: analysis, session log and progress update.
pub struct ChatService {
    clock: Clock,
    zone: CalendarZone,
    analyzer: Arc<dyn FluencyAnalyzer>,
    sessions: Arc<dyn SessionRepository>,
    progress: Arc<ProgressService>,
}

impl ChatService {
    #[must_use]
    pub fn new(
        clock: Clock,
        zone: CalendarZone,
        analyzer: Arc<dyn FluencyAnalyzer>,
        sessions: Arc<dyn SessionRepository>,
        progress: Arc<ProgressService>,
    ) -> Self {
        Self {
            clock,
            zone,
            analyzer,
            sessions,
            progress,
        }
    }

    /// Analyze `text` from `user` and record the session.
    ///
    /// Storage failures while saving the session or updating progress are
    /// logged and reported through `ChatTurn::saved` and
    /// `ChatTurn::progress`; the learner still gets the analysis.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::EmptyMessage` if `text` is blank.
    pub async fn submit(
        &self,
        user: &UserKey,
        text: &str,
        source: SessionSource,
    ) -> Result<ChatTurn, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let analysis = self.analyzer.analyze(text).await;
        let now = self.clock.now();
        let session = Session::new(
            SessionId::generate(),
            NewSession {
                user: user.clone(),
                transcript: text.to_owned(),
                corrected: analysis.corrected.clone(),
                score: analysis.score,
                reply: analysis.reply.clone(),
                feedback: analysis.feedback.clone(),
                corrections: analysis.corrections.clone(),
                source,
            },
            now,
        )?;

        let saved = match self.sessions.append_session(&session).await {
            Ok(()) => {
                tracing::debug!(user = %user, session = %session.id(), "session saved");
                true
            }
            Err(err) => {
                tracing::warn!(user = %user, error = %err, "failed to save session");
                false
            }
        };

        let outcome = SessionOutcome {
            score: analysis.score,
            source,
        };
        let progress = match self.progress.record_session(user, outcome, now).await {
            Ok(report) => Some(report),
            Err(err) => {
                tracing::warn!(user = %user, error = %err, "failed to update progress");
                None
            }
        };

        Ok(ChatTurn {
            session_id: session.id(),
            analysis,
            source,
            saved,
            progress,
        })
    }

    /// A user's sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` on backend failures.
    pub async fn history(&self, user: &UserKey, limit: Option<u32>) -> Result<Vec<Session>, ChatError> {
        Ok(self
            .sessions
            .list_user_sessions(user, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await?)
    }

    /// Sessions of all users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` on backend failures.
    pub async fn all_sessions(&self, limit: Option<u32>) -> Result<Vec<Session>, ChatError> {
        Ok(self
            .sessions
            .list_all_sessions(limit.unwrap_or(DEFAULT_SESSIONS_LIMIT))
            .await?)
    }

    /// Summary of the user's last seven days.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` on backend failures.
    pub async fn weekly_summary(&self, user: &UserKey) -> Result<WeeklySummary, ChatError> {
        let now = self.clock.now();
        let sessions = self
            .sessions
            .sessions_between(user, weekly::window_start(now), now)
            .await?;
        Ok(summarize_week(&sessions, now, self.zone))
    }
}
