use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{FluencyScore, SessionId, UserKey};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionRecordError {
    #[error("transcript cannot be empty")]
    EmptyTranscript,
}

//
// ─── CORRECTIONS ──────────────────────────────────────────────────────────────
//

/// Kind of mistake a correction addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionCategory {
    Grammar,
    Vocabulary,
    Structure,
    Pronunciation,
    Spelling,
    Punctuation,
    #[serde(other)]
    Other,
}

impl CorrectionCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grammar => "grammar",
            Self::Vocabulary => "vocabulary",
            Self::Structure => "structure",
            Self::Pronunciation => "pronunciation",
            Self::Spelling => "spelling",
            Self::Punctuation => "punctuation",
            Self::Other => "other",
        }
    }
}

/// One suggested fix inside a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub original: String,
    pub corrected: String,
    #[serde(rename = "type", default = "default_category")]
    pub category: CorrectionCategory,
}

fn default_category() -> CorrectionCategory {
    CorrectionCategory::Other
}

/// How the submission reached the coach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    #[default]
    Text,
    Voice,
}

impl SessionSource {
    #[must_use]
    pub fn is_voice(self) -> bool {
        matches!(self, Self::Voice)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// Unvalidated input for a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub user: UserKey,
    pub transcript: String,
    pub corrected: String,
    pub score: FluencyScore,
    pub reply: String,
    pub feedback: String,
    pub corrections: Vec<Correction>,
    pub source: SessionSource,
}

/// One coached chat or voice turn. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    user: UserKey,
    transcript: String,
    corrected: String,
    score: FluencyScore,
    reply: String,
    feedback: String,
    corrections: Vec<Correction>,
    source: SessionSource,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Validate a draft and stamp it with an id and creation time.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError::EmptyTranscript` if the transcript is blank.
    pub fn new(
        id: SessionId,
        draft: NewSession,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SessionRecordError> {
        if draft.transcript.trim().is_empty() {
            return Err(SessionRecordError::EmptyTranscript);
        }
        Ok(Self::from_persisted(id, draft, created_at))
    }

    /// Rehydrate a session from storage without re-validating.
    #[must_use]
    pub fn from_persisted(id: SessionId, draft: NewSession, created_at: DateTime<Utc>) -> Self {
        let NewSession {
            user,
            transcript,
            corrected,
            score,
            reply,
            feedback,
            corrections,
            source,
        } = draft;
        Self {
            id,
            user,
            transcript,
            corrected,
            score,
            reply,
            feedback,
            corrections,
            source,
            created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user(&self) -> &UserKey {
        &self.user
    }

    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    #[must_use]
    pub fn corrected(&self) -> &str {
        &self.corrected
    }

    #[must_use]
    pub fn score(&self) -> FluencyScore {
        self.score
    }

    #[must_use]
    pub fn reply(&self) -> &str {
        &self.reply
    }

    #[must_use]
    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    #[must_use]
    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    #[must_use]
    pub fn source(&self) -> SessionSource {
        self.source
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
