//! Shared error types for the services crate.

use thiserror::Error;

use talk_core::model::{SessionRecordError, UserKeyError};
use talk_storage::StorageError;

/// Errors emitted by `CoachService` when talking to the completion API.
///
/// These never reach callers of `FluencyAnalyzer::analyze`; they are logged
/// and replaced by the heuristic analysis.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoachError {
    #[error("coach is not configured")]
    Disabled,
    #[error("coach returned an empty response")]
    EmptyResponse,
    #[error("coach request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("coach reply is not valid analysis json: {0}")]
    Parse(String),
    #[error("coach reply is missing `{0}`")]
    MissingField(&'static str),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ChatService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,
    #[error(transparent)]
    User(#[from] UserKeyError),
    #[error(transparent)]
    Session(#[from] SessionRecordError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("unknown storage backend `{0}` (expected sqlite, json or memory)")]
    UnknownBackend(String),
    #[error("invalid utc offset `{0}` (expected whole minutes within ±14h)")]
    InvalidOffset(String),
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
