use thiserror::Error;

use crate::model::{ProgressError, ScoreError, SessionRecordError, UserKeyError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    UserKey(#[from] UserKeyError),
    #[error(transparent)]
    Session(#[from] SessionRecordError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}
