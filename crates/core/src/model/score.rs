use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("fluency score must be between 1 and 10 (got {0})")]
    OutOfRange(i64),
}

/// Fluency rating of a single submission, always within 1..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct FluencyScore(u8);

impl FluencyScore {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Creates a score, rejecting values outside 1..=10.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` for anything outside the scale.
    pub fn new(value: i64) -> Result<Self, ScoreError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            let v = u8::try_from(value).map_err(|_| ScoreError::OutOfRange(value))?;
            Ok(Self(v))
        } else {
            Err(ScoreError::OutOfRange(value))
        }
    }

    /// Rounds and clamps an arbitrary rating onto the 1..=10 scale.
    ///
    /// Non-finite input maps to the lowest score.
    #[must_use]
    pub fn clamped(raw: f64) -> Self {
        if !raw.is_finite() {
            return Self(Self::MIN);
        }
        let rounded = raw.round().clamp(f64::from(Self::MIN), f64::from(Self::MAX));
        // In range after the clamp above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self(rounded as u8)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for FluencyScore {
    type Error = ScoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FluencyScore> for u8 {
    fn from(score: FluencyScore) -> Self {
        score.0
    }
}

impl fmt::Display for FluencyScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/10", self.0)
    }
}
