use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised when a user key fails validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserKeyError {
    #[error("user key cannot be empty")]
    Empty,
    #[error("user key exceeds {max} characters (got {len})")]
    TooLong { len: usize, max: usize },
}

/// Identifies the owner of sessions and progress.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserKey(String);

impl UserKey {
    pub const MAX_LEN: usize = 128;
    pub const ANONYMOUS: &'static str = "anonymous";

    /// Creates a validated key; surrounding whitespace is dropped.
    ///
    /// # Errors
    ///
    /// Returns `UserKeyError` if the key is blank or longer than `MAX_LEN`.
    pub fn new(raw: impl Into<String>) -> Result<Self, UserKeyError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UserKeyError::Empty);
        }
        let len = trimmed.chars().count();
        if len > Self::MAX_LEN {
            return Err(UserKeyError::TooLong {
                len,
                max: Self::MAX_LEN,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The shared key used when a request carries no user.
    #[must_use]
    pub fn anonymous() -> Self {
        Self(Self::ANONYMOUS.to_owned())
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.0 == Self::ANONYMOUS
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserKey {
    type Error = UserKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserKey> for String {
    fn from(key: UserKey) -> Self {
        key.0
    }
}

impl FromStr for UserKey {
    type Err = UserKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserKey({})", self.0)
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a Session
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random `SessionId`
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying UUID
    #[must_use]
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for SessionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(SessionId)
            .map_err(|_| ParseIdError {
                kind: "SessionId".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_is_trimmed() {
        let key = UserKey::new("  maria ").unwrap();
        assert_eq!(key.as_str(), "maria");
        assert_eq!(key.to_string(), "maria");
    }

    #[test]
    fn user_key_rejects_blank_and_long() {
        assert_eq!(UserKey::new("   "), Err(UserKeyError::Empty));
        let long = "x".repeat(UserKey::MAX_LEN + 1);
        assert!(matches!(
            UserKey::new(long),
            Err(UserKeyError::TooLong { len: 129, .. })
        ));
    }

    #[test]
    fn anonymous_key() {
        assert!(UserKey::anonymous().is_anonymous());
        assert!(!UserKey::new("sam").unwrap().is_anonymous());
    }

    #[test]
    fn user_key_deserialize_validates() {
        let ok: UserKey = serde_json::from_str("\"lee\"").unwrap();
        assert_eq!(ok.as_str(), "lee");
        assert!(serde_json::from_str::<UserKey>("\"  \"").is_err());
    }

    #[test]
    fn session_id_parse_roundtrip() {
        let id = SessionId::generate();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }
}
