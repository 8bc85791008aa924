use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use talk_core::CalendarZone;
use talk_storage::StorageBackend;

use crate::coach::CoachConfig;
use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://talkbuddy.sqlite3";
pub const DEFAULT_DATA_FILE: &str = "talkbuddy-data.json";

/// Runtime configuration resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageBackend,
    pub zone: CalendarZone,
    pub coach: Option<CoachConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::Sqlite {
                url: DEFAULT_DB_URL.into(),
            },
            zone: CalendarZone::utc(),
            coach: None,
        }
    }
}

impl AppConfig {
    /// Read configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unknown backend name, an unparsable
    /// offset or an explicitly empty path.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(|key| vars.get(key).cloned())
    }

    /// Same as `from_env`, reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// See `from_env`.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned());

        let backend = get("TALKBUDDY_STORAGE").unwrap_or_else(|| "sqlite".into());
        let db_url = get("TALKBUDDY_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.into());
        let data_file = get("TALKBUDDY_DATA_FILE").unwrap_or_else(|| DEFAULT_DATA_FILE.into());
        let storage = storage_backend(&backend, &db_url, &data_file)?;

        let zone = match get("TALKBUDDY_UTC_OFFSET_MINUTES") {
            Some(raw) if !raw.is_empty() => parse_offset(&raw)?,
            _ => CalendarZone::utc(),
        };

        let api_key = get("TALKBUDDY_AI_API_KEY")
            .filter(|k| !k.is_empty())
            .or_else(|| get("GROQ_API_KEY").filter(|k| !k.is_empty()));
        let coach = api_key.map(|api_key| {
            let mut config = CoachConfig::new(api_key);
            if let Some(base_url) = get("TALKBUDDY_AI_BASE_URL").filter(|v| !v.is_empty()) {
                config.base_url = base_url;
            }
            if let Some(model) = get("TALKBUDDY_AI_MODEL").filter(|v| !v.is_empty()) {
                config.model = model;
            }
            config
        });

        Ok(Self {
            storage,
            zone,
            coach,
        })
    }
}

/// Resolve a backend name (`sqlite`, `json` or `memory`) into a `StorageBackend`.
///
/// # Errors
///
/// Returns `ConfigError::UnknownBackend` for other names and
/// `ConfigError::Empty` when the selected location is blank.
pub fn storage_backend(
    name: &str,
    db_url: &str,
    data_file: &str,
) -> Result<StorageBackend, ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "sqlite" => {
            if db_url.trim().is_empty() {
                return Err(ConfigError::Empty("TALKBUDDY_DB_URL"));
            }
            Ok(StorageBackend::Sqlite {
                url: db_url.trim().to_owned(),
            })
        }
        "json" => {
            if data_file.trim().is_empty() {
                return Err(ConfigError::Empty("TALKBUDDY_DATA_FILE"));
            }
            Ok(StorageBackend::JsonFile {
                path: PathBuf::from(data_file.trim()),
            })
        }
        "memory" => Ok(StorageBackend::InMemory),
        other => Err(ConfigError::UnknownBackend(other.to_owned())),
    }
}

/// Parse an offset from UTC in minutes.
///
/// # Errors
///
/// Returns `ConfigError::InvalidOffset` if `raw` is not an integer within ±14h.
pub fn parse_offset(raw: &str) -> Result<CalendarZone, ConfigError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .and_then(CalendarZone::from_offset_minutes)
        .ok_or_else(|| ConfigError::InvalidOffset(raw.to_owned()))
}
