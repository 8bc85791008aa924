use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use talk_core::model::{LeaderboardOrder, Session, SessionSource, UserKey};
use talk_services::config::{DEFAULT_DATA_FILE, DEFAULT_DB_URL, parse_offset, storage_backend};
use talk_services::{AppConfig, AppServices, Clock};
use talk_storage::StorageBackend;
use talk_storage::repository::SessionRecord;

#[derive(Debug, Parser)]
#[command(name = "talkbuddy")]
#[command(about = "TalkBuddy - English conversation practice with XP, streaks and badges", long_about = None)]
#[command(version)]
struct Cli {
    /// Storage backend: sqlite, json or memory [env: TALKBUDDY_STORAGE]
    #[arg(long, global = true)]
    storage: Option<String>,

    /// SQLite database URL or path [env: TALKBUDDY_DB_URL]
    #[arg(long, global = true)]
    db: Option<String>,

    /// JSON data file for the json backend [env: TALKBUDDY_DATA_FILE]
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// Offset from UTC in minutes used for calendar days [env: TALKBUDDY_UTC_OFFSET_MINUTES]
    #[arg(long, global = true, allow_hyphen_values = true)]
    utc_offset: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct UserArg {
    /// Learner key; omitted means the anonymous learner
    #[arg(long, env = "TALKBUDDY_USER")]
    user: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a message to the coach and record the session
    Chat {
        #[command(flatten)]
        user: UserArg,

        /// Mark the message as transcribed speech
        #[arg(long)]
        voice: bool,

        /// Message text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Show XP, level, streak and badges
    Progress {
        #[command(flatten)]
        user: UserArg,
    },

    /// List a learner's sessions, newest first
    History {
        #[command(flatten)]
        user: UserArg,

        #[arg(long)]
        limit: Option<u32>,
    },

    /// Summarize the last seven days
    Weekly {
        #[command(flatten)]
        user: UserArg,
    },

    /// Show XP and sessions of the current calendar week
    WeeklyProgress {
        #[command(flatten)]
        user: UserArg,
    },

    /// Rank learners
    Leaderboard {
        /// xp, level, streak or weekly
        #[arg(long, default_value = "xp")]
        by: LeaderboardOrder,

        #[arg(long)]
        limit: Option<u32>,
    },

    /// List every badge and whether the learner holds it
    Badges {
        #[command(flatten)]
        user: UserArg,
    },

    /// List sessions of all learners, newest first
    Sessions {
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Zero weekly counters that belong to an earlier week
    ResetWeekly,
}

fn user_key(arg: &UserArg) -> Result<UserKey> {
    match arg.user.as_deref() {
        None => Ok(UserKey::anonymous()),
        Some(raw) => UserKey::new(raw).with_context(|| format!("invalid --user value: {raw}")),
    }
}

/// Environment configuration with command-line flags applied on top.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("reading TALKBUDDY_* environment")?;

    if cli.storage.is_some() || cli.db.is_some() || cli.data_file.is_some() {
        let name = cli
            .storage
            .clone()
            .unwrap_or_else(|| config.storage.name().to_owned());
        let db = cli.db.clone().unwrap_or_else(|| match &config.storage {
            StorageBackend::Sqlite { url } => url.clone(),
            _ => DEFAULT_DB_URL.to_owned(),
        });
        let data_file = cli.data_file.clone().unwrap_or_else(|| match &config.storage {
            StorageBackend::JsonFile { path } => path.clone(),
            _ => PathBuf::from(DEFAULT_DATA_FILE),
        });
        config.storage = storage_backend(&name, &db, &data_file.to_string_lossy())?;
    }
    if let Some(raw) = cli.utc_offset.as_deref() {
        config.zone = parse_offset(raw)?;
    }

    if let StorageBackend::Sqlite { url } = &mut config.storage {
        *url = normalize_sqlite_url(url.clone());
        prepare_sqlite_file(url)?;
    }
    Ok(config)
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:") {
        return Ok(());
    }

    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid --db value: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid --db value: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn session_records(sessions: &[Session]) -> Vec<SessionRecord> {
    sessions.iter().map(SessionRecord::from_session).collect()
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    tracing::debug!(backend = config.storage.name(), "configuration resolved");
    let services = AppServices::open(&config, Clock::default_clock())
        .await
        .context("opening storage")?;
    let chat = services.chat();
    let progress = services.progress();

    match cli.command {
        Command::Chat {
            user,
            voice,
            message,
        } => {
            let source = if voice {
                SessionSource::Voice
            } else {
                SessionSource::Text
            };
            let turn = chat
                .submit(&user_key(&user)?, &message.join(" "), source)
                .await?;
            print_json(&turn)
        }
        Command::Progress { user } => print_json(&progress.progress_report(&user_key(&user)?).await?),
        Command::History { user, limit } => {
            let sessions = chat.history(&user_key(&user)?, limit).await?;
            print_json(&session_records(&sessions))
        }
        Command::Weekly { user } => print_json(&chat.weekly_summary(&user_key(&user)?).await?),
        Command::WeeklyProgress { user } => {
            print_json(&progress.weekly_progress(&user_key(&user)?).await?)
        }
        Command::Leaderboard { by, limit } => print_json(&progress.leaderboard(by, limit).await?),
        Command::Badges { user } => print_json(&progress.badge_catalog(&user_key(&user)?).await?),
        Command::Sessions { limit } => {
            let sessions = chat.all_sessions(limit).await?;
            print_json(&session_records(&sessions))
        }
        Command::ResetWeekly => {
            let reset = progress.reset_weekly_stats().await?;
            print_json(&serde_json::json!({ "reset": reset }))
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_with_global_flags() {
        let cli = Cli::try_parse_from([
            "talkbuddy",
            "chat",
            "--user",
            "mina",
            "--voice",
            "--storage",
            "memory",
            "I",
            "go",
            "home.",
        ])
        .unwrap();
        assert_eq!(cli.storage.as_deref(), Some("memory"));
        match cli.command {
            Command::Chat {
                user,
                voice,
                message,
            } => {
                assert_eq!(user.user.as_deref(), Some("mina"));
                assert!(voice);
                assert_eq!(message.join(" "), "I go home.");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_leaderboard_order() {
        let cli = Cli::try_parse_from(["talkbuddy", "leaderboard", "--by", "Streak", "--limit", "3"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Leaderboard {
                by: LeaderboardOrder::Streak,
                limit: Some(3)
            }
        ));
        assert!(Cli::try_parse_from(["talkbuddy", "leaderboard", "--by", "karma"]).is_err());
        assert!(Cli::try_parse_from(["talkbuddy", "chat"]).is_err());
    }

    #[test]
    fn negative_offsets_parse_as_values() {
        let cli = Cli::try_parse_from(["talkbuddy", "--utc-offset", "-300", "reset-weekly"]).unwrap();
        assert_eq!(cli.utc_offset.as_deref(), Some("-300"));
        assert!(matches!(cli.command, Command::ResetWeekly));
    }

    #[test]
    fn sqlite_urls_are_made_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:/tmp/talk.sqlite3".into()),
            "sqlite:///tmp/talk.sqlite3"
        );
        let relative = normalize_sqlite_url("talk.sqlite3".into());
        assert!(relative.starts_with("sqlite:///"));
        assert!(relative.ends_with("/talk.sqlite3"));
    }

    #[test]
    fn prepare_creates_missing_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("db.sqlite3");
        prepare_sqlite_file(&format!("sqlite://{}?mode=rwc", file.display())).unwrap();
        assert!(file.exists());
        assert!(prepare_sqlite_file("postgres://nope").is_err());
    }
}
