#![forbid(unsafe_code)]

pub mod app_services;
pub mod chat_service;
pub mod coach;
pub mod config;
pub mod error;
pub mod progress_service;

pub use talk_core::Clock;

pub use app_services::AppServices;
pub use chat_service::{ChatService, ChatTurn};
pub use coach::{CoachConfig, CoachService, FluencyAnalysis, FluencyAnalyzer, HeuristicAnalyzer};
pub use config::AppConfig;
pub use error::{AppServicesError, ChatError, CoachError, ConfigError, ProgressServiceError};
pub use progress_service::{
    BadgeStatus, BadgeView, LeaderboardEntry, ProgressReport, ProgressService,
    ProgressUpdateReport,
};
