use std::sync::Arc;

use talk_core::Clock;
use talk_storage::Storage;

use crate::chat_service::ChatService;
use crate::coach::{CoachService, FluencyAnalyzer};
use crate::config::AppConfig;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;

/// Assembles app-facing services over the configured storage backend.
#[derive(Clone)]
pub struct AppServices {
    chat: Arc<ChatService>,
    progress: Arc<ProgressService>,
    coach: Arc<CoachService>,
}

impl AppServices {
    /// Open storage and build services from `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the storage backend cannot be opened.
    pub async fn open(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::open(&config.storage).await?;
        let coach = Arc::new(CoachService::new(config.coach.clone()));
        tracing::debug!(
            backend = config.storage.name(),
            coach = coach.enabled(),
            utc_offset_minutes = config.zone.offset_minutes(),
            "services ready"
        );
        Ok(Self::with_storage(storage, config, clock, coach))
    }

    /// Build services over already opened storage.
    #[must_use]
    pub fn with_storage(
        storage: Storage,
        config: &AppConfig,
        clock: Clock,
        coach: Arc<CoachService>,
    ) -> Self {
        let progress = Arc::new(ProgressService::new(
            clock,
            config.zone,
            Arc::clone(&storage.progress),
        ));
        let analyzer: Arc<dyn FluencyAnalyzer> = coach.clone();
        let chat = Arc::new(ChatService::new(
            clock,
            config.zone,
            analyzer,
            Arc::clone(&storage.sessions),
            Arc::clone(&progress),
        ));
        Self {
            chat,
            progress,
            coach,
        }
    }

    #[must_use]
    pub fn chat(&self) -> Arc<ChatService> {
        Arc::clone(&self.chat)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn coach(&self) -> Arc<CoachService> {
        Arc::clone(&self.coach)
    }
}
