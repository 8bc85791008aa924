use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use talk_core::gamification::{BADGES, BadgeId, ProgressUpdate, SessionOutcome, apply_session};
use talk_core::model::{LeaderboardOrder, RecentSession, UserKey, UserProgress, WeeklyStats};
use talk_core::{CalendarZone, Clock};
use talk_storage::ProgressRepository;

use crate::error::ProgressServiceError;

pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous learner";

//
// ─── REPORTS ───────────────────────────────────────────────────────────────────
//

/// A badge as shown to learners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeView {
    pub id: BadgeId,
    pub name: &'static str,
    pub description: &'static str,
}

impl From<BadgeId> for BadgeView {
    fn from(id: BadgeId) -> Self {
        let definition = id.definition();
        Self {
            id,
            name: definition.name,
            description: definition.description,
        }
    }
}

/// One row of the badge catalog for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeStatus {
    #[serde(flatten)]
    pub badge: BadgeView,
    pub earned: bool,
}

/// Gamification changes caused by one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateReport {
    pub xp_gained: u32,
    #[serde(rename = "totalXP")]
    pub total_xp: u32,
    pub level: u32,
    pub level_up: bool,
    pub streak: u32,
    pub new_badges: Vec<BadgeView>,
}

impl ProgressUpdateReport {
    fn new(update: &ProgressUpdate, progress: &UserProgress) -> Self {
        Self {
            xp_gained: update.xp_gained,
            total_xp: progress.total_xp(),
            level: update.level_after,
            level_up: update.leveled_up(),
            streak: update.streak,
            new_badges: update.new_badges.iter().copied().map(BadgeView::from).collect(),
        }
    }
}

/// Snapshot of a user's progress for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub user: UserKey,
    #[serde(rename = "totalXP")]
    pub total_xp: u32,
    pub level: u32,
    pub xp_to_next_level: u32,
    pub streak: u32,
    pub last_active: Option<NaiveDate>,
    pub badges: Vec<BadgeView>,
    pub total_sessions: u32,
    pub had_voice_message: bool,
    pub recent_sessions: Vec<RecentSession>,
    pub weekly_stats: WeeklyStats,
}

impl ProgressReport {
    fn from_progress(progress: &UserProgress) -> Self {
        Self {
            user: progress.user().clone(),
            total_xp: progress.total_xp(),
            level: progress.level(),
            xp_to_next_level: progress.xp_to_next_level(),
            streak: progress.streak(),
            last_active: progress.last_active(),
            badges: progress.badges().iter().copied().map(BadgeView::from).collect(),
            total_sessions: progress.total_sessions(),
            had_voice_message: progress.had_voice_message(),
            recent_sessions: progress.recent_sessions().to_vec(),
            weekly_stats: progress.weekly_stats(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user: String,
    #[serde(rename = "totalXP")]
    pub total_xp: u32,
    pub level: u32,
    pub streak: u32,
    pub current_week_xp: u32,
    pub badge_count: usize,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Applies sessions to stored progress and answers progress queries.
///
/// Updates for the same user key are serialized through a per-user async
/// lock, so concurrent sessions in one process never lose an update.
pub struct ProgressService {
    clock: Clock,
    zone: CalendarZone,
    progress: Arc<dyn ProgressRepository>,
    locks: Mutex<HashMap<UserKey, Arc<Mutex<()>>>>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, zone: CalendarZone, progress: Arc<dyn ProgressRepository>) -> Self {
        Self {
            clock,
            zone,
            progress,
            locks: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn zone(&self) -> CalendarZone {
        self.zone
    }

    async fn user_lock(&self, user: &UserKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(user.clone()).or_default())
    }

    /// Drops the map entry for `user` once no other task holds or awaits it.
    async fn release_user_lock(&self, user: &UserKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // Clones are only handed out under the map lock, so the count is stable here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(user);
        }
    }

    fn current_week(&self) -> NaiveDate {
        CalendarZone::week_start(self.clock.today(self.zone))
    }

    async fn load(&self, user: &UserKey) -> Result<Option<UserProgress>, ProgressServiceError> {
        let mut progress = self.progress.get_progress(user).await?;
        if let Some(p) = progress.as_mut() {
            p.roll_week(self.current_week());
        }
        Ok(progress)
    }

    /// Apply a session that happened at `at` to the user's progress.
    ///
    /// Creates the progress record on the user's first session.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if loading or saving fails;
    /// nothing is saved in that case.
    pub async fn record_session(
        &self,
        user: &UserKey,
        outcome: SessionOutcome,
        at: DateTime<Utc>,
    ) -> Result<ProgressUpdateReport, ProgressServiceError> {
        let lock = self.user_lock(user).await;
        let result = {
            let _guard = lock.lock().await;
            self.apply_locked(user, outcome, at).await
        };
        self.release_user_lock(user, lock).await;
        result
    }

    async fn apply_locked(
        &self,
        user: &UserKey,
        outcome: SessionOutcome,
        at: DateTime<Utc>,
    ) -> Result<ProgressUpdateReport, ProgressServiceError> {
        let mut progress = self
            .progress
            .get_progress(user)
            .await?
            .unwrap_or_else(|| UserProgress::new(user.clone(), self.zone.week_start_of(at)));

        let update = apply_session(&mut progress, outcome, at, self.zone);
        self.progress.save_progress(&progress).await?;

        tracing::debug!(
            user = %user,
            xp = update.xp_gained,
            total_xp = progress.total_xp(),
            streak = update.streak,
            "progress saved"
        );
        if update.leveled_up() {
            tracing::info!(user = %user, level = update.level_after, "level up");
        }
        for badge in &update.new_badges {
            tracing::info!(user = %user, badge = badge.as_str(), "badge earned");
        }

        Ok(ProgressUpdateReport::new(&update, &progress))
    }

    /// Progress of `user`, or a fresh level 1 report for unknown users.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn progress_report(&self, user: &UserKey) -> Result<ProgressReport, ProgressServiceError> {
        let progress = self
            .load(user)
            .await?
            .unwrap_or_else(|| UserProgress::new(user.clone(), self.current_week()));
        Ok(ProgressReport::from_progress(&progress))
    }

    /// This week's XP and session count; zeroed when the user has none.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn weekly_progress(&self, user: &UserKey) -> Result<WeeklyStats, ProgressServiceError> {
        Ok(self
            .load(user)
            .await?
            .map_or_else(|| WeeklyStats::empty(self.current_week()), |p| p.weekly_stats()))
    }

    /// Every badge with whether `user` holds it, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn badge_catalog(&self, user: &UserKey) -> Result<Vec<BadgeStatus>, ProgressServiceError> {
        let progress = self.progress.get_progress(user).await?;
        Ok(BADGES
            .iter()
            .map(|definition| BadgeStatus {
                badge: BadgeView::from(definition.id),
                earned: progress.as_ref().is_some_and(|p| p.has_badge(definition.id)),
            })
            .collect())
    }

    /// Top users by `order`, ranked from 1.
    ///
    /// Weekly ordering only counts XP earned in the current week.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn leaderboard(
        &self,
        order: LeaderboardOrder,
        limit: Option<u32>,
    ) -> Result<Vec<LeaderboardEntry>, ProgressServiceError> {
        let limit = limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let week = self.current_week();
        let rows = if order == LeaderboardOrder::Weekly {
            // Stored weekly totals may belong to an earlier week.
            let mut all = self.progress.leaderboard(order, u32::MAX).await?;
            for row in &mut all {
                row.roll_week(week);
            }
            order.rank(&mut all, usize::try_from(limit).unwrap_or(usize::MAX));
            all
        } else {
            self.progress.leaderboard(order, limit).await?
        };

        Ok(rows
            .iter()
            .zip(1u32..)
            .map(|(p, rank)| LeaderboardEntry {
                rank,
                user: display_name(p.user()),
                total_xp: p.total_xp(),
                level: p.level(),
                streak: p.streak(),
                current_week_xp: p.weekly_stats().for_week(week).current_week_xp,
                badge_count: p.badges().len(),
            })
            .collect())
    }

    /// Zero weekly counters of every user whose stats belong to an earlier week.
    ///
    /// Returns how many users were reset.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on backend failures.
    pub async fn reset_weekly_stats(&self) -> Result<u64, ProgressServiceError> {
        let week = self.current_week();
        let reset = self.progress.reset_stale_weekly_stats(week).await?;
        tracing::info!(week_start = %week, users = reset, "weekly stats reset");
        Ok(reset)
    }
}

fn display_name(user: &UserKey) -> String {
    if user.is_anonymous() {
        ANONYMOUS_DISPLAY_NAME.to_owned()
    } else {
        user.as_str().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talk_core::model::{FluencyScore, SessionSource};
    use talk_core::time::{fixed_clock, fixed_now};
    use talk_storage::InMemoryRepository;

    fn service() -> ProgressService {
        ProgressService::new(
            fixed_clock(),
            CalendarZone::utc(),
            Arc::new(InMemoryRepository::new()),
        )
    }

    fn outcome(score: i64) -> SessionOutcome {
        SessionOutcome {
            score: FluencyScore::new(score).unwrap(),
            source: SessionSource::Text,
        }
    }

    #[tokio::test]
    async fn unknown_user_gets_defaults() {
        let svc = service();
        let report = svc.progress_report(&UserKey::anonymous()).await.unwrap();
        assert_eq!(report.total_xp, 0);
        assert_eq!(report.level, 1);
        assert_eq!(report.streak, 0);
        assert_eq!(report.xp_to_next_level, 100);
        assert!(report.badges.is_empty());

        let weekly = svc.weekly_progress(&UserKey::anonymous()).await.unwrap();
        assert_eq!(weekly.current_week_xp, 0);
        assert_eq!(weekly.week_start, CalendarZone::utc().week_start_of(fixed_now()));
    }

    #[tokio::test]
    async fn first_perfect_session_awards_badge() {
        let svc = service();
        let user = UserKey::new("pat").unwrap();
        let update = svc.record_session(&user, outcome(10), fixed_now()).await.unwrap();
        assert_eq!(update.xp_gained, 15);
        assert_eq!(update.total_xp, 15);
        assert_eq!(update.streak, 1);
        assert!(!update.level_up);
        assert_eq!(update.new_badges.len(), 1);
        assert_eq!(update.new_badges[0].id, BadgeId::PerfectScore);

        let catalog = svc.badge_catalog(&user).await.unwrap();
        assert_eq!(catalog.len(), BADGES.len());
        assert_eq!(catalog.iter().filter(|b| b.earned).count(), 1);
    }

    #[tokio::test]
    async fn concurrent_sessions_for_one_user_are_not_lost() {
        let svc = Arc::new(service());
        let user = UserKey::new("racer").unwrap();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = Arc::clone(&svc);
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                svc.record_session(&user, outcome(7), fixed_now()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let report = svc.progress_report(&user).await.unwrap();
        assert_eq!(report.total_sessions, 8);
        assert_eq!(report.total_xp, 80);
        assert_eq!(report.weekly_stats.current_week_sessions, 8);
        assert!(svc.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn user_locks_are_released_after_each_session() {
        let svc = service();
        for name in ["ann", "bo", "cy"] {
            let user = UserKey::new(name).unwrap();
            svc.record_session(&user, outcome(6), fixed_now()).await.unwrap();
            assert!(svc.locks.lock().await.is_empty());
        }

        let held = svc.user_lock(&UserKey::new("ann").unwrap()).await;
        svc.record_session(&UserKey::new("ann").unwrap(), outcome(6), fixed_now())
            .await
            .unwrap();
        assert_eq!(svc.locks.lock().await.len(), 1);
        svc.release_user_lock(&UserKey::new("ann").unwrap(), held).await;
        assert!(svc.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn leaderboard_ranks_and_hides_anonymous_key() {
        let svc = service();
        svc.record_session(&UserKey::anonymous(), outcome(9), fixed_now())
            .await
            .unwrap();
        svc.record_session(&UserKey::new("zoe").unwrap(), outcome(5), fixed_now())
            .await
            .unwrap();

        let board = svc.leaderboard(LeaderboardOrder::Xp, None).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].user, ANONYMOUS_DISPLAY_NAME);
        assert_eq!(board[1].rank, 2);
        assert_eq!(board[1].user, "zoe");

        assert!(svc.leaderboard(LeaderboardOrder::Xp, Some(0)).await.unwrap().is_empty());
        assert_eq!(svc.leaderboard(LeaderboardOrder::Weekly, Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_weeks_read_as_zero_until_reset() {
        let repo = Arc::new(InMemoryRepository::new());
        let user = UserKey::new("sam").unwrap();
        let earlier = fixed_now() - chrono::Duration::days(7);
        let past = ProgressService::new(Clock::fixed(earlier), CalendarZone::utc(), repo.clone());
        past.record_session(&user, outcome(8), earlier).await.unwrap();

        let now = ProgressService::new(fixed_clock(), CalendarZone::utc(), repo.clone());
        let weekly = now.weekly_progress(&user).await.unwrap();
        assert_eq!(weekly.current_week_xp, 0);
        assert_eq!(now.progress_report(&user).await.unwrap().total_xp, 10);

        assert_eq!(now.reset_weekly_stats().await.unwrap(), 1);
        assert_eq!(now.reset_weekly_stats().await.unwrap(), 0);
    }
}
