use std::collections::VecDeque;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gamification::badges::BadgeId;
use crate::gamification::xp::{level_for_xp, xp_to_next_level};
use crate::model::{FluencyScore, UserKey};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("too many recent sessions: {len} (max {max})")]
    TooManyRecentSessions { len: usize, max: usize },

    #[error("badge {0} is listed more than once")]
    DuplicateBadge(BadgeId),
}

//
// ─── RECENT SESSIONS ──────────────────────────────────────────────────────────
//

/// Score and calendar day of one recent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentSession {
    pub score: FluencyScore,
    pub date: NaiveDate,
}

/// The most recent sessions, oldest first, never more than `CAPACITY`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentSessions {
    entries: VecDeque<RecentSession>,
}

impl RecentSessions {
    pub const CAPACITY: usize = 10;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted list (oldest first).
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::TooManyRecentSessions` if the list exceeds capacity.
    pub fn from_persisted(entries: Vec<RecentSession>) -> Result<Self, ProgressError> {
        if entries.len() > Self::CAPACITY {
            return Err(ProgressError::TooManyRecentSessions {
                len: entries.len(),
                max: Self::CAPACITY,
            });
        }
        Ok(Self {
            entries: entries.into(),
        })
    }

    /// Appends an entry, evicting the oldest one when full.
    pub fn push(&mut self, entry: RecentSession) {
        if self.entries.len() == Self::CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecentSession> {
        self.entries.iter()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&RecentSession> {
        self.entries.back()
    }

    /// Counts scores `>= min_score` among the last `window` entries.
    ///
    /// Returns 0 until at least `window` entries exist.
    #[must_use]
    pub fn high_scores_in_last(&self, window: usize, min_score: u8) -> usize {
        if window == 0 || self.entries.len() < window {
            return 0;
        }
        self.entries
            .iter()
            .skip(self.entries.len() - window)
            .filter(|e| e.score.value() >= min_score)
            .count()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<RecentSession> {
        self.entries.iter().copied().collect()
    }
}

//
// ─── WEEKLY STATS ─────────────────────────────────────────────────────────────
//

/// Running totals for the calendar week starting on `week_start` (a Monday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStats {
    pub current_week_xp: u32,
    pub current_week_sessions: u32,
    #[serde(rename = "weekStartDate")]
    pub week_start: NaiveDate,
}

impl WeeklyStats {
    #[must_use]
    pub fn empty(week_start: NaiveDate) -> Self {
        Self {
            current_week_xp: 0,
            current_week_sessions: 0,
            week_start,
        }
    }

    /// These totals if they belong to `week_start`, otherwise a zeroed week.
    #[must_use]
    pub fn for_week(self, week_start: NaiveDate) -> Self {
        if self.week_start == week_start {
            self
        } else {
            Self::empty(week_start)
        }
    }

    /// Adds one session worth `xp` to the week starting on `week_start`.
    pub fn record(&mut self, xp: u32, week_start: NaiveDate) {
        *self = self.for_week(week_start);
        self.current_week_xp = self.current_week_xp.saturating_add(xp);
        self.current_week_sessions = self.current_week_sessions.saturating_add(1);
    }
}

//
// ─── USER PROGRESS ────────────────────────────────────────────────────────────
//

/// Counters compared before/after an update to detect threshold crossings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressStats {
    pub total_xp: u32,
    pub streak: u32,
    pub total_sessions: u32,
    pub had_voice_message: bool,
}

/// Persisted fields of a `UserProgress`, used to rehydrate from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressParts {
    pub user: UserKey,
    pub total_xp: u32,
    pub streak: u32,
    pub last_active: Option<NaiveDate>,
    pub badges: Vec<BadgeId>,
    pub total_sessions: u32,
    pub had_voice_message: bool,
    pub recent_sessions: Vec<RecentSession>,
    pub weekly_stats: WeeklyStats,
}

/// Gamification state of one user. Level is always derived from XP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProgress {
    user: UserKey,
    total_xp: u32,
    streak: u32,
    last_active: Option<NaiveDate>,
    badges: Vec<BadgeId>,
    total_sessions: u32,
    had_voice_message: bool,
    recent_sessions: RecentSessions,
    weekly_stats: WeeklyStats,
}

impl UserProgress {
    /// Fresh progress for a user seen for the first time.
    #[must_use]
    pub fn new(user: UserKey, week_start: NaiveDate) -> Self {
        Self {
            user,
            total_xp: 0,
            streak: 0,
            last_active: None,
            badges: Vec::new(),
            total_sessions: 0,
            had_voice_message: false,
            recent_sessions: RecentSessions::new(),
            weekly_stats: WeeklyStats::empty(week_start),
        }
    }

    /// Rehydrate progress from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if recent sessions exceed capacity or badges repeat.
    pub fn from_persisted(parts: ProgressParts) -> Result<Self, ProgressError> {
        let mut badges: Vec<BadgeId> = Vec::with_capacity(parts.badges.len());
        for badge in parts.badges {
            if badges.contains(&badge) {
                return Err(ProgressError::DuplicateBadge(badge));
            }
            badges.push(badge);
        }

        Ok(Self {
            user: parts.user,
            total_xp: parts.total_xp,
            streak: parts.streak,
            last_active: parts.last_active,
            badges,
            total_sessions: parts.total_sessions,
            had_voice_message: parts.had_voice_message,
            recent_sessions: RecentSessions::from_persisted(parts.recent_sessions)?,
            weekly_stats: parts.weekly_stats,
        })
    }

    #[must_use]
    pub fn user(&self) -> &UserKey {
        &self.user
    }

    #[must_use]
    pub fn total_xp(&self) -> u32 {
        self.total_xp
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        level_for_xp(self.total_xp)
    }

    #[must_use]
    pub fn xp_to_next_level(&self) -> u32 {
        xp_to_next_level(self.total_xp)
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[must_use]
    pub fn last_active(&self) -> Option<NaiveDate> {
        self.last_active
    }

    /// Badges in the order they were earned.
    #[must_use]
    pub fn badges(&self) -> &[BadgeId] {
        &self.badges
    }

    #[must_use]
    pub fn has_badge(&self, id: BadgeId) -> bool {
        self.badges.contains(&id)
    }

    #[must_use]
    pub fn total_sessions(&self) -> u32 {
        self.total_sessions
    }

    #[must_use]
    pub fn had_voice_message(&self) -> bool {
        self.had_voice_message
    }

    #[must_use]
    pub fn recent_sessions(&self) -> &RecentSessions {
        &self.recent_sessions
    }

    #[must_use]
    pub fn weekly_stats(&self) -> WeeklyStats {
        self.weekly_stats
    }

    #[must_use]
    pub fn stats(&self) -> ProgressStats {
        ProgressStats {
            total_xp: self.total_xp,
            streak: self.streak,
            total_sessions: self.total_sessions,
            had_voice_message: self.had_voice_message,
        }
    }

    /// Records a badge. Returns `false` if it was already held.
    pub fn award(&mut self, id: BadgeId) -> bool {
        if self.has_badge(id) {
            return false;
        }
        self.badges.push(id);
        true
    }

    /// Zeroes the weekly counters if they belong to another week.
    ///
    /// Returns `true` when the stats changed.
    pub fn roll_week(&mut self, week_start: NaiveDate) -> bool {
        let rolled = self.weekly_stats.for_week(week_start);
        let changed = rolled != self.weekly_stats;
        self.weekly_stats = rolled;
        changed
    }

    pub(crate) fn add_xp(&mut self, xp: u32) {
        self.total_xp = self.total_xp.saturating_add(xp);
    }

    /// Records `streak` as of `today`. A later stored last-active date is
    /// kept, so a back-dated session never moves it backwards.
    pub(crate) fn set_streak(&mut self, streak: u32, today: NaiveDate) {
        self.streak = streak;
        self.last_active = Some(self.last_active.map_or(today, |last| last.max(today)));
    }

    pub(crate) fn record_session(&mut self, entry: RecentSession, voice: bool) {
        self.total_sessions = self.total_sessions.saturating_add(1);
        self.had_voice_message |= voice;
        self.recent_sessions.push(entry);
    }

    pub(crate) fn weekly_stats_mut(&mut self) -> &mut WeeklyStats {
        &mut self.weekly_stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn entry(score: i64, d: u32) -> RecentSession {
        RecentSession {
            score: FluencyScore::new(score).unwrap(),
            date: day(d),
        }
    }

    #[test]
    fn recent_sessions_cap_at_ten() {
        let mut recent = RecentSessions::new();
        for d in 1..=10 {
            recent.push(entry(5, d));
        }
        assert_eq!(recent.len(), 10);

        recent.push(entry(9, 11));
        assert_eq!(recent.len(), 10);
        assert_eq!(recent.iter().next().unwrap().date, day(2));
        assert_eq!(recent.latest().unwrap(), &entry(9, 11));
    }

    #[test]
    fn from_persisted_rejects_oversized_history() {
        let entries: Vec<_> = (1..=11).map(|d| entry(6, d)).collect();
        assert!(matches!(
            RecentSessions::from_persisted(entries),
            Err(ProgressError::TooManyRecentSessions { len: 11, max: 10 })
        ));
    }

    #[test]
    fn high_scores_need_full_window() {
        let mut recent = RecentSessions::new();
        for d in 1..=4 {
            recent.push(entry(9, d));
        }
        assert_eq!(recent.high_scores_in_last(5, 8), 0);
        recent.push(entry(8, 5));
        assert_eq!(recent.high_scores_in_last(5, 8), 5);
        recent.push(entry(3, 6));
        assert_eq!(recent.high_scores_in_last(5, 8), 4);
    }

    #[test]
    fn weekly_stats_reset_on_new_week() {
        let mut stats = WeeklyStats::empty(day(4));
        stats.record(10, day(4));
        stats.record(7, day(4));
        assert_eq!(stats.current_week_xp, 17);
        assert_eq!(stats.current_week_sessions, 2);

        stats.record(3, day(11));
        assert_eq!(stats, WeeklyStats {
            current_week_xp: 3,
            current_week_sessions: 1,
            week_start: day(11),
        });
    }

    #[test]
    fn award_is_idempotent() {
        let mut p = UserProgress::new(UserKey::anonymous(), day(4));
        assert!(p.award(BadgeId::PerfectScore));
        assert!(!p.award(BadgeId::PerfectScore));
        assert_eq!(p.badges(), &[BadgeId::PerfectScore]);
    }

    #[test]
    fn from_persisted_rejects_duplicate_badges() {
        let parts = ProgressParts {
            user: UserKey::anonymous(),
            total_xp: 250,
            streak: 2,
            last_active: Some(day(5)),
            badges: vec![BadgeId::First100Xp, BadgeId::First100Xp],
            total_sessions: 20,
            had_voice_message: false,
            recent_sessions: vec![],
            weekly_stats: WeeklyStats::empty(day(4)),
        };
        assert_eq!(
            UserProgress::from_persisted(parts).unwrap_err(),
            ProgressError::DuplicateBadge(BadgeId::First100Xp)
        );
    }

    #[test]
    fn level_tracks_xp() {
        let mut p = UserProgress::new(UserKey::anonymous(), day(4));
        assert_eq!(p.level(), 1);
        p.add_xp(199);
        assert_eq!(p.level(), 2);
        assert_eq!(p.xp_to_next_level(), 1);
    }
}
