use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::UserProgress;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown leaderboard order: {0} (expected xp, level, streak or weekly)")]
pub struct LeaderboardOrderError(String);

/// Ranking used by the leaderboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardOrder {
    #[default]
    Xp,
    Level,
    Streak,
    Weekly,
}

impl LeaderboardOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Xp => "xp",
            Self::Level => "level",
            Self::Streak => "streak",
            Self::Weekly => "weekly",
        }
    }

    /// Total order over progress records, best first.
    ///
    /// Ties fall back to the user key so results are stable across backends.
    #[must_use]
    pub fn compare(self, a: &UserProgress, b: &UserProgress) -> Ordering {
        let primary = match self {
            Self::Xp => b.total_xp().cmp(&a.total_xp()),
            Self::Level => b
                .level()
                .cmp(&a.level())
                .then_with(|| b.total_xp().cmp(&a.total_xp())),
            Self::Streak => b
                .streak()
                .cmp(&a.streak())
                .then_with(|| b.total_xp().cmp(&a.total_xp())),
            Self::Weekly => b
                .weekly_stats()
                .current_week_xp
                .cmp(&a.weekly_stats().current_week_xp),
        };
        primary.then_with(|| a.user().cmp(b.user()))
    }

    /// Sorts `entries` best first and keeps at most `limit`.
    pub fn rank(self, entries: &mut Vec<UserProgress>, limit: usize) {
        entries.sort_by(|a, b| self.compare(a, b));
        entries.truncate(limit);
    }
}

impl fmt::Display for LeaderboardOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaderboardOrder {
    type Err = LeaderboardOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xp" => Ok(Self::Xp),
            "level" => Ok(Self::Level),
            "streak" => Ok(Self::Streak),
            "weekly" => Ok(Self::Weekly),
            other => Err(LeaderboardOrderError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProgressParts, UserKey, WeeklyStats};
    use chrono::NaiveDate;

    fn progress(user: &str, xp: u32, streak: u32, week_xp: u32) -> UserProgress {
        let week = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        UserProgress::from_persisted(ProgressParts {
            user: UserKey::new(user).unwrap(),
            total_xp: xp,
            streak,
            last_active: None,
            badges: vec![],
            total_sessions: 0,
            had_voice_message: false,
            recent_sessions: vec![],
            weekly_stats: WeeklyStats {
                current_week_xp: week_xp,
                current_week_sessions: 1,
                week_start: week,
            },
        })
        .unwrap()
    }

    fn names(entries: &[UserProgress]) -> Vec<&str> {
        entries.iter().map(|p| p.user().as_str()).collect()
    }

    #[test]
    fn ranks_by_each_order() {
        let all = vec![
            progress("ana", 120, 5, 10),
            progress("bo", 340, 1, 40),
            progress("cy", 150, 5, 70),
        ];

        let mut by_xp = all.clone();
        LeaderboardOrder::Xp.rank(&mut by_xp, 10);
        assert_eq!(names(&by_xp), ["bo", "cy", "ana"]);

        let mut by_streak = all.clone();
        LeaderboardOrder::Streak.rank(&mut by_streak, 10);
        assert_eq!(names(&by_streak), ["cy", "ana", "bo"]);

        let mut by_week = all.clone();
        LeaderboardOrder::Weekly.rank(&mut by_week, 2);
        assert_eq!(names(&by_week), ["cy", "bo"]);
    }

    #[test]
    fn level_ties_break_on_xp_then_user() {
        let mut entries = vec![
            progress("zed", 150, 0, 0),
            progress("amy", 150, 0, 0),
            progress("kim", 190, 0, 0),
        ];
        LeaderboardOrder::Level.rank(&mut entries, 10);
        assert_eq!(names(&entries), ["kim", "amy", "zed"]);
    }

    #[test]
    fn parses_names() {
        assert_eq!("Weekly".parse::<LeaderboardOrder>().unwrap(), LeaderboardOrder::Weekly);
        assert!("karma".parse::<LeaderboardOrder>().is_err());
    }
}
