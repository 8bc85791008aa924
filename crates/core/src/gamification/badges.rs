//! Badge catalogue and the single predicate that decides whether a badge
//! is earned by an update.
//!
//! Threshold rules fire on the update where the counter crosses the
//! threshold (`previous < n <= current`), so each badge can be earned once
//! even before the "already held" check.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{FluencyScore, ProgressStats, RecentSessions};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown badge id: {0}")]
pub struct UnknownBadge(String);

/// Stable identifier of a badge, used in storage and API payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BadgeId {
    #[serde(rename = "perfect_score")]
    PerfectScore,
    #[serde(rename = "first_100_xp")]
    First100Xp,
    #[serde(rename = "streak_3")]
    Streak3,
    #[serde(rename = "streak_7")]
    Streak7,
    #[serde(rename = "streak_30")]
    Streak30,
    #[serde(rename = "first_voice")]
    FirstVoice,
    #[serde(rename = "xp_500")]
    Xp500,
    #[serde(rename = "xp_1000")]
    Xp1000,
    #[serde(rename = "high_scorer")]
    HighScorer,
    #[serde(rename = "consistent_learner")]
    ConsistentLearner,
}

impl BadgeId {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerfectScore => "perfect_score",
            Self::First100Xp => "first_100_xp",
            Self::Streak3 => "streak_3",
            Self::Streak7 => "streak_7",
            Self::Streak30 => "streak_30",
            Self::FirstVoice => "first_voice",
            Self::Xp500 => "xp_500",
            Self::Xp1000 => "xp_1000",
            Self::HighScorer => "high_scorer",
            Self::ConsistentLearner => "consistent_learner",
        }
    }

    /// Catalogue entry for this id.
    #[must_use]
    pub fn definition(self) -> &'static BadgeDefinition {
        &BADGES[self.table_index()]
    }

    /// Position of this badge in `BADGES`.
    const fn table_index(self) -> usize {
        match self {
            Self::PerfectScore => 0,
            Self::First100Xp => 1,
            Self::Streak3 => 2,
            Self::Streak7 => 3,
            Self::Streak30 => 4,
            Self::FirstVoice => 5,
            Self::Xp500 => 6,
            Self::Xp1000 => 7,
            Self::HighScorer => 8,
            Self::ConsistentLearner => 9,
        }
    }
}

impl fmt::Display for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BadgeId {
    type Err = UnknownBadge;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BADGES
            .iter()
            .map(|b| b.id)
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownBadge(s.to_string()))
    }
}

/// Kind of condition a badge checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeRule {
    /// The session's score is at least this value.
    ScoreAtLeast(u8),
    /// Total XP crossed the threshold with this update.
    XpCrossed(u32),
    /// Streak crossed the threshold with this update.
    StreakCrossed(u32),
    /// Session count crossed the threshold with this update.
    SessionsCrossed(u32),
    /// First session submitted by voice.
    FirstVoice,
    /// The last `window` recent sessions all scored at least `min_score`.
    HighScoreRun { window: usize, min_score: u8 },
}

/// Everything a rule may look at: stats before and after the update plus
/// the session that caused it.
#[derive(Debug, Clone, Copy)]
pub struct BadgeContext<'a> {
    pub previous: ProgressStats,
    pub current: ProgressStats,
    pub score: FluencyScore,
    pub voice: bool,
    pub recent: &'a RecentSessions,
}

fn crossed(previous: u32, current: u32, threshold: u32) -> bool {
    current >= threshold && previous < threshold
}

impl BadgeRule {
    #[must_use]
    pub fn is_met(self, ctx: &BadgeContext<'_>) -> bool {
        match self {
            Self::ScoreAtLeast(min) => ctx.score.value() >= min,
            Self::XpCrossed(n) => crossed(ctx.previous.total_xp, ctx.current.total_xp, n),
            Self::StreakCrossed(n) => crossed(ctx.previous.streak, ctx.current.streak, n),
            Self::SessionsCrossed(n) => {
                crossed(ctx.previous.total_sessions, ctx.current.total_sessions, n)
            }
            Self::FirstVoice => ctx.voice && !ctx.previous.had_voice_message,
            Self::HighScoreRun { window, min_score } => {
                window > 0 && ctx.recent.high_scores_in_last(window, min_score) >= window
            }
        }
    }
}

/// A catalogue row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeDefinition {
    pub id: BadgeId,
    pub name: &'static str,
    pub description: &'static str,
    pub rule: BadgeRule,
}

pub const BADGES: [BadgeDefinition; 10] = [
    BadgeDefinition {
        id: BadgeId::PerfectScore,
        name: "🧠 10/10 Master",
        description: "Get a perfect fluency score",
        rule: BadgeRule::ScoreAtLeast(10),
    },
    BadgeDefinition {
        id: BadgeId::First100Xp,
        name: "💯 First 100 XP",
        description: "Earn your first 100 XP",
        rule: BadgeRule::XpCrossed(100),
    },
    BadgeDefinition {
        id: BadgeId::Streak3,
        name: "🔥 3-Day Streak",
        description: "Practice 3 days in a row",
        rule: BadgeRule::StreakCrossed(3),
    },
    BadgeDefinition {
        id: BadgeId::Streak7,
        name: "🔥 Week Warrior",
        description: "Practice 7 days in a row",
        rule: BadgeRule::StreakCrossed(7),
    },
    BadgeDefinition {
        id: BadgeId::Streak30,
        name: "🔥 Month Master",
        description: "Practice 30 days in a row",
        rule: BadgeRule::StreakCrossed(30),
    },
    BadgeDefinition {
        id: BadgeId::FirstVoice,
        name: "🗣️ First Voice Message",
        description: "Complete your first voice session",
        rule: BadgeRule::FirstVoice,
    },
    BadgeDefinition {
        id: BadgeId::Xp500,
        name: "⭐ 500 XP Master",
        description: "Earn 500 total XP",
        rule: BadgeRule::XpCrossed(500),
    },
    BadgeDefinition {
        id: BadgeId::Xp1000,
        name: "🌟 1000 XP Legend",
        description: "Earn 1000 total XP",
        rule: BadgeRule::XpCrossed(1000),
    },
    BadgeDefinition {
        id: BadgeId::HighScorer,
        name: "🎯 High Scorer",
        description: "Score 8+ on 5 consecutive messages",
        rule: BadgeRule::HighScoreRun {
            window: 5,
            min_score: 8,
        },
    },
    BadgeDefinition {
        id: BadgeId::ConsistentLearner,
        name: "📚 Consistent Learner",
        description: "Complete 50 practice sessions",
        rule: BadgeRule::SessionsCrossed(50),
    },
];

/// Badges not in `held` whose rule is met, in catalogue order.
#[must_use]
pub fn evaluate_badges(held: &[BadgeId], ctx: &BadgeContext<'_>) -> Vec<&'static BadgeDefinition> {
    BADGES
        .iter()
        .filter(|badge| !held.contains(&badge.id))
        .filter(|badge| badge.rule.is_met(ctx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecentSession;
    use chrono::NaiveDate;

    #[test]
    fn every_id_resolves_to_its_own_row() {
        for (index, row) in BADGES.iter().enumerate() {
            assert_eq!(row.id.table_index(), index);
            assert_eq!(row.id.definition().id, row.id);
        }
    }

    fn stats(total_xp: u32, streak: u32, total_sessions: u32, voice: bool) -> ProgressStats {
        ProgressStats {
            total_xp,
            streak,
            total_sessions,
            had_voice_message: voice,
        }
    }

    fn ctx<'a>(
        previous: ProgressStats,
        current: ProgressStats,
        score: i64,
        recent: &'a RecentSessions,
    ) -> BadgeContext<'a> {
        BadgeContext {
            previous,
            current,
            score: FluencyScore::new(score).unwrap(),
            voice: current.had_voice_message && !previous.had_voice_message,
            recent,
        }
    }

    fn ids(defs: &[&BadgeDefinition]) -> Vec<BadgeId> {
        defs.iter().map(|d| d.id).collect()
    }

    #[test]
    fn ids_round_trip_through_strings() {
        for badge in &BADGES {
            assert_eq!(badge.id.as_str().parse::<BadgeId>().unwrap(), badge.id);
            assert_eq!(badge.id.definition().name, badge.name);
            let json = serde_json::to_string(&badge.id).unwrap();
            assert_eq!(json, format!("\"{}\"", badge.id.as_str()));
        }
        assert!("gold_star".parse::<BadgeId>().is_err());
    }

    #[test]
    fn xp_badge_fires_only_on_crossing() {
        let recent = RecentSessions::new();
        let crossing = ctx(stats(95, 1, 9, false), stats(105, 1, 10, false), 7, &recent);
        assert_eq!(ids(&evaluate_badges(&[], &crossing)), [BadgeId::First100Xp]);

        let after = ctx(stats(105, 1, 10, false), stats(115, 1, 11, false), 7, &recent);
        assert!(evaluate_badges(&[], &after).is_empty());
    }

    #[test]
    fn held_badges_are_skipped() {
        let recent = RecentSessions::new();
        let c = ctx(stats(90, 2, 4, false), stats(105, 3, 5, false), 10, &recent);
        assert_eq!(
            ids(&evaluate_badges(&[], &c)),
            [BadgeId::PerfectScore, BadgeId::First100Xp, BadgeId::Streak3]
        );
        assert_eq!(
            ids(&evaluate_badges(&[BadgeId::PerfectScore, BadgeId::Streak3], &c)),
            [BadgeId::First100Xp]
        );
    }

    #[test]
    fn single_update_can_cross_several_xp_thresholds() {
        let recent = RecentSessions::new();
        let c = ctx(stats(0, 1, 0, false), stats(1_000, 1, 1, false), 5, &recent);
        assert_eq!(
            ids(&evaluate_badges(&[], &c)),
            [BadgeId::First100Xp, BadgeId::Xp500, BadgeId::Xp1000]
        );
    }

    #[test]
    fn first_voice_needs_voice_and_no_prior_voice() {
        let recent = RecentSessions::new();
        let c = ctx(stats(0, 0, 0, false), stats(7, 1, 1, true), 6, &recent);
        assert_eq!(ids(&evaluate_badges(&[], &c)), [BadgeId::FirstVoice]);

        let again = ctx(stats(7, 1, 1, true), stats(14, 1, 2, true), 6, &recent);
        assert!(evaluate_badges(&[], &again).is_empty());
    }

    #[test]
    fn high_scorer_needs_five_strong_sessions() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut recent = RecentSessions::new();
        for s in [8, 9, 8, 10] {
            recent.push(RecentSession {
                score: FluencyScore::new(s).unwrap(),
                date,
            });
        }
        let rule = BadgeRule::HighScoreRun {
            window: 5,
            min_score: 8,
        };
        let c = ctx(stats(0, 1, 4, false), stats(0, 1, 4, false), 8, &recent);
        assert!(!rule.is_met(&c));

        recent.push(RecentSession {
            score: FluencyScore::new(8).unwrap(),
            date,
        });
        let c = ctx(stats(0, 1, 4, false), stats(0, 1, 5, false), 8, &recent);
        assert!(rule.is_met(&c));
    }

    #[test]
    fn consistent_learner_at_fifty_sessions() {
        let recent = RecentSessions::new();
        let c = ctx(stats(300, 1, 49, false), stats(303, 1, 50, false), 2, &recent);
        assert_eq!(ids(&evaluate_badges(&[], &c)), [BadgeId::ConsistentLearner]);
    }
}
