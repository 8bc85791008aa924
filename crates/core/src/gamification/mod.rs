//! Rules that turn coached sessions into XP, levels, streaks, badges and
//! weekly summaries. Everything here is pure and synchronous.

pub mod badges;
pub mod engine;
pub mod streak;
pub mod weekly;
pub mod xp;

pub use badges::{BADGES, BadgeContext, BadgeDefinition, BadgeId, BadgeRule, evaluate_badges};
pub use engine::{ProgressUpdate, SessionOutcome, apply_session};
pub use streak::{StreakChange, next_streak, streak_change};
pub use weekly::{ImprovementTrend, WeeklySummary, summarize_week};
pub use xp::{XP_PER_LEVEL, level_for_xp, xp_for_score, xp_to_next_level};
