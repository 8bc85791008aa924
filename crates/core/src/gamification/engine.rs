use chrono::{DateTime, Utc};

use crate::gamification::badges::{BadgeContext, BadgeId, evaluate_badges};
use crate::gamification::streak::next_streak;
use crate::gamification::xp::xp_for_score;
use crate::model::{FluencyScore, RecentSession, SessionSource, UserProgress};
use crate::time::CalendarZone;

/// The parts of a finished session that drive progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    pub score: FluencyScore,
    pub source: SessionSource,
}

/// What changed when a session was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub xp_gained: u32,
    pub level_before: u32,
    pub level_after: u32,
    pub streak: u32,
    pub new_badges: Vec<BadgeId>,
}

impl ProgressUpdate {
    #[must_use]
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

/// Applies one session to `progress` at instant `now`.
///
/// Badge rules see the stats from before and after the update, so
/// threshold badges are granted exactly on the crossing session.
pub fn apply_session(
    progress: &mut UserProgress,
    outcome: SessionOutcome,
    now: DateTime<Utc>,
    zone: CalendarZone,
) -> ProgressUpdate {
    let previous = progress.stats();
    let level_before = progress.level();
    let today = zone.date_of(now);
    let week_start = CalendarZone::week_start(today);

    let xp_gained = xp_for_score(outcome.score);
    progress.add_xp(xp_gained);

    let streak = next_streak(progress.streak(), progress.last_active(), today);
    progress.set_streak(streak, today);

    progress.record_session(
        RecentSession {
            score: outcome.score,
            date: today,
        },
        outcome.source.is_voice(),
    );
    progress.weekly_stats_mut().record(xp_gained, week_start);

    let ctx = BadgeContext {
        previous,
        current: progress.stats(),
        score: outcome.score,
        voice: outcome.source.is_voice(),
        recent: progress.recent_sessions(),
    };
    let earned: Vec<BadgeId> = evaluate_badges(progress.badges(), &ctx)
        .into_iter()
        .map(|b| b.id)
        .collect();
    for id in &earned {
        progress.award(*id);
    }

    ProgressUpdate {
        xp_gained,
        level_before,
        level_after: progress.level(),
        streak,
        new_badges: earned,
    }
}
