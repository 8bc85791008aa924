use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

use crate::model::Session;
use crate::time::CalendarZone;

/// Length of the rolling summary window.
pub const WINDOW_DAYS: i64 = 7;
/// Active days per week considered a full practice week.
pub const WEEKLY_ACTIVE_DAY_GOAL: u32 = 5;
/// Minimum sessions before a trend is computed.
const TREND_MIN_SESSIONS: usize = 3;
/// Half-to-half change in average score that counts as a trend.
const TREND_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImprovementTrend {
    Improving,
    Stable,
    NeedsAttention,
    NoData,
}

impl ImprovementTrend {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Improving => "Improving",
            Self::Stable => "Stable",
            Self::NeedsAttention => "Needs attention",
            Self::NoData => "No data available",
        }
    }
}

impl fmt::Display for ImprovementTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ImprovementTrend {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Seven-day rolling aggregate of a user's sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub average_score: f64,
    pub active_days: u32,
    pub total_sessions: u32,
    pub improvement_trend: ImprovementTrend,
    pub weekly_goal: String,
}

impl WeeklySummary {
    #[must_use]
    pub fn no_data() -> Self {
        Self {
            average_score: 0.0,
            active_days: 0,
            total_sessions: 0,
            improvement_trend: ImprovementTrend::NoData,
            weekly_goal: "Practice daily for better progress!".to_string(),
        }
    }
}

/// Start of the rolling window ending at `now`.
#[must_use]
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(WINDOW_DAYS)
}

/// Summarizes sessions created within the last seven days before `now`.
///
/// Sessions outside the window are ignored and order of input does not
/// matter; an empty window yields `WeeklySummary::no_data()`.
#[must_use]
pub fn summarize_week(sessions: &[Session], now: DateTime<Utc>, zone: CalendarZone) -> WeeklySummary {
    let from = window_start(now);
    let mut in_window: Vec<&Session> = sessions
        .iter()
        .filter(|s| s.created_at() >= from)
        .collect();
    if in_window.is_empty() {
        return WeeklySummary::no_data();
    }
    in_window.sort_by_key(|s| s.created_at());

    let scores: Vec<f64> = in_window
        .iter()
        .map(|s| f64::from(s.score().value()))
        .collect();
    let days: BTreeSet<_> = in_window
        .iter()
        .map(|s| zone.date_of(s.created_at()))
        .collect();
    let active_days = u32::try_from(days.len()).unwrap_or(u32::MAX);

    WeeklySummary {
        average_score: round_one_decimal(mean(&scores)),
        active_days,
        total_sessions: u32::try_from(scores.len()).unwrap_or(u32::MAX),
        improvement_trend: trend(&scores),
        weekly_goal: weekly_goal(active_days),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

fn round_one_decimal(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Compares the mean of the first and second halves (by position).
fn trend(scores: &[f64]) -> ImprovementTrend {
    if scores.len() < TREND_MIN_SESSIONS {
        return ImprovementTrend::Stable;
    }
    let (first, second) = scores.split_at(scores.len() / 2);
    let delta = mean(second) - mean(first);
    if delta > TREND_THRESHOLD {
        ImprovementTrend::Improving
    } else if delta < -TREND_THRESHOLD {
        ImprovementTrend::NeedsAttention
    } else {
        ImprovementTrend::Stable
    }
}

fn weekly_goal(active_days: u32) -> String {
    if active_days >= WEEKLY_ACTIVE_DAY_GOAL {
        "Great consistency! Keep it up!".to_string()
    } else {
        let missing = WEEKLY_ACTIVE_DAY_GOAL.saturating_sub(active_days).max(1);
        format!("Try to practice {missing} more days this week.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FluencyScore, NewSession, SessionId, SessionSource, UserKey};
    use crate::time::fixed_now;

    fn session(score: i64, at: DateTime<Utc>) -> Session {
        Session::new(
            SessionId::generate(),
            NewSession {
                user: UserKey::anonymous(),
                transcript: "Hello there.".into(),
                corrected: "Hello there.".into(),
                score: FluencyScore::new(score).unwrap(),
                reply: "Hi!".into(),
                feedback: String::new(),
                corrections: vec![],
                source: SessionSource::Text,
            },
            at,
        )
        .unwrap()
    }

    #[test]
    fn empty_input_is_no_data() {
        let summary = summarize_week(&[], fixed_now(), CalendarZone::utc());
        assert_eq!(summary.total_sessions, 0);
        assert!(summary.average_score.abs() < f64::EPSILON);
        assert_eq!(summary.improvement_trend, ImprovementTrend::NoData);
        assert_eq!(summary.improvement_trend.label(), "No data available");
        assert_eq!(summary.weekly_goal, "Practice daily for better progress!");
    }

    #[test]
    fn same_day_scores_average_to_seven() {
        let now = fixed_now();
        let sessions: Vec<_> = [5, 7, 8, 6, 9]
            .iter()
            .enumerate()
            .map(|(i, s)| session(*s, now - Duration::minutes(50 - i as i64 * 10)))
            .collect();
        let summary = summarize_week(&sessions, now, CalendarZone::utc());
        assert!((summary.average_score - 7.0).abs() < f64::EPSILON);
        assert_eq!(summary.total_sessions, 5);
        assert_eq!(summary.active_days, 1);
        // first half [5, 7] = 6.0, second half [8, 6, 9] = 7.67
        assert_eq!(summary.improvement_trend, ImprovementTrend::Improving);
        assert_eq!(summary.weekly_goal, "Try to practice 4 more days this week.");
    }

    #[test]
    fn ignores_sessions_older_than_a_week() {
        let now = fixed_now();
        let sessions = vec![
            session(2, now - Duration::days(8)),
            session(6, now - Duration::days(2)),
            session(8, now - Duration::days(1)),
        ];
        let summary = summarize_week(&sessions, now, CalendarZone::utc());
        assert_eq!(summary.total_sessions, 2);
        assert!((summary.average_score - 7.0).abs() < f64::EPSILON);
        assert_eq!(summary.active_days, 2);
        assert_eq!(summary.improvement_trend, ImprovementTrend::Stable);
    }

    #[test]
    fn trend_uses_chronological_order() {
        let now = fixed_now();
        // Supplied newest first; declining scores over time.
        let sessions = vec![
            session(3, now - Duration::hours(1)),
            session(4, now - Duration::hours(2)),
            session(9, now - Duration::hours(3)),
            session(9, now - Duration::hours(4)),
        ];
        let summary = summarize_week(&sessions, now, CalendarZone::utc());
        assert_eq!(summary.improvement_trend, ImprovementTrend::NeedsAttention);
        assert_eq!(summary.improvement_trend.to_string(), "Needs attention");
    }

    #[test]
    fn full_week_goal_and_rounding() {
        let now = fixed_now();
        let sessions: Vec<_> = (0..6)
            .map(|d| session(if d == 0 { 8 } else { 7 }, now - Duration::days(d)))
            .collect();
        let summary = summarize_week(&sessions, now, CalendarZone::utc());
        assert_eq!(summary.active_days, 6);
        // mean of 8, 7, 7, 7, 7, 7 is 7.1666..
        assert!((summary.average_score - 7.2).abs() < 1e-9);
        assert_eq!(summary.weekly_goal, "Great consistency! Keep it up!");
    }

    #[test]
    fn active_days_follow_zone() {
        // 23:30 and 00:30 UTC are the same day at UTC-02:00.
        let midnight = fixed_now().date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
        let sessions = vec![
            session(6, midnight - Duration::minutes(30)),
            session(6, midnight + Duration::minutes(30)),
        ];
        let now = midnight + Duration::hours(1);
        assert_eq!(summarize_week(&sessions, now, CalendarZone::utc()).active_days, 2);
        let zone = CalendarZone::from_offset_minutes(-120).unwrap();
        assert_eq!(summarize_week(&sessions, now, zone).active_days, 1);
    }

    #[test]
    fn serializes_with_labels() {
        let json = serde_json::to_value(WeeklySummary::no_data()).unwrap();
        assert_eq!(json["improvementTrend"], "No data available");
        assert_eq!(json["totalSessions"], 0);
    }
}
