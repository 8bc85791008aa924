use chrono::NaiveDate;

/// How a new active day affects the streak counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// No previous activity: the streak starts at 1.
    Start,
    /// Same calendar day (or a last-active date ahead of `today`): unchanged.
    Hold,
    /// Exactly one day later: +1.
    Extend,
    /// A day or more was skipped: back to 1.
    Reset,
}

/// Classifies `today` relative to the last active day.
///
/// Both arguments are calendar dates already resolved in the user's
/// `CalendarZone`, so time of day never matters here.
#[must_use]
pub fn streak_change(last_active: Option<NaiveDate>, today: NaiveDate) -> StreakChange {
    let Some(last) = last_active else {
        return StreakChange::Start;
    };
    match (today - last).num_days() {
        1 => StreakChange::Extend,
        d if d <= 0 => StreakChange::Hold,
        _ => StreakChange::Reset,
    }
}

/// Streak value after activity on `today`.
#[must_use]
pub fn next_streak(current: u32, last_active: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match streak_change(last_active, today) {
        StreakChange::Start | StreakChange::Reset => 1,
        StreakChange::Hold => current.max(1),
        StreakChange::Extend => current.saturating_add(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[test]
    fn first_day_starts_at_one() {
        assert_eq!(streak_change(None, today()), StreakChange::Start);
        assert_eq!(next_streak(0, None, today()), 1);
    }

    #[test]
    fn yesterday_extends_by_one() {
        let yesterday = today() - Duration::days(1);
        assert_eq!(next_streak(4, Some(yesterday), today()), 5);
    }

    #[test]
    fn same_day_is_unchanged() {
        assert_eq!(next_streak(4, Some(today()), today()), 4);
        // A zero counter on an already-active day still reports the day itself.
        assert_eq!(next_streak(0, Some(today()), today()), 1);
    }

    #[test]
    fn gap_resets() {
        let three_days_ago = today() - Duration::days(3);
        assert_eq!(streak_change(Some(three_days_ago), today()), StreakChange::Reset);
        assert_eq!(next_streak(12, Some(three_days_ago), today()), 1);
        assert_eq!(next_streak(12, Some(today() - Duration::days(2)), today()), 1);
    }

    #[test]
    fn future_last_active_holds() {
        let tomorrow = today() + Duration::days(1);
        assert_eq!(streak_change(Some(tomorrow), today()), StreakChange::Hold);
        assert_eq!(next_streak(3, Some(tomorrow), today()), 3);
    }
}
