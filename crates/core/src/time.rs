use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};

/// Source of the current instant. Services take one so tests can pin time.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn default_clock() -> Self {
        Self::System
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Fixed(at) => *at,
        }
    }

    /// Calendar date of `now()` in `zone`.
    #[must_use]
    pub fn today(&self, zone: CalendarZone) -> NaiveDate {
        zone.date_of(self.now())
    }

    /// Moves a fixed clock forward by `delta`; the system clock is unaffected.
    pub fn advance(&mut self, delta: Duration) {
        if let Self::Fixed(at) = self {
            *at += delta;
        }
    }
}

/// Offset used to turn instants into calendar days.
///
/// Every day-based rule (streaks, active days, week boundaries) goes through
/// one of these, so the result never depends on the host's local zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarZone {
    offset: FixedOffset,
}

impl Default for CalendarZone {
    fn default() -> Self {
        Self::utc()
    }
}

impl CalendarZone {
    /// Largest accepted distance from UTC, in minutes (UTC-14:00 ..= UTC+14:00).
    pub const MAX_OFFSET_MINUTES: i32 = 14 * 60;

    #[must_use]
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Builds a zone `minutes` east of UTC.
    ///
    /// Returns `None` when the offset is outside +/-14 hours.
    #[must_use]
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        if minutes.abs() > Self::MAX_OFFSET_MINUTES {
            return None;
        }
        FixedOffset::east_opt(minutes * 60).map(|offset| Self { offset })
    }

    #[must_use]
    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    /// Calendar date of `at` in this zone.
    #[must_use]
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Monday of the week containing `date`.
    #[must_use]
    pub fn week_start(date: NaiveDate) -> NaiveDate {
        let back = i64::from(date.weekday().num_days_from_monday());
        date - Duration::days(back)
    }

    /// Monday of the current week for the instant `at`.
    #[must_use]
    pub fn week_start_of(&self, at: DateTime<Utc>) -> NaiveDate {
        Self::week_start(self.date_of(at))
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    #[test]
    fn fixed_clock_advances_across_days() {
        let mut clock = fixed_clock();
        let zone = CalendarZone::utc();
        assert_eq!(clock.today(zone), NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), fixed_now() + Duration::hours(2));
        assert_eq!(clock.today(zone), NaiveDate::from_ymd_opt(2023, 11, 15).unwrap());
    }

    #[test]
    fn system_clock_is_not_pinned() {
        let mut clock = Clock::default_clock();
        clock.advance(Duration::days(365));
        assert!(clock.now() < fixed_now() + Duration::days(365 * 100));
        assert!(matches!(clock, Clock::System));
    }

    #[test]
    fn zone_shifts_calendar_date() {
        // 22:13 UTC on Nov 14 is already Nov 15 at UTC+03:00.
        let utc = CalendarZone::utc();
        let plus3 = CalendarZone::from_offset_minutes(180).unwrap();
        assert_eq!(utc.date_of(fixed_now()), NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());
        assert_eq!(plus3.date_of(fixed_now()), NaiveDate::from_ymd_opt(2023, 11, 15).unwrap());
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        assert!(CalendarZone::from_offset_minutes(15 * 60).is_none());
        assert!(CalendarZone::from_offset_minutes(-15 * 60).is_none());
        assert_eq!(
            CalendarZone::from_offset_minutes(-300).unwrap().offset_minutes(),
            -300
        );
    }

    #[test]
    fn week_starts_on_monday() {
        let sunday = NaiveDate::from_ymd_opt(2023, 11, 19).unwrap();
        let monday = CalendarZone::week_start(sunday);
        assert_eq!(monday.weekday(), Weekday::Mon);
        assert_eq!(monday, NaiveDate::from_ymd_opt(2023, 11, 13).unwrap());

        let at = Utc.with_ymd_and_hms(2023, 11, 13, 0, 30, 0).unwrap();
        assert_eq!(CalendarZone::utc().week_start_of(at), monday);
    }
}
