//! Recurring blocking schedules and clock-time window evaluation.
//!
//! Two layers live here:
//!
//! - [`TimeWindow`]: a pure `[start, end)` clock-time interval. Supports
//!   overnight wraparound (`start > end` means the window crosses midnight).
//! - [`Schedule`]: a user-defined recurring blocking window (weekday set plus
//!   a clock-time range). Schedules forbid overnight ranges by construction;
//!   only the generic window evaluator wraps. That asymmetry is intentional
//!   and preserved from the product design.
//!
//! Windows are a user-facing concept ("block 09:00-17:00 on weekdays"), so
//! evaluation runs against the *local* wall clock, passed in as a
//! [`NaiveDateTime`]. Callers derive it from the local zone (see
//! [`local_now`]); evaluation itself stays pure so tests can simulate any
//! instant.

use chrono::{Datelike, Duration, Local, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::error::CoreError;

/// A clock time with minute precision (no date, no seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClockTime {
    pub hour: u8,
    pub minute: u8,
}

impl ClockTime {
    /// Construct a clock time, returning `None` for out-of-range values.
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }

    /// Minutes since midnight, `0..=1439`.
    pub fn minutes_from_midnight(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }

    /// Truncate a `NaiveTime` to minute precision.
    pub fn from_naive(t: NaiveTime) -> Self {
        Self {
            hour: t.hour() as u8,
            minute: t.minute() as u8,
        }
    }

    /// Parse `"HH:MM"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.split_once(':')?;
        Self::new(h.parse().ok()?, m.parse().ok()?)
    }

    fn as_naive(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A half-open clock-time interval `[start, end)`.
///
/// `start > end` wraps across midnight: `23:00-06:00` is active from 23:00
/// through 05:59. `start == end` is a zero-width window and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeWindow {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    /// Whether `now` falls inside the window. Start-inclusive, end-exclusive.
    pub fn contains(&self, now: ClockTime) -> bool {
        let (s, e, n) = (
            self.start.minutes_from_midnight(),
            self.end.minutes_from_midnight(),
            now.minutes_from_midnight(),
        );
        if s == e {
            return false; // Zero-width.
        }
        if s < e {
            n >= s && n < e
        } else {
            // Overnight wraparound.
            n >= s || n < e
        }
    }

    /// Whether the window crosses midnight.
    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }
}

/// A recurring, weekday-bound blocking window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub start: ClockTime,
    pub end: ClockTime,
    /// Weekdays on which the schedule applies. Must be non-empty.
    pub days: HashSet<chrono::Weekday>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Strict schedules route their sessions through the commitment policy.
    #[serde(default)]
    pub strict: bool,
    /// App/domain identifiers blocked while the schedule is active.
    #[serde(default)]
    pub blocked_items: BTreeSet<String>,
}

fn default_true() -> bool {
    true
}

impl Schedule {
    pub fn new(name: impl Into<String>, start: ClockTime, end: ClockTime) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            start,
            end,
            days: HashSet::new(),
            enabled: true,
            strict: false,
            blocked_items: BTreeSet::new(),
        }
    }

    /// Validity invariant: non-empty day set and `start < end`.
    ///
    /// Overnight ranges are rejected here even though [`TimeWindow`] supports
    /// them elsewhere; schedules are day-bounded by product decision.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.days.is_empty() {
            return Err(CoreError::InvalidSchedule(
                "schedule has no active days".into(),
            ));
        }
        if self.start >= self.end {
            return Err(CoreError::InvalidSchedule(format!(
                "start ({}) must be before end ({})",
                self.start, self.end
            )));
        }
        Ok(())
    }

    fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    /// Whether the schedule is active at `local_now`, the user's wall-clock
    /// time.
    pub fn is_active_at(&self, local_now: NaiveDateTime) -> bool {
        if !self.enabled {
            return false;
        }
        self.days.contains(&local_now.weekday())
            && self.window().contains(ClockTime::from_naive(local_now.time()))
    }

    /// Start of the next window strictly after `local_now`, scanning at most
    /// 7 days ahead. A window whose start has already passed today does not
    /// count as today's occurrence, even if it is still running.
    pub fn next_occurrence(&self, local_now: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.enabled || self.days.is_empty() {
            return None;
        }
        for offset in 0..=7i64 {
            let day = local_now + Duration::days(offset);
            if !self.days.contains(&day.weekday()) {
                continue;
            }
            let start = day.date().and_time(self.start.as_naive());
            if start > local_now {
                return Some(start);
            }
        }
        None
    }
}

/// First enabled schedule active at `local_now`, if any.
pub fn active_schedule<'a>(
    schedules: &'a [Schedule],
    local_now: NaiveDateTime,
) -> Option<&'a Schedule> {
    schedules.iter().find(|s| s.is_active_at(local_now))
}

/// The current local wall-clock time, for feeding the window evaluators.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Weekday helper used by the CLI: parse `mon,tue,...` into a day set.
pub fn parse_days(spec: &str) -> Option<HashSet<Weekday>> {
    let mut days = HashSet::new();
    for part in spec.split(',') {
        let day = match part.trim().to_ascii_lowercase().as_str() {
            "mon" | "monday" => Weekday::Mon,
            "tue" | "tuesday" => Weekday::Tue,
            "wed" | "wednesday" => Weekday::Wed,
            "thu" | "thursday" => Weekday::Thu,
            "fri" | "friday" => Weekday::Fri,
            "sat" | "saturday" => Weekday::Sat,
            "sun" | "sunday" => Weekday::Sun,
            _ => return None,
        };
        days.insert(day);
    }
    if days.is_empty() {
        None
    } else {
        Some(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ct(h: u8, m: u8) -> ClockTime {
        ClockTime::new(h, m).unwrap()
    }

    fn wall(y: i32, mo: u32, d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    // 2026-08-26 is a Wednesday.
    fn wednesday_at(h: u32, m: u32) -> NaiveDateTime {
        wall(2026, 8, 26, h, m)
    }

    #[test]
    fn overnight_window_boundaries() {
        let w = TimeWindow::new(ct(23, 0), ct(6, 0));
        assert!(!w.contains(ct(22, 59)));
        assert!(w.contains(ct(23, 0)));
        assert!(w.contains(ct(5, 59)));
        assert!(!w.contains(ct(6, 0)));
    }

    #[test]
    fn daytime_window_boundaries() {
        let w = TimeWindow::new(ct(9, 0), ct(17, 0));
        assert!(w.contains(ct(9, 0)));
        assert!(w.contains(ct(16, 59)));
        assert!(!w.contains(ct(17, 0)));
        assert!(!w.contains(ct(8, 59)));
    }

    #[test]
    fn zero_width_window_matches_nothing() {
        let w = TimeWindow::new(ct(9, 0), ct(9, 0));
        assert!(!w.contains(ct(9, 0)));
        assert!(!w.contains(ct(12, 0)));
    }

    #[test]
    fn midnight_is_start_inclusive_end_exclusive() {
        let w = TimeWindow::new(ct(0, 0), ct(1, 0));
        assert!(w.contains(ct(0, 0)));
        let overnight = TimeWindow::new(ct(23, 0), ct(0, 0));
        assert!(overnight.contains(ct(23, 30)));
        assert!(!overnight.contains(ct(0, 0)));
    }

    fn weekday_schedule() -> Schedule {
        let mut s = Schedule::new("work", ct(9, 0), ct(17, 0));
        s.days = parse_days("mon,tue,wed,thu,fri").unwrap();
        s
    }

    #[test]
    fn schedule_active_within_window_on_matching_day() {
        let s = weekday_schedule();
        assert!(s.is_active_at(wednesday_at(10, 0)));
        assert!(!s.is_active_at(wednesday_at(18, 0)));
        // Saturday.
        assert!(!s.is_active_at(wall(2026, 8, 29, 10, 0)));
    }

    #[test]
    fn schedule_follows_wall_clock_not_utc() {
        use chrono::{FixedOffset, TimeZone, Utc};
        let s = weekday_schedule();
        // Wednesday 10:00 UTC reads as Wednesday 19:00 on a UTC+9 clock:
        // inside working hours by UTC, outside by the local clock.
        let instant = Utc.with_ymd_and_hms(2026, 8, 26, 10, 0, 0).unwrap();
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        assert!(s.is_active_at(instant.naive_utc()));
        assert!(!s.is_active_at(instant.with_timezone(&tokyo).naive_local()));
    }

    #[test]
    fn disabled_schedule_never_active() {
        let mut s = weekday_schedule();
        s.enabled = false;
        assert!(!s.is_active_at(wednesday_at(10, 0)));
    }

    #[test]
    fn next_occurrence_skips_todays_passed_window() {
        // Wednesday 18:00, Mon-Fri 09:00-17:00 -> Thursday 09:00.
        let s = weekday_schedule();
        let next = s.next_occurrence(wednesday_at(18, 0)).unwrap();
        assert_eq!(next, wall(2026, 8, 27, 9, 0));
    }

    #[test]
    fn next_occurrence_today_when_window_still_ahead() {
        let s = weekday_schedule();
        let next = s.next_occurrence(wednesday_at(7, 0)).unwrap();
        assert_eq!(next, wednesday_at(9, 0));
    }

    #[test]
    fn next_occurrence_crosses_weekend() {
        // Friday 18:00 -> Monday 09:00. 2026-08-28 is a Friday.
        let s = weekday_schedule();
        let next = s.next_occurrence(wall(2026, 8, 28, 18, 0)).unwrap();
        assert_eq!(next, wall(2026, 8, 31, 9, 0));
    }

    #[test]
    fn validate_rejects_empty_days_and_inverted_range() {
        let mut s = Schedule::new("bad", ct(9, 0), ct(17, 0));
        assert!(s.validate().is_err());

        s.days = parse_days("mon").unwrap();
        assert!(s.validate().is_ok());

        s.start = ct(22, 0);
        s.end = ct(6, 0);
        // Overnight schedules are rejected by construction.
        assert!(s.validate().is_err());
    }

    #[test]
    fn clock_time_parse_round_trip() {
        let t = ClockTime::parse("09:30").unwrap();
        assert_eq!(t, ct(9, 30));
        assert_eq!(t.to_string(), "09:30");
        assert!(ClockTime::parse("24:00").is_none());
        assert!(ClockTime::parse("nope").is_none());
    }

    mod window_properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// For any non-degenerate window, [start,end) and [end,start)
            /// partition the day: every instant falls in exactly one.
            #[test]
            fn window_and_its_reverse_partition_the_day(
                s in 0u16..1440, e in 0u16..1440, n in 0u16..1440
            ) {
                prop_assume!(s != e);
                let t = |m: u16| ClockTime::new((m / 60) as u8, (m % 60) as u8).unwrap();
                let w = TimeWindow::new(t(s), t(e));
                let rev = TimeWindow::new(t(e), t(s));
                prop_assert!(w.contains(t(n)) ^ rev.contains(t(n)));
            }
        }
    }
}
