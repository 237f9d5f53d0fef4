// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wall-clock scheduling for the once-a-day summary run.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// The next instant strictly after `now` at which the wall clock in `tz`
/// reads `time_of_day`.
///
/// A local time skipped by a DST transition rolls over to the next day on
/// which it exists. A time that occurs twice resolves to its first occurrence.
pub fn next_daily_run(now: DateTime<Utc>, time_of_day: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    let mut date = now.with_timezone(&tz).date_naive();
    // Two days always suffice; the slack covers zones with odd transitions.
    for _ in 0..4 {
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(time_of_day)).earliest() {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return Some(candidate);
            }
        }
        date = date.succ_opt()?;
    }
    None
}

/// Local calendar date in `tz` at `now`, used to label summaries.
pub fn summary_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Los_Angeles;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn six_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(18, 0, 0).unwrap()
    }

    #[test]
    fn later_today_when_before_time() {
        // 17:00 PST on March 6th.
        let next = next_daily_run(utc("2026-03-07T01:00:00Z"), six_pm(), Los_Angeles).unwrap();
        assert_eq!(next, utc("2026-03-07T02:00:00Z"));
    }

    #[test]
    fn exactly_at_time_schedules_tomorrow() {
        let next = next_daily_run(utc("2026-03-07T02:00:00Z"), six_pm(), Los_Angeles).unwrap();
        assert_eq!(next, utc("2026-03-08T02:00:00Z"));
    }

    #[test]
    fn follows_dst_offset_change() {
        // 19:00 PST on March 7th; DST starts March 8th so 18:00 is PDT (UTC-7).
        let next = next_daily_run(utc("2026-03-08T03:00:00Z"), six_pm(), Los_Angeles).unwrap();
        assert_eq!(next, utc("2026-03-09T01:00:00Z"));
    }

    #[test]
    fn skipped_local_time_rolls_to_next_day() {
        let half_past_two = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        // 01:00 PST on March 8th; 02:30 does not exist that day.
        let next = next_daily_run(utc("2026-03-08T09:00:00Z"), half_past_two, Los_Angeles).unwrap();
        assert_eq!(next, utc("2026-03-09T09:30:00Z"));
    }

    #[test]
    fn repeated_local_time_uses_first_occurrence() {
        let half_past_one = NaiveTime::from_hms_opt(1, 30, 0).unwrap();
        // 00:00 PDT on November 1st; 01:30 happens twice.
        let next = next_daily_run(utc("2026-11-01T07:00:00Z"), half_past_one, Los_Angeles).unwrap();
        assert_eq!(next, utc("2026-11-01T08:30:00Z"));
    }

    #[test]
    fn summary_date_is_local() {
        // 20:00 PST on March 6th is already March 7th in UTC.
        let date = summary_date(utc("2026-03-07T04:00:00Z"), Los_Angeles);
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 6).unwrap());
    }
}
