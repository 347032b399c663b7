//! Work-day aware finish date estimation.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use thiserror::Error;

use super::{duration::WorkDuration, money::round_whole};

/// Highest weekday index; Monday is 0.
pub const MAX_WEEKDAY: u8 = 6;

const DAYS_PER_WEEK: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("hours per day must be greater than zero")]
    NoHoursPerDay,
    #[error("at least one work day is required")]
    NoWorkDays,
    #[error("weekday index {0} is out of range (0-6)")]
    InvalidWeekday(u8),
}

/// Validated capacity settings; constructing one guarantees every walk terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkSchedule {
    hours_per_day: u32,
    work_days: [bool; 7],
    minimum_days: u32,
}

impl WorkSchedule {
    pub fn new(
        hours_per_day: u32,
        work_days: &BTreeSet<u8>,
        minimum_days: u32,
    ) -> Result<Self, ScheduleError> {
        if hours_per_day == 0 {
            return Err(ScheduleError::NoHoursPerDay);
        }
        if work_days.is_empty() {
            return Err(ScheduleError::NoWorkDays);
        }
        let mut days = [false; 7];
        for &day in work_days {
            if day > MAX_WEEKDAY {
                return Err(ScheduleError::InvalidWeekday(day));
            }
            days[day as usize] = true;
        }
        Ok(Self {
            hours_per_day,
            work_days: days,
            minimum_days,
        })
    }

    pub fn hours_per_day(&self) -> u32 {
        self.hours_per_day
    }

    pub fn minimum_days(&self) -> u32 {
        self.minimum_days
    }

    pub fn is_work_day(&self, date: NaiveDate) -> bool {
        self.work_days[date.weekday().num_days_from_monday() as usize]
    }

    /// First work day on or after `date`; `None` past the end of the calendar.
    pub fn next_work_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut day = date;
        for _ in 0..DAYS_PER_WEEK {
            if self.is_work_day(day) {
                return Some(day);
            }
            day = day.succ_opt()?;
        }
        None
    }

    /// Walks the calendar from `start` until `total` work is used up.
    ///
    /// The walk lands on the first work day, skips `minimum_days` further work
    /// days of lead time and then spends `hours_per_day` on each following
    /// work day until no hours remain. `None` when the finish date falls
    /// outside the supported calendar.
    pub fn finish_date(&self, start: NaiveDate, total: WorkDuration) -> Option<NaiveDate> {
        let first = self.next_work_day(start)?;
        let remaining = total.hours();
        let busy_days = if remaining > Decimal::ZERO {
            (remaining / Decimal::from(self.hours_per_day)).ceil().to_u64()?
        } else {
            0
        };
        self.advance_work_days(first, busy_days.checked_add(u64::from(self.minimum_days))?)
    }

    /// Moves `count` work days past the work day `from`.
    fn advance_work_days(&self, from: NaiveDate, count: u64) -> Option<NaiveDate> {
        let per_week = self.work_days.iter().filter(|&&day| day).count() as u64;
        // A whole week from a work day lands on the same weekday.
        let weeks = count / per_week;
        let mut day = from.checked_add_days(Days::new(weeks.checked_mul(DAYS_PER_WEEK)?))?;
        for _ in 0..count % per_week {
            day = self.next_work_day(day.succ_opt()?)?;
        }
        Some(day)
    }

    /// Quick calendar-day estimate; not guaranteed to match [`Self::finish_date`].
    pub fn finish_days(&self, total: WorkDuration) -> i64 {
        let full_days = round_whole(total.hours() / Decimal::from(self.hours_per_day))
            .to_i64()
            .unwrap_or_default();
        full_days
            .saturating_add(1)
            .saturating_add(i64::from(self.minimum_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekdays() -> BTreeSet<u8> {
        (0..5).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert_eq!(
            WorkSchedule::new(0, &weekdays(), 0),
            Err(ScheduleError::NoHoursPerDay)
        );
        assert_eq!(
            WorkSchedule::new(8, &BTreeSet::new(), 0),
            Err(ScheduleError::NoWorkDays)
        );
        assert_eq!(
            WorkSchedule::new(8, &BTreeSet::from([2, 9]), 0),
            Err(ScheduleError::InvalidWeekday(9))
        );
    }

    #[test]
    fn finish_date_skips_lead_days_then_consumes_work_days() {
        let schedule = WorkSchedule::new(6, &weekdays(), 2).expect("schedule");
        let monday = date(2024, 3, 4);
        let finish = schedule.finish_date(monday, WorkDuration::from_hms(13, 0, 0));
        // lead: Tue, Wed; work: Thu, Fri, Mon
        assert_eq!(finish, Some(date(2024, 3, 11)));
    }

    #[test]
    fn finish_date_starts_on_next_work_day() {
        let schedule = WorkSchedule::new(8, &weekdays(), 0).expect("schedule");
        let saturday = date(2024, 3, 9);
        assert_eq!(schedule.finish_date(saturday, WorkDuration::ZERO), Some(date(2024, 3, 11)));
        assert_eq!(
            schedule.finish_date(saturday, WorkDuration::from_hms(8, 0, 0)),
            Some(date(2024, 3, 12))
        );
    }

    #[test]
    fn long_walks_jump_whole_weeks() {
        let schedule = WorkSchedule::new(8, &weekdays(), 3).expect("schedule");
        let monday = date(2024, 3, 4);
        // 3 lead days plus 100 busy days is 103 work days: 20 weeks and 3 days.
        let finish = schedule.finish_date(monday, WorkDuration::from_hms(800, 0, 0));
        assert_eq!(finish, Some(date(2024, 7, 25)));

        let stepped = (0..103).try_fold(monday, |day, _| {
            schedule.next_work_day(day.succ_opt().expect("next day"))
        });
        assert_eq!(finish, stepped);
    }

    #[test]
    fn finish_date_beyond_the_calendar_is_none() {
        let every_day: BTreeSet<u8> = (0..7).collect();
        let schedule = WorkSchedule::new(1, &every_day, 0).expect("schedule");
        let start = date(2024, 1, 1);
        assert_eq!(
            schedule.finish_date(start, WorkDuration::from_hms(200_000_000, 0, 0)),
            None
        );
        assert_eq!(
            schedule.finish_date(start, WorkDuration::from_seconds(i64::MAX)),
            None
        );
        let lead = WorkSchedule::new(8, &weekdays(), u32::MAX).expect("schedule");
        assert_eq!(lead.finish_date(start, WorkDuration::ZERO), None);
        assert_eq!(schedule.next_work_day(NaiveDate::MAX), Some(NaiveDate::MAX));
    }

    #[test]
    fn finish_days_is_a_rounded_estimate() {
        let schedule = WorkSchedule::new(6, &weekdays(), 2).expect("schedule");
        assert_eq!(schedule.finish_days(WorkDuration::from_hms(13, 0, 0)), 5);
        assert_eq!(schedule.finish_days(WorkDuration::ZERO), 3);
    }
}
