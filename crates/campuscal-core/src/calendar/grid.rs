//! Month grid skeletons.
//!
//! A grid is a list of Sunday-first week rows. Cells outside the month are `0`.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::CalendarError;

pub const DAYS_PER_WEEK: usize = 7;

/// One week row, Sunday first.
pub type Week = [u32; DAYS_PER_WEEK];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    year: i32,
    month: u32,
    weeks: Vec<Week>,
}

impl MonthGrid {
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn weeks(&self) -> &[Week] {
        &self.weeks
    }

    /// Number of non-padding cells.
    pub fn day_count(&self) -> usize {
        self.weeks
            .iter()
            .flat_map(|w| w.iter())
            .filter(|&&d| d != 0)
            .count()
    }

    /// `(row, column)` of `day`, or `None` if the day is not in this month.
    pub fn position_of(&self, day: u32) -> Option<(usize, usize)> {
        if day == 0 {
            return None;
        }
        self.weeks.iter().enumerate().find_map(|(row, week)| {
            week.iter().position(|&d| d == day).map(|col| (row, col))
        })
    }
}

fn check_month(month: u32) -> Result<(), CalendarError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(CalendarError::InvalidMonth { month })
    }
}

/// First day of the month.
///
/// # Errors
/// `InvalidMonth` for months outside 1-12, `InvalidDate` if the year is out
/// of chrono's range.
pub fn first_day(year: i32, month: u32) -> Result<NaiveDate, CalendarError> {
    check_month(month)?;
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CalendarError::InvalidDate(format!("{year}-{month:02}-01")))
}

/// Number of days in the month.
pub fn days_in_month(year: i32, month: u32) -> Result<u32, CalendarError> {
    let first = first_day(year, month)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let next = next.ok_or_else(|| CalendarError::InvalidDate(format!("month after {first}")))?;
    Ok(next.signed_duration_since(first).num_days() as u32)
}

/// Last day of the month as a date.
pub fn last_day(year: i32, month: u32) -> Result<NaiveDate, CalendarError> {
    let days = days_in_month(year, month)?;
    first_day(year, month)?
        .with_day(days)
        .ok_or_else(|| CalendarError::InvalidDate(format!("{year}-{month:02}-{days}")))
}

/// Build the week grid for `year`/`month`.
///
/// # Errors
/// `InvalidMonth` when `month` is outside 1-12.
pub fn generate(year: i32, month: u32) -> Result<MonthGrid, CalendarError> {
    let first = first_day(year, month)?;
    let last = days_in_month(year, month)?;

    // chrono weeks start on Monday; the grid starts on Sunday.
    let offset = first.weekday().num_days_from_sunday() as usize;

    let mut weeks = Vec::with_capacity(6);
    let mut week: Week = [0; DAYS_PER_WEEK];
    let mut col = offset;

    for day in 1..=last {
        week[col] = day;
        col += 1;
        if col == DAYS_PER_WEEK {
            weeks.push(week);
            week = [0; DAYS_PER_WEEK];
            col = 0;
        }
    }
    if col > 0 {
        weeks.push(week);
    }

    Ok(MonthGrid { year, month, weeks })
}
