use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use thiserror::Error;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("invalid calendar input: year {year}, month {month}")]
    InvalidCalendarInput { year: i32, month: u32 },
}

/// Dates of every weekday in one month, ascending per weekday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekdayOccurrenceTable {
    year: i32,
    month: u32,
    dates: [Vec<NaiveDate>; 7],
}

/// A resolved camp date, or `Unknown` when the occurrence doesn't exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampDate {
    Date(NaiveDate),
    Unknown,
}

impl fmt::Display for CampDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CampDate::Date(d) => write!(f, "{}", d.format("%d-%m-%Y")),
            CampDate::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Build the occurrence table for `(year, month)`.
pub fn resolve(year: i32, month: u32) -> Result<WeekdayOccurrenceTable, CalendarError> {
    let invalid = CalendarError::InvalidCalendarInput { year, month };
    if !(1..=9999).contains(&year) {
        return Err(invalid);
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(invalid)?;

    let mut dates: [Vec<NaiveDate>; 7] = Default::default();
    for offset in 0..31 {
        let day = first + Duration::days(offset);
        if day.month() != month {
            break;
        }
        dates[day.weekday().num_days_from_monday() as usize].push(day);
    }

    Ok(WeekdayOccurrenceTable { year, month, dates })
}

impl WeekdayOccurrenceTable {
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn occurrences(&self, weekday: Weekday) -> &[NaiveDate] {
        &self.dates[weekday.num_days_from_monday() as usize]
    }

    /// 1-based lookup of the `ordinal`-th `weekday` in the month.
    pub fn nth(&self, weekday: Weekday, ordinal: u32) -> CampDate {
        let idx = match (ordinal as usize).checked_sub(1) {
            Some(i) => i,
            None => return CampDate::Unknown,
        };
        self.occurrences(weekday)
            .get(idx)
            .copied()
            .map(CampDate::Date)
            .unwrap_or(CampDate::Unknown)
    }

    /// Same as [`nth`](Self::nth) but keyed by a weekday name ("Monday", "mon").
    pub fn occurrence_date(&self, weekday_name: &str, ordinal: u32) -> CampDate {
        match parse_weekday(weekday_name) {
            Some(w) => self.nth(w, ordinal),
            None => CampDate::Unknown,
        }
    }

    /// Weekday name and its dates, Monday first.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[NaiveDate])> {
        WEEKDAYS
            .iter()
            .map(move |w| (weekday_name(*w), self.occurrences(*w)))
    }
}

/// Full or three-letter weekday name, any case.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    Weekday::from_str(name.trim()).ok()
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

// ── Tests ──
