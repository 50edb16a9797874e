// src/holidays.rs
use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

// --- Error Types ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("No statutory holiday data for {year}; supported years are {first}-{last}")]
    UnsupportedYear { year: i32, first: i32, last: i32 },
    #[error("Invalid date range: end {end} is before start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

// --- Day Types ---

/// Classification of a single calendar date by the official arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayType {
    Workday,
    Weekend,
    StatutoryHoliday,
    /// A weekend day that is worked in lieu of a holiday bridge day.
    MakeupWorkday,
}

// --- Holiday Table ---

// (month, day, length in days) for each holiday span, plus the in-lieu workdays.
struct HolidayArrangement {
    year: i32,
    holidays: &'static [(u32, u32, u64)],
    makeup_workdays: &'static [(u32, u32)],
}

const ARRANGEMENTS: &[HolidayArrangement] = &[
    HolidayArrangement {
        year: 2023,
        holidays: &[
            (1, 1, 2),   // New Year
            (1, 21, 7),  // Spring Festival
            (4, 5, 1),   // Qingming
            (4, 29, 5),  // Labour Day
            (6, 22, 3),  // Dragon Boat
            (9, 29, 8),  // Mid-Autumn + National Day
        ],
        makeup_workdays: &[(1, 28), (1, 29), (4, 23), (5, 6), (6, 25), (10, 7), (10, 8)],
    },
    HolidayArrangement {
        year: 2024,
        holidays: &[
            (1, 1, 1),
            (2, 10, 8),
            (4, 4, 3),
            (5, 1, 5),
            (6, 10, 1),
            (9, 15, 3),
            (10, 1, 7),
        ],
        makeup_workdays: &[
            (2, 4),
            (2, 18),
            (4, 7),
            (4, 28),
            (5, 11),
            (9, 14),
            (9, 29),
            (10, 12),
        ],
    },
    HolidayArrangement {
        year: 2025,
        holidays: &[
            (1, 1, 1),
            (1, 28, 8),
            (4, 4, 3),
            (5, 1, 5),
            (5, 31, 3),
            (10, 1, 8),
        ],
        makeup_workdays: &[(1, 26), (2, 8), (4, 27), (9, 28), (10, 11)],
    },
    HolidayArrangement {
        year: 2026,
        holidays: &[
            (1, 1, 3),
            (2, 15, 9),
            (4, 4, 3),
            (5, 1, 5),
            (6, 19, 3),
            (9, 25, 3),
            (10, 1, 7),
        ],
        makeup_workdays: &[(1, 4), (2, 14), (2, 28), (5, 9), (9, 20), (10, 10)],
    },
];

struct YearDays {
    holidays: HashSet<NaiveDate>,
    makeup_workdays: HashSet<NaiveDate>,
}

impl HolidayArrangement {
    fn expand(&self) -> YearDays {
        let holidays = self
            .holidays
            .iter()
            .filter_map(|&(m, d, len)| {
                NaiveDate::from_ymd_opt(self.year, m, d).map(|start| (start, len))
            })
            .flat_map(|(start, len)| start.iter_days().take(len as usize))
            .collect();
        let makeup_workdays = self
            .makeup_workdays
            .iter()
            .filter_map(|&(m, d)| NaiveDate::from_ymd_opt(self.year, m, d))
            .collect();
        YearDays {
            holidays,
            makeup_workdays,
        }
    }
}

static YEAR_DAYS: Lazy<HashMap<i32, YearDays>> = Lazy::new(|| {
    ARRANGEMENTS
        .iter()
        .map(|arrangement| (arrangement.year, arrangement.expand()))
        .collect()
});

/// First and last year covered by the holiday table.
pub fn supported_years() -> (i32, i32) {
    let first = ARRANGEMENTS.iter().map(|a| a.year).min().unwrap_or_default();
    let last = ARRANGEMENTS.iter().map(|a| a.year).max().unwrap_or_default();
    (first, last)
}

fn year_days(year: i32) -> Result<&'static YearDays, CalendarError> {
    YEAR_DAYS.get(&year).ok_or_else(|| {
        let (first, last) = supported_years();
        CalendarError::UnsupportedYear { year, first, last }
    })
}

/// Looks up the official day type of `date`.
pub fn day_type(date: NaiveDate) -> Result<DayType, CalendarError> {
    let days = year_days(date.year())?;
    if days.holidays.contains(&date) {
        return Ok(DayType::StatutoryHoliday);
    }
    if days.makeup_workdays.contains(&date) {
        return Ok(DayType::MakeupWorkday);
    }
    Ok(match date.weekday() {
        Weekday::Sat | Weekday::Sun => DayType::Weekend,
        _ => DayType::Workday,
    })
}

/// Every statutory holiday date in `year`.
///
/// Fails with [`CalendarError::UnsupportedYear`] when the table has no data for
/// the year rather than returning an empty or guessed set.
pub fn resolve_holidays(year: i32) -> Result<BTreeSet<NaiveDate>, CalendarError> {
    // Validate up front so the error does not depend on iteration.
    year_days(year)?;
    let first = NaiveDate::from_ymd_opt(year, 1, 1);
    let mut holidays = BTreeSet::new();
    for date in first.into_iter().flat_map(|d| d.iter_days()) {
        if date.year() != year {
            break;
        }
        if day_type(date)? == DayType::StatutoryHoliday {
            holidays.insert(date);
        }
    }
    debug!("Resolved {} statutory holidays for {}", holidays.len(), year);
    Ok(holidays)
}
