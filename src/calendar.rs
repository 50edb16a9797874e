// src/calendar.rs
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

use crate::holidays::{resolve_holidays, CalendarError};

/// Inclusive date range, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CalendarError> {
        if end < start {
            return Err(CalendarError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

/// Caller-supplied inputs for building the subsidy calendar.
#[derive(Debug, Clone, Default)]
pub struct CalendarParams {
    pub years: BTreeSet<i32>,
    pub high_temp_range: Option<DateRange>,
    pub high_temp_dates: Vec<NaiveDate>,
    pub overtime_dates: BTreeSet<NaiveDate>,
}

/// How holiday and workday flags are derived for a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayRule {
    /// A declared overtime workday counts as a workday and cancels its holiday status.
    OvertimeOverridesHoliday,
    /// Weekends count as holidays; overtime declarations are ignored.
    WeekendOrHoliday,
}

/// Day-level inputs to the limit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayFlags {
    pub workday: bool,
    pub holiday: bool,
    /// The date is a statutory holiday or high-temperature leave day, regardless of overrides.
    pub in_holiday_calendar: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SubsidyCalendar {
    non_workdays: HashSet<NaiveDate>,
    overtime_workdays: HashSet<NaiveDate>,
}

impl SubsidyCalendar {
    /// Resolves every requested year and merges the leave and overtime declarations.
    /// All configuration errors surface here.
    pub fn build(params: &CalendarParams) -> Result<Self, CalendarError> {
        let mut non_workdays = HashSet::new();
        for &year in &params.years {
            let holidays = resolve_holidays(year)?;
            info!("Loaded {} statutory holidays for {}", holidays.len(), year);
            non_workdays.extend(holidays);
        }

        let mut high_temp = 0;
        if let Some(range) = &params.high_temp_range {
            for day in range.days() {
                high_temp += 1;
                non_workdays.insert(day);
            }
        }
        high_temp += params.high_temp_dates.len();
        non_workdays.extend(params.high_temp_dates.iter().copied());
        debug!("Added {} high-temperature leave days", high_temp);

        let overtime_workdays: HashSet<NaiveDate> = params.overtime_dates.iter().copied().collect();
        if !overtime_workdays.is_empty() {
            info!("{} overtime workdays declared", overtime_workdays.len());
        }

        Ok(Self {
            non_workdays,
            overtime_workdays,
        })
    }

    pub fn is_non_workday(&self, date: NaiveDate) -> bool {
        self.non_workdays.contains(&date)
    }

    pub fn is_overtime_workday(&self, date: NaiveDate) -> bool {
        self.overtime_workdays.contains(&date)
    }

    pub fn day_flags(&self, date: NaiveDate, rule: HolidayRule) -> DayFlags {
        let weekday_index = date.weekday().num_days_from_monday();
        let in_holiday_calendar = self.is_non_workday(date);
        match rule {
            HolidayRule::OvertimeOverridesHoliday => {
                let overtime = self.is_overtime_workday(date);
                DayFlags {
                    workday: weekday_index < 5 || overtime,
                    holiday: in_holiday_calendar && !overtime,
                    in_holiday_calendar,
                }
            }
            HolidayRule::WeekendOrHoliday => DayFlags {
                workday: weekday_index < 5,
                holiday: in_holiday_calendar || weekday_index >= 5,
                in_holiday_calendar,
            },
        }
    }
}
