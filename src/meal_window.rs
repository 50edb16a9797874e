// src/meal_window.rs
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MealWindow {
    Breakfast,
    Lunch,
    Dinner,
    Other,
}

const fn secs(h: u32, m: u32, s: u32) -> u32 {
    h * 3600 + m * 60 + s
}

// Inclusive on both ends.
const WINDOWS: [(MealWindow, u32, u32); 3] = [
    (MealWindow::Breakfast, secs(7, 20, 0), secs(9, 0, 0)),
    (MealWindow::Lunch, secs(11, 0, 0), secs(14, 0, 0)),
    (MealWindow::Dinner, secs(17, 0, 0), secs(20, 0, 0)),
];

fn within(time: NaiveTime, start: u32, end: u32) -> bool {
    let s = time.num_seconds_from_midnight();
    s >= start && (s < end || (s == end && time.nanosecond() == 0))
}

/// Maps a swipe time to its meal window.
pub fn classify_meal_window(time: NaiveTime) -> MealWindow {
    WINDOWS
        .iter()
        .find(|(_, start, end)| within(time, *start, *end))
        .map(|(window, _, _)| *window)
        .unwrap_or(MealWindow::Other)
}

impl MealWindow {
    /// Window of a possibly missing timestamp; missing maps to `Other`.
    pub fn of(timestamp: Option<NaiveDateTime>) -> Self {
        timestamp
            .map(|ts| classify_meal_window(ts.time()))
            .unwrap_or(MealWindow::Other)
    }

    pub fn label(&self) -> &'static str {
        match self {
            MealWindow::Breakfast => "早餐",
            MealWindow::Lunch => "午餐",
            MealWindow::Dinner => "晚餐",
            MealWindow::Other => "其他",
        }
    }
}
