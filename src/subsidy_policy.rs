// src/subsidy_policy.rs
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::calendar::DayFlags;
use crate::meal_window::MealWindow;
use crate::transaction::PersonCategory;

/// Report column a subsidized amount is booked under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsidyBucket {
    Breakfast,
    WorkMeal,
    OvertimeMeal,
}

/// Limit for one meal window and the bucket its subsidy goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allowance {
    pub limit: Decimal,
    pub bucket: Option<SubsidyBucket>,
}

impl Allowance {
    pub const NONE: Allowance = Allowance {
        limit: Decimal::ZERO,
        bucket: None,
    };

    fn of(limit: Decimal, bucket: SubsidyBucket) -> Self {
        if limit > Decimal::ZERO {
            Allowance {
                limit,
                bucket: Some(bucket),
            }
        } else {
            Allowance::NONE
        }
    }
}

/// Per-meal limits in yuan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsidyLimits {
    #[serde(default = "default_student_breakfast")]
    pub student_breakfast: Decimal,
    #[serde(default = "default_workday_lunch")]
    pub workday_lunch: Decimal,
    #[serde(default = "default_overtime_meal")]
    pub overtime_meal: Decimal,
}

fn default_student_breakfast() -> Decimal {
    dec!(2)
}

fn default_workday_lunch() -> Decimal {
    dec!(25)
}

fn default_overtime_meal() -> Decimal {
    dec!(29)
}

impl Default for SubsidyLimits {
    fn default() -> Self {
        Self {
            student_breakfast: default_student_breakfast(),
            workday_lunch: default_workday_lunch(),
            overtime_meal: default_overtime_meal(),
        }
    }
}

impl SubsidyLimits {
    /// Limit table; the first matching arm wins. The bucket follows the meal, not the
    /// limit row: any workday lunch is a work meal, even at the holiday limit.
    pub fn allowance(
        &self,
        category: PersonCategory,
        window: MealWindow,
        day: DayFlags,
    ) -> Allowance {
        use MealWindow::*;
        use PersonCategory::*;

        let regular_workday = day.workday && !day.holiday;
        match (category, window) {
            (Unknown, _) | (_, Other) => Allowance::NONE,
            (Staff, Breakfast) => Allowance::NONE,
            (Staff | Student, Lunch) if regular_workday => {
                Allowance::of(self.workday_lunch, SubsidyBucket::WorkMeal)
            }
            (Staff | Student, Lunch) if day.workday => {
                Allowance::of(self.overtime_meal, SubsidyBucket::WorkMeal)
            }
            (Staff | Student, Lunch | Dinner) => {
                Allowance::of(self.overtime_meal, SubsidyBucket::OvertimeMeal)
            }
            (Student, Breakfast) if regular_workday => {
                Allowance::of(self.student_breakfast, SubsidyBucket::Breakfast)
            }
            (Student, Breakfast) => Allowance::NONE,
        }
    }
}
