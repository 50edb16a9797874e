// src/config.rs
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::allocation::AllocationPolicy;
use crate::subsidy_policy::SubsidyLimits;
use crate::transaction::PreprocessOptions;

pub const ENV_PREFIX: &str = "MEALSUB_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment configuration: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid date '{value}' in {field}, expected YYYY-MM-DD")]
    InvalidDateList { field: String, value: String },
    #[error("High-temperature leave needs both a start and an end date")]
    IncompleteHighTempRange,
}

/// Settings read from `MEALSUB_*` environment variables (a `.env` file is honoured).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default = "default_supermarket_location")]
    pub supermarket_location: String,
    #[serde(default = "default_reversal_marker")]
    pub reversal_marker: String,
    #[serde(default = "default_student_breakfast_limit")]
    pub student_breakfast_limit: rust_decimal::Decimal,
    #[serde(default = "default_workday_lunch_limit")]
    pub workday_lunch_limit: rust_decimal::Decimal,
    #[serde(default = "default_overtime_meal_limit")]
    pub overtime_meal_limit: rust_decimal::Decimal,
    #[serde(default)]
    pub policy: AllocationPolicy,
}

fn default_supermarket_location() -> String {
    PreprocessOptions::default().supermarket_location
}

fn default_reversal_marker() -> String {
    PreprocessOptions::default().reversal_marker
}

fn default_student_breakfast_limit() -> rust_decimal::Decimal {
    SubsidyLimits::default().student_breakfast
}

fn default_workday_lunch_limit() -> rust_decimal::Decimal {
    SubsidyLimits::default().workday_lunch
}

fn default_overtime_meal_limit() -> rust_decimal::Decimal {
    SubsidyLimits::default().overtime_meal
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Settings>()?)
    }

    pub fn limits(&self) -> SubsidyLimits {
        SubsidyLimits {
            student_breakfast: self.student_breakfast_limit,
            workday_lunch: self.workday_lunch_limit,
            overtime_meal: self.overtime_meal_limit,
        }
    }

    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            reversal_marker: self.reversal_marker.clone(),
            supermarket_location: self.supermarket_location.clone(),
        }
    }
}

/// Parses a comma separated `YYYY-MM-DD` list; blank entries are skipped.
pub fn parse_date_list(field: &str, input: &str) -> Result<BTreeSet<NaiveDate>, ConfigError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ConfigError::InvalidDateList {
                field: field.to_string(),
                value: s.to_string(),
            })
        })
        .collect()
}
