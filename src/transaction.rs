// src/transaction.rs
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::calendar::{DayFlags, HolidayRule, SubsidyCalendar};
use crate::meal_window::MealWindow;

// --- Person Category ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonCategory {
    Staff,
    Student,
    Unknown,
}

static STAFF_ACCOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}$").expect("valid regex"));
static STUDENT_ACCOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{8}$").expect("valid regex"));

impl PersonCategory {
    /// Maps an explicit category label from the export.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "职工" | "教职工" | "staff" | "Staff" => PersonCategory::Staff,
            "研究生" | "学生" | "student" | "Student" | "graduate" => PersonCategory::Student,
            _ => PersonCategory::Unknown,
        }
    }

    /// Fallback classifier on the card account number: 4 digits for staff,
    /// 8 for students, anything else unknown.
    pub fn from_account_id(account_id: &str) -> Self {
        let account_id = account_id.trim();
        if STAFF_ACCOUNT.is_match(account_id) {
            PersonCategory::Staff
        } else if STUDENT_ACCOUNT.is_match(account_id) {
            PersonCategory::Student
        } else {
            PersonCategory::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PersonCategory::Staff => "职工",
            PersonCategory::Student => "学生",
            PersonCategory::Unknown => "未知",
        }
    }
}

// --- Raw Rows ---

/// One row of the card export as read from the file; every field is kept as text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "人员类别", alias = "person_category", default)]
    pub person_category: Option<String>,
    #[serde(rename = "帐号", alias = "account_id", default)]
    pub account_id: Option<String>,
    #[serde(rename = "姓名", alias = "name", default)]
    pub name: String,
    #[serde(rename = "个人编号", alias = "person_id", default)]
    pub person_id: String,
    #[serde(rename = "卡片类型", alias = "card_type", default)]
    pub card_type: String,
    #[serde(rename = "交易地点", alias = "location", default)]
    pub location: String,
    #[serde(rename = "交易金额", alias = "amount", default)]
    pub amount: String,
    #[serde(rename = "交易时间", alias = "timestamp", default)]
    pub timestamp: String,
    #[serde(rename = "卡户部门", alias = "department", default)]
    pub department: String,
    #[serde(rename = "交易类型", alias = "transaction_type", default)]
    pub transaction_type: String,
}

// --- Normalized Rows ---

#[derive(Debug, Clone)]
pub struct Transaction {
    /// 1-based data row in the source file.
    pub row: usize,
    pub category: PersonCategory,
    pub category_label: String,
    pub name: String,
    pub person_id: String,
    pub card_type: String,
    pub location: String,
    pub department: String,
    pub amount: Decimal,
    pub timestamp: Option<NaiveDateTime>,
    pub raw_timestamp: String,
    pub meal_window: MealWindow,
    pub date: Option<NaiveDate>,
    pub day: Option<DayFlags>,
    pub is_supermarket: bool,
}

impl Transaction {
    /// Rows that never take part in grouping: supermarket purchases and rows
    /// whose time could not be read.
    pub fn bypasses_allocation(&self) -> bool {
        self.is_supermarket || self.timestamp.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub reversal_marker: String,
    pub supermarket_location: String,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            reversal_marker: "收费冲正".to_string(),
            supermarket_location: "超市".to_string(),
        }
    }
}

const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y%m%d%H%M%S",
];

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parses a signed amount, tolerating thousands separators.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Normalizes raw export rows. Reversal rows are dropped; every other row is kept
/// and faults are isolated to that row.
pub fn preprocess(
    raw: Vec<RawTransaction>,
    calendar: &SubsidyCalendar,
    rule: HolidayRule,
    options: &PreprocessOptions,
) -> Vec<Transaction> {
    let total = raw.len();
    let mut reversals = 0usize;
    let mut out = Vec::with_capacity(total);

    for (index, r) in raw.into_iter().enumerate() {
        let row = index + 1;
        if r.transaction_type.trim() == options.reversal_marker {
            reversals += 1;
            continue;
        }

        let amount = match parse_amount(&r.amount) {
            Some(a) => a.abs(),
            None => {
                warn!("Row {}: unreadable amount {:?}, using 0", row, r.amount);
                Decimal::ZERO
            }
        };

        let timestamp = parse_timestamp(&r.timestamp);
        if timestamp.is_none() {
            warn!(
                "Row {}: unreadable timestamp {:?}; row will be fully self-paid",
                row, r.timestamp
            );
        }

        let explicit = r
            .person_category
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty());
        let (category, category_label) = match explicit {
            Some(label) => (PersonCategory::from_label(label), label.to_string()),
            None => {
                let category = r
                    .account_id
                    .as_deref()
                    .map(PersonCategory::from_account_id)
                    .unwrap_or(PersonCategory::Unknown);
                (category, category.label().to_string())
            }
        };
        if category == PersonCategory::Unknown {
            debug!("Row {}: person category unknown ({})", row, category_label);
        }

        let date = timestamp.map(|ts| ts.date());
        let day = date.map(|d| calendar.day_flags(d, rule));
        let is_supermarket = r.location.trim() == options.supermarket_location;

        out.push(Transaction {
            row,
            category,
            category_label,
            name: r.name.trim().to_string(),
            person_id: r.person_id.trim().to_string(),
            card_type: r.card_type,
            location: r.location,
            department: r.department,
            amount,
            timestamp,
            raw_timestamp: r.timestamp,
            meal_window: MealWindow::of(timestamp),
            date,
            day,
            is_supermarket,
        });
    }

    info!(
        "Preprocessed {} rows ({} reversal rows dropped)",
        out.len(),
        reversals
    );
    out
}
