// src/report.rs
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::info;

use crate::allocation::{AllocatedTransaction, AllocationPolicy};

/// One output row, in publishing column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "人员类别")]
    pub category: String,
    #[serde(rename = "姓名")]
    pub name: String,
    #[serde(rename = "个人编号")]
    pub person_id: String,
    #[serde(rename = "卡片类型")]
    pub card_type: String,
    #[serde(rename = "交易地点")]
    pub location: String,
    #[serde(rename = "卡户部门")]
    pub department: String,
    #[serde(rename = "交易时间")]
    pub timestamp: String,
    #[serde(rename = "交易金额")]
    pub amount: Decimal,
    #[serde(rename = "补贴上限")]
    pub limit: Decimal,
    #[serde(rename = "早餐（元）")]
    pub breakfast: Decimal,
    #[serde(rename = "工作餐（元）")]
    pub work_meal: Decimal,
    #[serde(rename = "加班餐（元）")]
    pub overtime_meal: Decimal,
    #[serde(rename = "自付（元）")]
    pub self_paid: Decimal,
}

fn money(value: Decimal) -> Decimal {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value
}

/// Projects allocated rows to the report, sorted by name, person id, then time.
/// Rows without a readable time sort last within their person.
pub fn assemble(rows: &[AllocatedTransaction]) -> Vec<ReportRow> {
    let mut ordered: Vec<&AllocatedTransaction> = rows.iter().collect();
    ordered.sort_by(|a, b| {
        let (ta, tb) = (&a.transaction, &b.transaction);
        ta.name
            .cmp(&tb.name)
            .then_with(|| ta.person_id.cmp(&tb.person_id))
            .then_with(|| match (ta.timestamp, tb.timestamp) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });

    ordered
        .into_iter()
        .map(|row| {
            let (t, a) = (&row.transaction, &row.allocation);
            ReportRow {
                category: t.category_label.clone(),
                name: t.name.clone(),
                person_id: t.person_id.clone(),
                card_type: t.card_type.clone(),
                location: t.location.clone(),
                department: t.department.clone(),
                timestamp: t
                    .timestamp
                    .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| t.raw_timestamp.clone()),
                amount: money(t.amount),
                limit: money(a.limit),
                breakfast: money(a.breakfast()),
                work_meal: money(a.work_meal()),
                overtime_meal: money(a.overtime_meal()),
                self_paid: money(a.self_paid),
            }
        })
        .collect()
}

/// Batch totals for logging and the optional JSON summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub policy: AllocationPolicy,
    pub rows: usize,
    pub groups: usize,
    pub supermarket_rows: usize,
    pub unreadable_timestamps: usize,
    pub total_amount: Decimal,
    pub breakfast: Decimal,
    pub work_meal: Decimal,
    pub overtime_meal: Decimal,
    pub self_paid: Decimal,
}

impl ReportSummary {
    pub fn from_rows(rows: &[AllocatedTransaction], policy: AllocationPolicy) -> Self {
        let groups: HashSet<_> = rows
            .iter()
            .filter(|r| !r.transaction.bypasses_allocation())
            .map(|r| {
                let t = &r.transaction;
                (t.name.as_str(), t.person_id.as_str(), t.date, t.meal_window)
            })
            .collect();
        let sum = |f: fn(&AllocatedTransaction) -> Decimal| -> Decimal {
            money(rows.iter().map(f).sum())
        };
        Self {
            policy,
            rows: rows.len(),
            groups: groups.len(),
            supermarket_rows: rows.iter().filter(|r| r.transaction.is_supermarket).count(),
            unreadable_timestamps: rows
                .iter()
                .filter(|r| r.transaction.timestamp.is_none())
                .count(),
            total_amount: sum(|r| r.transaction.amount),
            breakfast: sum(|r| r.allocation.breakfast()),
            work_meal: sum(|r| r.allocation.work_meal()),
            overtime_meal: sum(|r| r.allocation.overtime_meal()),
            self_paid: sum(|r| r.allocation.self_paid),
        }
    }

    pub fn log(&self) {
        info!(
            "{} rows in {} meal groups ({} supermarket, {} without a readable time)",
            self.rows, self.groups, self.supermarket_rows, self.unreadable_timestamps
        );
        info!(
            "Totals: amount {}, breakfast {}, work meal {}, overtime meal {}, self-paid {}",
            self.total_amount, self.breakfast, self.work_meal, self.overtime_meal, self.self_paid
        );
    }
}
