// src/allocation.rs
use chrono::NaiveDate;
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::calendar::HolidayRule;
use crate::meal_window::MealWindow;
use crate::subsidy_policy::{Allowance, SubsidyBucket, SubsidyLimits};
use crate::transaction::Transaction;

/// How a group's limit is spread over its transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Each swipe draws on what is left of the limit, in time order.
    #[default]
    Running,
    /// The group is summed and only its last swipe carries the overflow.
    Aggregate,
}

impl AllocationPolicy {
    pub fn holiday_rule(&self) -> HolidayRule {
        match self {
            AllocationPolicy::Running => HolidayRule::OvertimeOverridesHoliday,
            AllocationPolicy::Aggregate => HolidayRule::WeekendOrHoliday,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupKey {
    pub name: String,
    pub person_id: String,
    pub date: NaiveDate,
    pub window: MealWindow,
}

impl GroupKey {
    fn of(txn: &Transaction) -> Option<Self> {
        Some(Self {
            name: txn.name.clone(),
            person_id: txn.person_id.clone(),
            date: txn.date?,
            window: txn.meal_window,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub limit: Decimal,
    /// `None` under the aggregate policy, which does not split per swipe.
    pub subsidized: Option<Decimal>,
    pub self_paid: Decimal,
    pub bucket: Option<SubsidyBucket>,
    /// Amount booked in `bucket`.
    pub bucket_amount: Decimal,
}

impl Allocation {
    fn self_paid_in_full(amount: Decimal) -> Self {
        Self {
            limit: Decimal::ZERO,
            subsidized: Some(Decimal::ZERO),
            self_paid: amount,
            bucket: None,
            bucket_amount: Decimal::ZERO,
        }
    }

    fn bucket_value(&self, bucket: SubsidyBucket) -> Decimal {
        if self.bucket == Some(bucket) {
            self.bucket_amount
        } else {
            Decimal::ZERO
        }
    }

    pub fn breakfast(&self) -> Decimal {
        self.bucket_value(SubsidyBucket::Breakfast)
    }

    pub fn work_meal(&self) -> Decimal {
        self.bucket_value(SubsidyBucket::WorkMeal)
    }

    pub fn overtime_meal(&self) -> Decimal {
        self.bucket_value(SubsidyBucket::OvertimeMeal)
    }
}

#[derive(Debug, Clone)]
pub struct AllocatedTransaction {
    pub transaction: Transaction,
    pub allocation: Allocation,
}

fn allowance_for(txn: &Transaction, limits: &SubsidyLimits) -> Allowance {
    match txn.day {
        Some(day) => limits.allowance(txn.category, txn.meal_window, day),
        None => Allowance::NONE,
    }
}

/// Sequential allocation: each swipe takes what is left of the limit.
pub fn allocate_running(group: &[&Transaction], limits: &SubsidyLimits) -> Vec<Allocation> {
    let mut used = Decimal::ZERO;
    group
        .iter()
        .map(|txn| {
            let allowance = allowance_for(txn, limits);
            let available = (allowance.limit - used).max(Decimal::ZERO);
            let given = txn.amount.min(available);
            used += given;
            Allocation {
                limit: allowance.limit,
                subsidized: Some(given),
                self_paid: txn.amount - given,
                bucket: allowance.bucket,
                bucket_amount: if allowance.bucket.is_some() {
                    given
                } else {
                    Decimal::ZERO
                },
            }
        })
        .collect()
}

/// Aggregate allocation: the group total is compared against the limit and the
/// overflow is put on the last swipe.
pub fn allocate_aggregate(group: &[&Transaction], limits: &SubsidyLimits) -> Vec<Allocation> {
    let total: Decimal = group.iter().map(|txn| txn.amount).sum();
    let last = group.len().saturating_sub(1);
    group
        .iter()
        .enumerate()
        .map(|(i, txn)| {
            let allowance = allowance_for(txn, limits);
            let self_paid = if i == last {
                (total - allowance.limit).max(Decimal::ZERO)
            } else {
                Decimal::ZERO
            };
            Allocation {
                limit: allowance.limit,
                subsidized: None,
                self_paid,
                bucket: allowance.bucket,
                bucket_amount: if allowance.bucket.is_some() {
                    txn.amount
                } else {
                    Decimal::ZERO
                },
            }
        })
        .collect()
}

/// Runs the allocation over a normalized batch. Output order matches input order
/// and every input row produces exactly one output row.
pub fn allocate(
    transactions: Vec<Transaction>,
    limits: &SubsidyLimits,
    policy: AllocationPolicy,
) -> Vec<AllocatedTransaction> {
    let mut slots: Vec<Option<Allocation>> = vec![None; transactions.len()];
    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();

    for (i, txn) in transactions.iter().enumerate() {
        if txn.bypasses_allocation() {
            slots[i] = Some(Allocation::self_paid_in_full(txn.amount));
            continue;
        }
        if let Some(key) = GroupKey::of(txn) {
            groups.entry(key).or_default().push(i);
        }
    }

    for (key, mut members) in groups {
        // Stable: equal timestamps keep file order.
        members.sort_by_key(|&i| transactions[i].timestamp);
        let group: Vec<&Transaction> = members.iter().map(|&i| &transactions[i]).collect();
        let allocations = match policy {
            AllocationPolicy::Running => allocate_running(&group, limits),
            AllocationPolicy::Aggregate => allocate_aggregate(&group, limits),
        };
        let day = group.first().and_then(|t| t.day).unwrap_or_default();
        debug!(
            "Group {} {} {} {}: {} swipe(s), limit {} (workday {}, holiday {}, in holiday calendar {})",
            key.name,
            key.person_id,
            key.date,
            key.window.label(),
            members.len(),
            allocations.last().map(|a| a.limit).unwrap_or_default(),
            day.workday,
            day.holiday,
            day.in_holiday_calendar
        );
        for (i, allocation) in members.into_iter().zip(allocations) {
            slots[i] = Some(allocation);
        }
    }

    let allocated: Vec<AllocatedTransaction> = transactions
        .into_iter()
        .zip(slots)
        .map(|(transaction, slot)| {
            let allocation =
                slot.unwrap_or_else(|| Allocation::self_paid_in_full(transaction.amount));
            AllocatedTransaction {
                transaction,
                allocation,
            }
        })
        .collect();
    info!(
        "Allocated {} rows with the {:?} policy",
        allocated.len(),
        policy
    );
    allocated
}
