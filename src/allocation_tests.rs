// src/allocation_tests.rs

#[cfg(test)]
mod tests {
    use crate::allocation::*;
    use crate::calendar::{CalendarParams, SubsidyCalendar};
    use crate::subsidy_policy::{SubsidyBucket, SubsidyLimits};
    use crate::transaction::{preprocess, PreprocessOptions, RawTransaction};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    const STAFF: &str = "1001";
    const STUDENT: &str = "20240001";

    // Helper to build a raw swipe for person "李四"
    fn swipe(account: &str, timestamp: &str, amount: &str) -> RawTransaction {
        swipe_at(account, timestamp, amount, "一食堂")
    }

    fn swipe_at(account: &str, timestamp: &str, amount: &str, location: &str) -> RawTransaction {
        RawTransaction {
            account_id: Some(account.to_string()),
            name: "李四".to_string(),
            person_id: format!("ID{}", account),
            card_type: "正式卡".to_string(),
            location: location.to_string(),
            amount: format!("-{}", amount),
            timestamp: timestamp.to_string(),
            department: "化学系".to_string(),
            transaction_type: "消费".to_string(),
            ..Default::default()
        }
    }

    fn calendar() -> SubsidyCalendar {
        SubsidyCalendar::build(&CalendarParams {
            years: BTreeSet::from([2024]),
            overtime_dates: BTreeSet::from([NaiveDate::from_ymd_opt(2024, 10, 2).unwrap()]),
            ..Default::default()
        })
        .unwrap()
    }

    fn run(rows: Vec<RawTransaction>, policy: AllocationPolicy) -> Vec<AllocatedTransaction> {
        let txns = preprocess(
            rows,
            &calendar(),
            policy.holiday_rule(),
            &PreprocessOptions::default(),
        );
        allocate(txns, &SubsidyLimits::default(), policy)
    }

    fn subsidized(row: &AllocatedTransaction) -> Decimal {
        row.allocation.subsidized.unwrap()
    }

    // --- Running policy ---

    #[test]
    fn staff_weekday_lunch_over_limit() {
        // 2024-07-15 is a Monday outside any holiday.
        let out = run(
            vec![swipe(STAFF, "2024-07-15 12:00:00", "30")],
            AllocationPolicy::Running,
        );
        let a = &out[0].allocation;
        assert_eq!(a.limit, dec!(25));
        assert_eq!(subsidized(&out[0]), dec!(25));
        assert_eq!(a.self_paid, dec!(5));
        assert_eq!(a.work_meal(), dec!(25));
        assert_eq!(a.breakfast(), Decimal::ZERO);
        assert_eq!(a.overtime_meal(), Decimal::ZERO);
    }

    #[test]
    fn student_saturday_breakfast_is_self_paid() {
        let out = run(
            vec![swipe(STUDENT, "2024-07-13 08:00:00", "6.5")],
            AllocationPolicy::Running,
        );
        let a = &out[0].allocation;
        assert_eq!(a.limit, Decimal::ZERO);
        assert_eq!(subsidized(&out[0]), Decimal::ZERO);
        assert_eq!(a.self_paid, dec!(6.5));
        assert_eq!(a.bucket, None);
    }

    #[test]
    fn student_weekday_breakfast_is_capped_at_two() {
        let out = run(
            vec![swipe(STUDENT, "2024-07-15 07:45:00", "3.5")],
            AllocationPolicy::Running,
        );
        assert_eq!(subsidized(&out[0]), dec!(2));
        assert_eq!(out[0].allocation.self_paid, dec!(1.5));
        assert_eq!(out[0].allocation.breakfast(), dec!(2));
    }

    #[test]
    fn holiday_dinner_budget_is_shared_in_time_order() {
        // 2024-10-03 is a National Day holiday.
        let out = run(
            vec![
                swipe(STAFF, "2024-10-03 18:00:00", "20"),
                swipe(STAFF, "2024-10-03 18:20:00", "15"),
            ],
            AllocationPolicy::Running,
        );
        assert_eq!(out[0].allocation.limit, dec!(29));
        assert_eq!(subsidized(&out[0]), dec!(20));
        assert_eq!(out[0].allocation.self_paid, Decimal::ZERO);
        assert_eq!(subsidized(&out[1]), dec!(9));
        assert_eq!(out[1].allocation.self_paid, dec!(6));
        assert_eq!(out[1].allocation.overtime_meal(), dec!(9));
        let group_self_paid: Decimal = out.iter().map(|r| r.allocation.self_paid).sum();
        assert_eq!(group_self_paid, dec!(6));
    }

    #[test]
    fn chronological_order_wins_over_file_order() {
        let out = run(
            vec![
                swipe(STAFF, "2024-07-15 12:30:00", "15"),
                swipe(STAFF, "2024-07-15 11:30:00", "20"),
            ],
            AllocationPolicy::Running,
        );
        // Output stays in file order; the 11:30 swipe was served first.
        assert_eq!(subsidized(&out[1]), dec!(20));
        assert_eq!(subsidized(&out[0]), dec!(5));
        assert_eq!(out[0].allocation.self_paid, dec!(10));
    }

    #[test]
    fn unknown_category_is_fully_self_paid() {
        let out = run(
            vec![swipe("123456", "2024-07-15 12:00:00", "18")],
            AllocationPolicy::Running,
        );
        assert_eq!(out[0].allocation.limit, Decimal::ZERO);
        assert_eq!(out[0].allocation.self_paid, dec!(18));
        assert_eq!(subsidized(&out[0]), Decimal::ZERO);
    }

    #[test]
    fn supermarket_does_not_consume_meal_budget() {
        let out = run(
            vec![
                swipe_at(STAFF, "2024-07-15 12:00:00", "20", "超市"),
                swipe(STAFF, "2024-07-15 12:10:00", "25"),
            ],
            AllocationPolicy::Running,
        );
        assert_eq!(out[0].allocation.self_paid, dec!(20));
        assert_eq!(subsidized(&out[0]), Decimal::ZERO);
        assert_eq!(out[0].allocation.work_meal(), Decimal::ZERO);
        assert_eq!(subsidized(&out[1]), dec!(25));
        assert_eq!(out[1].allocation.self_paid, Decimal::ZERO);
    }

    #[test]
    fn supermarket_is_self_paid_under_aggregate_too() {
        let out = run(
            vec![swipe_at(STUDENT, "2024-07-15 12:00:00", "12", "超市")],
            AllocationPolicy::Aggregate,
        );
        assert_eq!(out[0].allocation.self_paid, dec!(12));
        assert_eq!(out[0].allocation.bucket, None);
    }

    #[test]
    fn unreadable_timestamp_is_isolated() {
        let out = run(
            vec![
                swipe(STAFF, "2024-07-15 12:00:00", "10"),
                swipe(STAFF, "yesterday noon", "10"),
            ],
            AllocationPolicy::Running,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(subsidized(&out[0]), dec!(10));
        assert_eq!(out[1].allocation.self_paid, dec!(10));
        assert_eq!(out[1].allocation.limit, Decimal::ZERO);
    }

    #[test]
    fn other_window_gets_no_subsidy() {
        let out = run(
            vec![swipe(STAFF, "2024-07-15 15:30:00", "9")],
            AllocationPolicy::Running,
        );
        assert_eq!(out[0].allocation.self_paid, dec!(9));
        assert_eq!(out[0].allocation.bucket, None);
    }

    #[test]
    fn overtime_declaration_turns_holiday_lunch_into_work_meal() {
        // 2024-10-02 is a holiday declared as an overtime workday.
        let out = run(
            vec![swipe(STAFF, "2024-10-02 12:00:00", "30")],
            AllocationPolicy::Running,
        );
        assert_eq!(out[0].allocation.limit, dec!(25));
        assert_eq!(out[0].allocation.work_meal(), dec!(25));

        let out = run(
            vec![swipe(STAFF, "2024-10-02 12:00:00", "30")],
            AllocationPolicy::Aggregate,
        );
        assert_eq!(out[0].allocation.limit, dec!(29));
        assert_eq!(out[0].allocation.bucket, Some(SubsidyBucket::WorkMeal));
        assert_eq!(out[0].allocation.self_paid, dec!(1));
    }

    #[test]
    fn weekday_holiday_lunch_is_booked_as_work_meal() {
        // 2024-10-03 is a Thursday inside the National Day holiday.
        let out = run(
            vec![swipe(STAFF, "2024-10-03 12:00:00", "30")],
            AllocationPolicy::Running,
        );
        let day = out[0].transaction.day.unwrap();
        assert!(day.workday && day.holiday);
        assert_eq!(out[0].allocation.limit, dec!(29));
        assert_eq!(out[0].allocation.work_meal(), dec!(29));
        assert_eq!(out[0].allocation.overtime_meal(), Decimal::ZERO);
        assert_eq!(out[0].allocation.self_paid, dec!(1));
    }

    #[test]
    fn group_subsidy_never_exceeds_limit() {
        let cases: [&[&str]; 4] = [&["10", "5"], &["20", "5"], &["25"], &["12.34", "8.88", "9.01"]];
        for amounts in cases {
            let rows = amounts
                .iter()
                .enumerate()
                .map(|(i, a)| swipe(STAFF, &format!("2024-07-15 12:0{}:00", i), a))
                .collect();
            let out = run(rows, AllocationPolicy::Running);
            let total: Decimal = out.iter().map(|r| r.transaction.amount).sum();
            let given: Decimal = out.iter().map(subsidized).sum();
            assert!(given <= dec!(25));
            assert_eq!(given == dec!(25), total >= dec!(25), "amounts {:?}", amounts);
            for row in &out {
                assert_eq!(subsidized(row) + row.allocation.self_paid, row.transaction.amount);
            }
        }
    }

    // --- Aggregate policy ---

    #[test]
    fn aggregate_puts_overflow_on_last_swipe() {
        let out = run(
            vec![
                swipe(STAFF, "2024-07-15 11:10:00", "20"),
                swipe(STAFF, "2024-07-15 11:40:00", "15"),
            ],
            AllocationPolicy::Aggregate,
        );
        assert_eq!(out[0].allocation.self_paid, Decimal::ZERO);
        assert_eq!(out[1].allocation.self_paid, dec!(10));
        assert!(out.iter().all(|r| r.allocation.subsidized.is_none()));
        assert!(out.iter().all(|r| r.allocation.limit == dec!(25)));
        assert_eq!(out[0].allocation.work_meal(), dec!(20));
        assert_eq!(out[1].allocation.work_meal(), dec!(15));
    }

    #[test]
    fn aggregate_under_limit_has_no_self_paid() {
        let out = run(
            vec![
                swipe(STUDENT, "2024-07-15 17:30:00", "12"),
                swipe(STUDENT, "2024-07-15 19:00:00", "10"),
            ],
            AllocationPolicy::Aggregate,
        );
        let self_paid: Decimal = out.iter().map(|r| r.allocation.self_paid).sum();
        assert_eq!(self_paid, Decimal::ZERO);
    }

    #[test]
    fn aggregate_weekend_lunch_uses_overtime_limit() {
        let out = run(
            vec![swipe(STAFF, "2024-07-13 12:00:00", "40")],
            AllocationPolicy::Aggregate,
        );
        assert_eq!(out[0].allocation.limit, dec!(29));
        assert_eq!(out[0].allocation.self_paid, dec!(11));
    }

    #[test]
    fn both_policies_agree_on_group_self_paid_total() {
        let rows = || {
            vec![
                swipe(STAFF, "2024-07-15 11:05:00", "18.50"),
                swipe(STAFF, "2024-07-15 12:45:00", "9.75"),
                swipe(STAFF, "2024-07-15 13:10:00", "4.20"),
                swipe(STUDENT, "2024-07-16 18:00:00", "11"),
                swipe(STUDENT, "2024-07-16 19:30:00", "6"),
            ]
        };
        let running = run(rows(), AllocationPolicy::Running);
        let aggregate = run(rows(), AllocationPolicy::Aggregate);
        let total = |out: &[AllocatedTransaction]| -> Decimal {
            out.iter().map(|r| r.allocation.self_paid).sum()
        };
        // Staff lunch: 32.45 - 25 = 7.45; student dinner: 17 < 29.
        assert_eq!(total(&running), dec!(7.45));
        assert_eq!(total(&aggregate), dec!(7.45));
    }
}
