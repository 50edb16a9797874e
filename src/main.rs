// src/main.rs
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod allocation;
mod allocation_tests;
mod calendar;
mod card_export;
mod config;
mod holidays;
mod meal_window;
mod report;
mod subsidy_policy;
mod transaction;

use allocation::{allocate, AllocationPolicy};
use calendar::{CalendarParams, DateRange, SubsidyCalendar};
use card_export::InputEncoding;
use config::{parse_date_list, ConfigError, Settings};
use report::{assemble, ReportSummary};
use transaction::{parse_timestamp, preprocess, RawTransaction};

// --- Command Line ---

/// Splits canteen card swipes into subsidized and self-paid meal amounts.
#[derive(Parser, Debug)]
#[command(name = "canteen-subsidy", version, about)]
struct Cli {
    /// Card transaction export (CSV)
    input: PathBuf,

    /// Character encoding of the input; auto uses the BOM, then UTF-8, then GBK
    #[arg(long, value_enum, default_value_t = InputEncoding::Auto)]
    encoding: InputEncoding,

    /// Report file to write
    #[arg(short, long, default_value = "餐补计算结果.csv")]
    output: PathBuf,

    /// Year(s) to load statutory holidays for; defaults to the years in the input
    #[arg(short = 'y', long = "year")]
    years: Vec<i32>,

    /// First day of high-temperature leave (YYYY-MM-DD)
    #[arg(long, requires = "high_temp_end")]
    high_temp_start: Option<NaiveDate>,

    /// Last day of high-temperature leave, inclusive (YYYY-MM-DD)
    #[arg(long, requires = "high_temp_start")]
    high_temp_end: Option<NaiveDate>,

    /// Additional high-temperature leave days, comma separated
    #[arg(long, default_value = "")]
    high_temp_dates: String,

    /// Days worked as overtime despite being holidays or weekends, comma separated
    #[arg(long, default_value = "")]
    overtime_dates: String,

    /// Allocation policy; overrides MEALSUB_POLICY
    #[arg(long, value_enum)]
    policy: Option<AllocationPolicy>,

    /// Also write a JSON summary of the batch totals
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn high_temp_range(cli: &Cli) -> Result<Option<DateRange>> {
    match (cli.high_temp_start, cli.high_temp_end) {
        (Some(start), Some(end)) => Ok(Some(DateRange::new(start, end)?)),
        (None, None) => Ok(None),
        _ => Err(ConfigError::IncompleteHighTempRange.into()),
    }
}

fn years_in(rows: &[RawTransaction]) -> BTreeSet<i32> {
    rows.iter()
        .filter_map(|r| parse_timestamp(&r.timestamp))
        .map(|ts| ts.year())
        .collect()
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env().context("Loading MEALSUB_* settings failed")?;
    let policy = cli.policy.unwrap_or(settings.policy);
    info!("Using the {:?} allocation policy", policy);

    let mut params = CalendarParams {
        years: cli.years.iter().copied().collect(),
        high_temp_range: high_temp_range(&cli)?,
        high_temp_dates: parse_date_list("--high-temp-dates", &cli.high_temp_dates)?
            .into_iter()
            .collect(),
        overtime_dates: parse_date_list("--overtime-dates", &cli.overtime_dates)?,
    };

    let raw = card_export::read_transactions_from_path(&cli.input, cli.encoding)
        .with_context(|| format!("Reading {} failed", cli.input.display()))?;

    if params.years.is_empty() {
        params.years = years_in(&raw);
        if params.years.is_empty() {
            warn!("No readable timestamps in input; no statutory holidays loaded");
        } else {
            info!("Holiday years taken from input: {:?}", params.years);
        }
    }
    let calendar = SubsidyCalendar::build(&params).context("Building the subsidy calendar failed")?;

    let transactions = preprocess(
        raw,
        &calendar,
        policy.holiday_rule(),
        &settings.preprocess_options(),
    );
    let allocated = allocate(transactions, &settings.limits(), policy);

    let summary = ReportSummary::from_rows(&allocated, policy);
    summary.log();

    let rows = assemble(&allocated);
    card_export::write_report_to_path(&rows, &cli.output)
        .with_context(|| format!("Writing {} failed", cli.output.display()))?;
    if let Some(path) = &cli.summary {
        card_export::write_summary_to_path(&summary, path)
            .with_context(|| format!("Writing {} failed", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    run(cli)
}
