//! `reorder-cli`: thin batch runner over the decision core. Loads one
//! `CsvRepository` directory, proposes today's orders for every
//! in-assortment SKU, writes `order_proposals.csv` / `order_explain.csv`
//! back into it, and prints a one-line cost/coverage summary — the same
//! "setup -> run -> export -> summarize" shape as the teacher's `main.rs`,
//! generalized from one simulation run to one reorder batch.

use std::env;
use std::process::ExitCode;

use chrono::{NaiveDate, Weekday};

use reorder_core::calendar::{Holiday, Lane, LogisticsCalendar};
use reorder_core::clock::{Clock, FixedClock, SystemClock};
use reorder_core::facade::{propose_orders_batch, DecisionInputs};
use reorder_core::repository::{CsvRepository, Repository};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let base_dir = match args.get(1) {
        Some(dir) => dir.clone(),
        None => {
            eprintln!("usage: reorder-cli <data-dir> [asof=YYYY-MM-DD] [lane=standard|saturday|monday]");
            return ExitCode::FAILURE;
        }
    };
    let asof_arg = args.get(2).map(|s| s.as_str());
    let lane_arg = args.get(3).map(|s| s.as_str()).unwrap_or("standard");

    match run(&base_dir, asof_arg, lane_arg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("reorder-cli: {msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(base_dir: &str, asof_arg: Option<&str>, lane_arg: &str) -> Result<(), String> {
    println!("=== Reorder decision core ===");

    let repo = CsvRepository::new(base_dir);

    // 1. LOAD COLLECTIONS (once per batch, per design note §9's
    //    arena/index pattern — every collaborator collection is loaded
    //    exactly once and handed to the facade by reference).
    let skus = repo.read_skus().map_err(|e| e.to_string())?;
    let ledger = repo.read_transactions().map_err(|e| e.to_string())?;
    let sales = repo.read_sales().map_err(|e| e.to_string())?;
    let promo_windows = repo.read_promo_calendar().map_err(|e| e.to_string())?;
    let event_rules = repo.read_event_uplift_rules().map_err(|e| e.to_string())?;
    let settings = repo.read_settings().map_err(|e| e.to_string())?;
    let holidays = repo.read_holidays().map_err(|e| e.to_string())?;
    let substitute_groups = repo.read_substitute_groups().map_err(|e| e.to_string())?;

    println!(
        "Loaded {} SKUs, {} ledger events, {} sales rows, {} promo windows, {} event rules",
        skus.len(),
        ledger.len(),
        sales.len(),
        event_rules.len(),
        promo_windows.len()
    );

    // 2. RESOLVE asof AND THE LOGISTICS CALENDAR.
    let clock: Box<dyn Clock> = match asof_arg {
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| format!("invalid asof date {raw:?}: {e}"))?;
            Box::new(FixedClock(date))
        }
        None => Box::new(SystemClock),
    };
    let asof = clock.today();

    let calendar = build_calendar(&settings, holidays);
    let lane = parse_lane(lane_arg)?;

    // 3. DECIDE, ONE BATCH CALL, ONE ROW PER SKU.
    let inputs = DecisionInputs {
        all_skus: &skus,
        ledger: &ledger,
        sales: &sales,
        promo_windows: &promo_windows,
        event_rules: &event_rules,
        substitute_groups: &substitute_groups,
        settings: &settings,
        calendar: &calendar,
    };
    let decisions = propose_orders_batch(&skus, &inputs, lane, asof);

    // 4. EXPORT.
    let (proposals, explains): (Vec<_>, Vec<_>) = decisions.into_iter().unzip();
    repo.write_proposals(&proposals).map_err(|e| e.to_string())?;
    repo.write_explains(&explains).map_err(|e| e.to_string())?;

    // 5. SUMMARIZE.
    let failed = proposals.iter().filter(|p| p.error.is_some()).count();
    let total_units: u32 = proposals.iter().map(|p| p.qty).sum();
    let reordered = proposals.iter().filter(|p| p.qty > 0).count();

    println!("\n=== Batch summary ===");
    println!("asof: {asof}, lane: {lane_arg}");
    println!("proposals: {}, reorders: {}, failed: {}", proposals.len(), reordered, failed);
    println!("total units proposed: {total_units}");
    println!("wrote order_proposals.csv and order_explain.csv under {base_dir}");

    Ok(())
}

fn parse_lane(raw: &str) -> Result<Lane, String> {
    match raw.to_ascii_lowercase().as_str() {
        "standard" => Ok(Lane::Standard),
        "saturday" => Ok(Lane::Saturday),
        "monday" => Ok(Lane::Monday),
        other => Err(format!("unknown lane {other:?} (expected standard, saturday, or monday)")),
    }
}

/// Builds the logistics calendar from `calendar.order_days` (spec §6: a
/// list of integers 0..6, 0=Monday) plus whatever holidays the repository
/// has on file.
fn build_calendar(settings: &reorder_core::config::SettingsTree, holidays: Vec<Holiday>) -> LogisticsCalendar {
    let order_days = settings
        .get("calendar", "order_days")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_u64()).filter_map(weekday_from_index).collect())
        .unwrap_or_else(|| vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]);
    LogisticsCalendar::new(order_days, holidays)
}

fn weekday_from_index(i: u64) -> Option<Weekday> {
    match i {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}
