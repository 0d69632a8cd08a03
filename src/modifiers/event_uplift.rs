//! Event uplift: per-delivery-day multiplier from similar-day analysis and
//! SKU sensitivity (beta), per spec §4.4.

use chrono::{Datelike, Duration, NaiveDate};

use crate::config::SettingsTree;
use crate::domain::{most_specific_match, EventUpliftRule, SalesRecord, ScopeType, Sku};
use crate::ledger::StockCalculator;

#[derive(Debug, Clone, Default)]
pub struct EventUpliftResult {
    pub m_i: f64,
    pub reason: String,
    pub u_store_day: f64,
    pub beta_i: f64,
    pub fallback_level: Option<String>,
}

/// Quantile (linear interpolation) of demand on similar days: same weekday,
/// within `±similar_days_window` days of `r1`, excluding censored days,
/// across the whole store (every SKU's sales, normalised by SKU mean so one
/// high-volume SKU does not dominate).
fn store_day_quantile(r1: NaiveDate, sales: &[SalesRecord], ledger: &[crate::domain::Transaction], window: i64, quantile: f64, min_samples: usize) -> Option<f64> {
    let weekday = r1.weekday();
    let mut ratios: Vec<f64> = Vec::new();

    let mut date = r1 - Duration::days(window);
    let end = r1 + Duration::days(window);
    while date <= end {
        if date != r1 && date.weekday() == weekday {
            for sku_group in group_by_sku(sales) {
                let (sku, days) = sku_group;
                let calc = match StockCalculator::new(&sku, ledger) {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                if calc.is_day_censored(date).unwrap_or(false) {
                    continue;
                }
                let mean: f64 = days.iter().map(|s| s.qty_sold).sum::<f64>() / days.len().max(1) as f64;
                if mean <= 0.0 {
                    continue;
                }
                if let Some(sale) = days.iter().find(|s| s.date == date) {
                    ratios.push(sale.qty_sold / mean);
                }
            }
        }
        date += Duration::days(1);
    }

    if ratios.len() < min_samples {
        return None;
    }
    ratios.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Some(percentile(&ratios, quantile))
}

fn group_by_sku(sales: &[SalesRecord]) -> Vec<(String, Vec<&SalesRecord>)> {
    let mut skus: Vec<String> = sales.iter().map(|s| s.sku.clone()).collect();
    skus.sort();
    skus.dedup();
    skus.into_iter()
        .map(|sku| {
            let days: Vec<&SalesRecord> = sales.iter().filter(|s| s.sku == sku).collect();
            (sku, days)
        })
        .collect()
}

fn percentile(sorted: &[f64], level: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = level * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] + frac * (sorted[upper] - sorted[lower])
    }
}

/// Sensitivity (beta) of a pooled demand series to store-day demand: slope
/// of a zero-intercept regression of the pool's normalised demand on
/// normalised store-day demand, over the similar-day sample used for
/// `U_store_day`. `scope_skus` is `[sku]` for the SKU-level estimate, or
/// every peer SKU sharing a category/department for the pooled fallback.
/// `None` when fewer than `min_samples` paired observations exist.
fn pooled_beta(scope_skus: &[&str], r1: NaiveDate, sales: &[SalesRecord], window: i64, min_samples: usize) -> Option<f64> {
    let pool_sales: Vec<&SalesRecord> = sales.iter().filter(|s| scope_skus.contains(&s.sku.as_str())).collect();
    if pool_sales.is_empty() {
        return None;
    }
    let pool_mean = pool_sales.iter().map(|s| s.qty_sold).sum::<f64>() / pool_sales.len() as f64;
    if pool_mean <= 0.0 {
        return None;
    }
    let store_mean_all = sales.iter().map(|s| s.qty_sold).sum::<f64>() / sales.len().max(1) as f64;
    if store_mean_all <= 0.0 {
        return None;
    }

    let weekday = r1.weekday();
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut date = r1 - Duration::days(window);
    let end = r1 + Duration::days(window);
    while date <= end {
        if date.weekday() == weekday {
            let pool_values: Vec<f64> = pool_sales.iter().filter(|s| s.date == date).map(|s| s.qty_sold).collect();
            let store_values: Vec<f64> = sales.iter().filter(|s| s.date == date).map(|s| s.qty_sold).collect();
            if !pool_values.is_empty() && !store_values.is_empty() {
                let pool_total: f64 = pool_values.iter().sum();
                let store_mean = store_values.iter().sum::<f64>() / store_values.len() as f64;
                xs.push(store_mean / store_mean_all);
                ys.push(pool_total / pool_mean);
            }
        }
        date += Duration::days(1);
    }

    if xs.len() < min_samples {
        return None;
    }
    let sum_xy: f64 = xs.iter().zip(ys.iter()).map(|(x, y)| x * y).sum();
    let sum_xx: f64 = xs.iter().map(|x| x * x).sum();
    if sum_xx <= 0.0 {
        return None;
    }
    Some(sum_xy / sum_xx)
}

/// Computes the event multiplier `m_i` for the delivery date `r1`, falling
/// back through the scope hierarchy (sku -> category -> department -> ALL)
/// when per-SKU samples are insufficient.
pub fn apply_event_uplift(
    sku: &Sku,
    all_skus: &[Sku],
    r1: NaiveDate,
    rules: &[EventUpliftRule],
    sales: &[SalesRecord],
    ledger: &[crate::domain::Transaction],
    settings: &SettingsTree,
) -> EventUpliftResult {
    let enabled = settings.get_bool("event_uplift", "enabled", true);
    if !enabled {
        return EventUpliftResult { m_i: 1.0, ..Default::default() };
    }

    let exclude_threshold = settings.get_u32("event_uplift", "perishables_exclude_threshold", 2);
    if sku.shelf_life_days > 0 && sku.shelf_life_days <= exclude_threshold {
        return EventUpliftResult { m_i: 1.0, reason: "perishable_excluded".to_string(), ..Default::default() };
    }

    let rule = match most_specific_match(rules, r1, &sku.sku, &sku.category, &sku.department) {
        Some(r) => r,
        None => return EventUpliftResult { m_i: 1.0, ..Default::default() },
    };

    let quantile = settings.get_f64("event_uplift", "default_quantile", 0.80);
    let window = settings.get_u32("event_uplift", "similar_days_window", 28) as i64;
    let min_samples_u = settings.get_u32("event_uplift", "min_samples_u", 4) as usize;
    let min_samples_beta = settings.get_u32("event_uplift", "min_samples_beta", 6) as usize;
    let min_factor = settings.get_f64("event_uplift", "min_factor", 0.5);
    let max_factor = settings.get_f64("event_uplift", "max_factor", 3.0);

    let u_store_day = match store_day_quantile(r1, sales, ledger, window, quantile, min_samples_u) {
        Some(u) => u,
        None => return EventUpliftResult { m_i: 1.0, reason: rule.reason.clone(), ..Default::default() },
    };

    // β_i resolution: try SKU, then category/department pools; when every
    // scope lacks `min_samples_beta` observations, fall back to neutral
    // (β = 0), which nullifies the modifier — the resolved Open Question
    // (see DESIGN.md).
    let (beta, fallback_level) = resolve_beta(sku, all_skus, r1, sales, window, min_samples_beta);

    let m_i = (1.0 + rule.strength * beta * (u_store_day - 1.0)).clamp(min_factor, max_factor);
    EventUpliftResult { m_i, reason: rule.reason.clone(), u_store_day, beta_i: beta, fallback_level }
}

fn resolve_beta(sku: &Sku, all_skus: &[Sku], r1: NaiveDate, sales: &[SalesRecord], window: i64, min_samples_beta: usize) -> (f64, Option<String>) {
    if let Some(beta) = pooled_beta(&[sku.sku.as_str()], r1, sales, window, min_samples_beta) {
        return (beta, None);
    }
    if !sku.category.is_empty() {
        let peers: Vec<&str> = all_skus.iter().filter(|s| s.category == sku.category).map(|s| s.sku.as_str()).collect();
        if let Some(beta) = pooled_beta(&peers, r1, sales, window, min_samples_beta) {
            return (beta, Some(format!("category:{}", sku.category)));
        }
    }
    if !sku.department.is_empty() {
        let peers: Vec<&str> = all_skus.iter().filter(|s| s.department == sku.department).map(|s| s.sku.as_str()).collect();
        if let Some(beta) = pooled_beta(&peers, r1, sales, window, min_samples_beta) {
            return (beta, Some(format!("department:{}", sku.department)));
        }
    }
    (0.0, Some("neutral_beta_fallback".to_string()))
}
