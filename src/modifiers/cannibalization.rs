//! Cannibalisation downlift: substitution effect when a peer SKU is on
//! promotion, per spec §4.4.

use chrono::{Duration, NaiveDate};

use crate::config::SettingsTree;
use crate::domain::{PromoWindow, SalesRecord, Transaction};

#[derive(Debug, Clone)]
pub struct DownliftResult {
    pub factor: f64,
    pub driver_sku: String,
    pub confidence: String,
}

impl Default for DownliftResult {
    fn default() -> Self {
        Self { factor: 1.0, driver_sku: String::new(), confidence: "C".to_string() }
    }
}

/// For each candidate driver (a peer SKU in `target`'s substitute group that
/// is on promo at `r1` while `target` is not), computes the downlift ratio
/// of target sales to target baseline across historical days when the
/// driver was on promo and the target was not. The *primary driver* is the
/// one with the largest impact (smallest median ratio).
pub fn estimate_downlift(
    target_sku: &str,
    r1: NaiveDate,
    substitute_groups: &[Vec<String>],
    promo_windows: &[PromoWindow],
    sales: &[SalesRecord],
    _ledger: &[Transaction],
    settings: &SettingsTree,
) -> DownliftResult {
    let enabled = settings.get_bool("promo_cannibalization", "enabled", true);
    if !enabled {
        return DownliftResult::default();
    }

    let target_on_promo = promo_windows.iter().any(|w| w.sku == target_sku && w.contains(r1));
    if target_on_promo {
        return DownliftResult::default();
    }

    let drivers: Vec<&str> = substitute_groups
        .iter()
        .filter(|group| group.iter().any(|s| s == target_sku))
        .flat_map(|group| group.iter().map(String::as_str))
        .filter(|s| *s != target_sku)
        .filter(|driver| promo_windows.iter().any(|w| w.sku == *driver && w.contains(r1)))
        .collect();

    if drivers.is_empty() {
        return DownliftResult::default();
    }

    let min_events = settings.get_u32("promo_cannibalization", "min_events", 2) as usize;
    let min_valid_days = settings.get_u32("promo_cannibalization", "min_valid_days", 7) as u32;
    let downlift_min = settings.get_f64("promo_cannibalization", "downlift_min", 0.3);
    let downlift_max = settings.get_f64("promo_cannibalization", "downlift_max", 1.0);

    let mut best: Option<DownliftResult> = None;
    for driver in drivers {
        let (ratio, n_events, valid_days) = downlift_ratio_for_driver(target_sku, driver, promo_windows, sales);
        if n_events < min_events || valid_days < min_valid_days {
            continue;
        }
        let clamped = ratio.clamp(downlift_min, downlift_max);
        let confidence = if n_events >= 2 && valid_days >= min_valid_days { "B" } else { "C" };
        let candidate = DownliftResult { factor: clamped, driver_sku: driver.to_string(), confidence: confidence.to_string() };
        // Primary driver is the one with the largest impact: smallest ratio.
        if best.as_ref().map(|b| candidate.factor < b.factor).unwrap_or(true) {
            best = Some(candidate);
        }
    }

    best.unwrap_or_default()
}

/// Median of (Σ target sales / Σ target baseline) across historical days
/// when `driver` was on promo and `target` was not, treating the SKU's own
/// non-promo average daily sales as its baseline.
fn downlift_ratio_for_driver(target: &str, driver: &str, promo_windows: &[PromoWindow], sales: &[SalesRecord]) -> (f64, usize, u32) {
    let target_baseline_days: Vec<f64> = sales
        .iter()
        .filter(|s| s.sku == target && !promo_windows.iter().any(|w| w.sku == target && w.contains(s.date)))
        .map(|s| s.qty_sold)
        .collect();
    if target_baseline_days.is_empty() {
        return (1.0, 0, 0);
    }
    let baseline_avg = target_baseline_days.iter().sum::<f64>() / target_baseline_days.len() as f64;
    if baseline_avg <= 0.0 {
        return (1.0, 0, 0);
    }

    let driver_windows: Vec<&PromoWindow> = promo_windows.iter().filter(|w| w.sku == driver).collect();
    let mut ratios = Vec::new();
    let mut valid_days = 0_u32;

    for window in &driver_windows {
        let mut date = window.start_date;
        while date <= window.end_date {
            let target_on_promo = promo_windows.iter().any(|w| w.sku == target && w.contains(date));
            if !target_on_promo {
                if let Some(sale) = sales.iter().find(|s| s.sku == target && s.date == date) {
                    ratios.push(sale.qty_sold / baseline_avg);
                    valid_days += 1;
                }
            }
            date += Duration::days(1);
        }
    }

    if ratios.is_empty() {
        return (1.0, 0, 0);
    }
    ratios.sort_by(|a, b| a.partial_cmp(b).unwrap());
    (ratios[ratios.len() / 2], driver_windows.len(), valid_days)
}
