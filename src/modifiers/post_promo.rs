//! Post-promo dip / cooldown guardrail, ported from
//! `domain/promo_uplift.py::is_in_post_promo_window`, per spec §4.4.

use chrono::{Duration, NaiveDate};

use crate::config::SettingsTree;
use crate::domain::{PromoWindow, SalesRecord, Transaction};

use super::promo_uplift::calculate_uplift_for_event;

/// The promo window whose post-promo cooldown period covers `receipt_date`,
/// if any (a SKU may have several historical windows; the first covering
/// one wins, matching the source's first-match semantics).
pub fn find_post_promo_window<'a>(
    receipt_date: NaiveDate,
    promo_windows: &'a [PromoWindow],
    sku: &str,
    window_days: i64,
) -> Option<&'a PromoWindow> {
    if window_days <= 0 {
        return None;
    }
    promo_windows.iter().filter(|w| w.sku == sku).find(|w| {
        let start = w.end_date + Duration::days(1);
        let end = w.end_date + Duration::days(window_days);
        receipt_date >= start && receipt_date <= end
    })
}

#[derive(Debug, Clone)]
pub struct PostPromoResult {
    pub factor: f64,
    pub dip_factor: f64,
    pub cap_applied: bool,
}

/// Computes the cooldown factor for `receipt_date` if it falls within a
/// post-promo window: either the configured constant `cooldown_factor`, or
/// an estimated dip (uplift machinery run over historical post-promo
/// windows, median-aggregated and clamped).
pub fn apply_post_promo(
    receipt_date: NaiveDate,
    promo_windows: &[PromoWindow],
    sku: &str,
    sales: &[SalesRecord],
    ledger: &[Transaction],
    settings: &SettingsTree,
) -> PostPromoResult {
    let enabled = settings.get_bool("post_promo_guardrail", "enabled", true);
    let window_days = settings.get_u32("post_promo_guardrail", "window_days", 7) as i64;
    if !enabled {
        return PostPromoResult { factor: 1.0, dip_factor: 1.0, cap_applied: false };
    }

    let matched = find_post_promo_window(receipt_date, promo_windows, sku, window_days);
    if matched.is_none() {
        return PostPromoResult { factor: 1.0, dip_factor: 1.0, cap_applied: false };
    }

    let use_estimated = settings.get_bool("post_promo_guardrail", "use_estimated_dip", false);
    let dip_floor = settings.get_f64("post_promo_guardrail", "dip_floor", 0.3);
    let dip_ceiling = settings.get_f64("post_promo_guardrail", "dip_ceiling", 1.0);

    let factor = if use_estimated {
        estimate_post_promo_dip(sku, promo_windows, sales, ledger, window_days, receipt_date, dip_floor, dip_ceiling)
    } else {
        settings.get_f64("post_promo_guardrail", "cooldown_factor", 0.8)
    };

    PostPromoResult { factor, dip_factor: factor, cap_applied: true }
}

/// Estimates the post-promo dip the same way promo uplift is estimated
/// (event-level actual/baseline ratios), but over the `window_days` after
/// each historical promo end, aggregated by median and clamped.
fn estimate_post_promo_dip(
    sku: &str,
    promo_windows: &[PromoWindow],
    sales: &[SalesRecord],
    ledger: &[Transaction],
    window_days: i64,
    asof: NaiveDate,
    dip_floor: f64,
    dip_ceiling: f64,
) -> f64 {
    let events: Vec<_> = promo_windows
        .iter()
        .filter(|w| w.sku == sku && w.end_date < asof)
        .filter_map(|w| {
            let start = w.end_date + Duration::days(1);
            let end = w.end_date + Duration::days(window_days);
            calculate_uplift_for_event(sku, start, end, sales, ledger, 1e-6)
        })
        .collect();

    if events.is_empty() {
        return 1.0;
    }
    let mut ratios: Vec<f64> = events.iter().map(|e| e.uplift_ratio).collect();
    ratios.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = ratios[ratios.len() / 2];
    median.clamp(dip_floor, dip_ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn receipt_day_after_promo_end_is_in_the_cooldown_window() {
        let windows = vec![PromoWindow { sku: "A".into(), start_date: d(2026, 1, 1), end_date: d(2026, 1, 5), store_id: None }];
        let matched = find_post_promo_window(d(2026, 1, 8), &windows, "A", 7);
        assert!(matched.is_some());
    }

    #[test]
    fn receipt_day_outside_window_is_not_matched() {
        let windows = vec![PromoWindow { sku: "A".into(), start_date: d(2026, 1, 1), end_date: d(2026, 1, 5), store_id: None }];
        let matched = find_post_promo_window(d(2026, 2, 1), &windows, "A", 7);
        assert!(matched.is_none());
    }
}
