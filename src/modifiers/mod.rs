//! Demand modifier chain: promo uplift, event uplift, post-promo cooldown,
//! cannibalisation downlift, applied in the fixed order spec §4.4 mandates:
//! `μ_P' = μ_P · uplift · event · cooldown · downlift`.

pub mod cannibalization;
pub mod event_uplift;
pub mod post_promo;
pub mod promo_uplift;

use chrono::NaiveDate;

use crate::config::SettingsTree;
use crate::domain::{EventUpliftRule, PromoWindow, SalesRecord, Sku, Transaction};

pub struct ModifierChainResult {
    pub mu_p_adjusted: f64,
    pub uplift: promo_uplift::UpliftReport,
    pub event: event_uplift::EventUpliftResult,
    pub post_promo: post_promo::PostPromoResult,
    pub downlift: cannibalization::DownliftResult,
}

/// Applies the fixed modifier chain to a baseline `mu_p`, returning the
/// adjusted mean plus each modifier's own report for the explain record.
#[allow(clippy::too_many_arguments)]
pub fn apply_chain(
    mu_p: f64,
    sku: &Sku,
    all_skus: &[Sku],
    r1: NaiveDate,
    promo_windows: &[PromoWindow],
    event_rules: &[EventUpliftRule],
    substitute_groups: &[Vec<String>],
    sales: &[SalesRecord],
    ledger: &[Transaction],
    settings: &SettingsTree,
    asof: NaiveDate,
) -> ModifierChainResult {
    let uplift = promo_uplift::estimate_uplift(&sku.sku, all_skus, promo_windows, sales, ledger, settings, asof);
    let event = event_uplift::apply_event_uplift(sku, all_skus, r1, event_rules, sales, ledger, settings);
    let post_promo = post_promo::apply_post_promo(r1, promo_windows, &sku.sku, sales, ledger, settings);
    let downlift = cannibalization::estimate_downlift(&sku.sku, r1, substitute_groups, promo_windows, sales, ledger, settings);

    let mu_p_adjusted = mu_p * uplift.uplift_factor * event.m_i * post_promo.factor * downlift.factor;

    ModifierChainResult { mu_p_adjusted, uplift, event, post_promo, downlift }
}
