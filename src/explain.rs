//! `OrderExplain` assembler: the machine-readable audit record, exported one
//! row per SKU in the exact column order of spec §6. This is the single
//! source of truth for that order — `tests/scenarios.rs` and
//! `repository::CsvRepository::write_explains` both use it.

use crate::domain::OrderExplain;

/// Column order mandated by spec §6. Exported one row per SKU; absent
/// numerics are zero, absent strings empty (never a missing column).
pub const CSV_COLUMNS: &[&str] = &[
    "sku",
    "asof_date",
    "receipt_date",
    "protection_period_days",
    "policy_mode",
    "forecast_method",
    "intermittent_classifier",
    "demand.mu_P",
    "demand.sigma_P",
    "demand.forecast_method",
    "demand.mc_n_simulations",
    "demand.mc_random_seed",
    "demand.mc_distribution",
    "demand.mc_horizon_days",
    "demand.quantiles",
    "reorder_point",
    "reorder_point_method",
    "quantile_used",
    "csl_alpha_target",
    "csl_alpha_eff",
    "csl_z_score",
    "inventory_position",
    "on_hand",
    "usable_stock",
    "unusable_stock",
    "on_order",
    "unfulfilled_qty",
    "waste_risk_percent",
    "uplift_factor",
    "uplift_confidence",
    "uplift_pooling",
    "event_m_i",
    "event_reason",
    "event_u_store_day",
    "event_beta_i",
    "post_promo_factor",
    "post_promo_dip_factor",
    "post_promo_cap_applied",
    "downlift_factor",
    "downlift_driver_sku",
    "downlift_confidence",
    "order_raw",
    "order_rounded",
    "order_final",
    "constraint_pack",
    "constraint_moq",
    "constraint_max_stock",
    "constraint_shelf_life",
    "constraint_details",
    "simulation_used",
    "history_valid_days",
    "oos_days_count",
    "oos_boost_applied",
    "error",
    "notes",
];

/// Renders one `OrderExplain` into a CSV row matching `CSV_COLUMNS` exactly.
/// `demand.quantiles` is rendered as a JSON map (e.g. `{"0.50":70.0}`).
pub fn to_row(explain: &OrderExplain) -> Vec<String> {
    let quantiles_json = serde_json::to_string(&explain.demand_quantiles).unwrap_or_else(|_| "{}".to_string());
    vec![
        explain.sku.clone(),
        explain.asof_date.to_string(),
        explain.receipt_date.to_string(),
        explain.protection_period_days.to_string(),
        explain.policy_mode.clone(),
        explain.forecast_method.clone(),
        explain.intermittent_classifier.clone(),
        explain.demand_mu_p.to_string(),
        explain.demand_sigma_p.to_string(),
        explain.demand_forecast_method.clone(),
        explain.demand_mc_n_simulations.to_string(),
        explain.demand_mc_random_seed.to_string(),
        explain.demand_mc_distribution.clone(),
        explain.demand_mc_horizon_days.to_string(),
        quantiles_json,
        explain.reorder_point.to_string(),
        explain.reorder_point_method.clone(),
        explain.quantile_used.map(|q| q.to_string()).unwrap_or_default(),
        explain.csl_alpha_target.to_string(),
        explain.csl_alpha_eff.to_string(),
        explain.csl_z_score.to_string(),
        explain.inventory_position.to_string(),
        explain.on_hand.to_string(),
        explain.usable_stock.to_string(),
        explain.unusable_stock.to_string(),
        explain.on_order.to_string(),
        explain.unfulfilled_qty.to_string(),
        explain.waste_risk_percent.to_string(),
        explain.uplift_factor.to_string(),
        explain.uplift_confidence.clone(),
        explain.uplift_pooling.clone(),
        explain.event_m_i.to_string(),
        explain.event_reason.clone(),
        explain.event_u_store_day.to_string(),
        explain.event_beta_i.to_string(),
        explain.post_promo_factor.to_string(),
        explain.post_promo_dip_factor.to_string(),
        explain.post_promo_cap_applied.to_string(),
        explain.downlift_factor.to_string(),
        explain.downlift_driver_sku.clone(),
        explain.downlift_confidence.clone(),
        explain.order_raw.to_string(),
        explain.order_rounded.to_string(),
        explain.order_final.to_string(),
        explain.constraint_pack.to_string(),
        explain.constraint_moq.to_string(),
        explain.constraint_max_stock.to_string(),
        explain.constraint_shelf_life.to_string(),
        explain.constraint_details.clone(),
        explain.simulation_used.to_string(),
        explain.history_valid_days.to_string(),
        explain.oos_days_count.to_string(),
        explain.oos_boost_applied.to_string(),
        explain.error.clone().unwrap_or_default(),
        explain.notes.clone(),
    ]
}
