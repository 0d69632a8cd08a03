//! Transactional records (OrderLog/ReceivingLog) and the two pure output
//! values the facade produces (OrderProposal/OrderExplain).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Partial,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLog {
    pub order_id: String,
    pub date: NaiveDate,
    pub sku: String,
    pub qty_ordered: u32,
    pub qty_received: u32,
    pub receipt_date: NaiveDate,
    pub status: OrderStatus,
}

impl OrderLog {
    pub fn remaining(&self) -> u32 {
        self.qty_ordered.saturating_sub(self.qty_received)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivingLog {
    /// Idempotency key.
    pub document_id: String,
    pub date: NaiveDate,
    pub sku: String,
    pub qty_received: u32,
    /// Explicit allocation; empty means "use implicit FIFO allocation
    /// against open order logs".
    pub allocated_order_ids: Vec<String>,
}

/// The decision: what to order, for which SKU, for delivery on which date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProposal {
    pub sku: String,
    pub qty: u32,
    pub receipt_date: NaiveDate,
    pub notes: String,
    pub error: Option<String>,
}

impl OrderProposal {
    pub fn failed(sku: impl Into<String>, receipt_date: NaiveDate, reason: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            qty: 0,
            receipt_date,
            notes: String::new(),
            error: Some(reason.into()),
        }
    }
}

/// The machine-readable audit record. Field order here matches the CSV
/// column order mandated by spec §6 exactly; `explain::CSV_COLUMNS` and
/// `explain::to_row` are the single source of truth for that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderExplain {
    pub sku: String,
    pub asof_date: NaiveDate,
    pub receipt_date: NaiveDate,
    pub protection_period_days: u32,
    pub policy_mode: String,
    pub forecast_method: String,
    pub intermittent_classifier: String,

    pub demand_mu_p: f64,
    pub demand_sigma_p: f64,
    pub demand_forecast_method: String,
    pub demand_mc_n_simulations: u32,
    pub demand_mc_random_seed: u64,
    pub demand_mc_distribution: String,
    pub demand_mc_horizon_days: u32,
    pub demand_quantiles: HashMap<String, f64>,

    pub reorder_point: f64,
    pub reorder_point_method: String,
    pub quantile_used: Option<f64>,
    pub csl_alpha_target: f64,
    pub csl_alpha_eff: f64,
    pub csl_z_score: f64,

    pub inventory_position: f64,
    pub on_hand: u32,
    pub usable_stock: f64,
    pub unusable_stock: f64,
    pub on_order: u32,
    pub unfulfilled_qty: u32,
    pub waste_risk_percent: f64,

    pub uplift_factor: f64,
    pub uplift_confidence: String,
    pub uplift_pooling: String,

    pub event_m_i: f64,
    pub event_reason: String,
    pub event_u_store_day: f64,
    pub event_beta_i: f64,

    pub post_promo_factor: f64,
    pub post_promo_dip_factor: f64,
    pub post_promo_cap_applied: bool,

    pub downlift_factor: f64,
    pub downlift_driver_sku: String,
    pub downlift_confidence: String,

    pub order_raw: f64,
    pub order_rounded: u32,
    pub order_final: u32,

    pub constraint_pack: bool,
    pub constraint_moq: bool,
    pub constraint_max_stock: bool,
    pub constraint_shelf_life: bool,
    pub constraint_details: String,
    pub simulation_used: bool,

    pub history_valid_days: u32,
    pub oos_days_count: u32,
    pub oos_boost_applied: bool,

    pub error: Option<String>,
    pub notes: String,
}

impl OrderExplain {
    /// A fully zero-filled row for a SKU that failed before any computation
    /// could run, so batch exports never have gaps (spec §4.7/§7).
    pub fn failed(sku: impl Into<String>, asof_date: NaiveDate, reason: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            asof_date,
            receipt_date: asof_date,
            protection_period_days: 0,
            policy_mode: String::new(),
            forecast_method: String::new(),
            intermittent_classifier: String::new(),
            demand_mu_p: 0.0,
            demand_sigma_p: 0.0,
            demand_forecast_method: String::new(),
            demand_mc_n_simulations: 0,
            demand_mc_random_seed: 0,
            demand_mc_distribution: String::new(),
            demand_mc_horizon_days: 0,
            demand_quantiles: HashMap::new(),
            reorder_point: 0.0,
            reorder_point_method: String::new(),
            quantile_used: None,
            csl_alpha_target: 0.0,
            csl_alpha_eff: 0.0,
            csl_z_score: 0.0,
            inventory_position: 0.0,
            on_hand: 0,
            usable_stock: 0.0,
            unusable_stock: 0.0,
            on_order: 0,
            unfulfilled_qty: 0,
            waste_risk_percent: 0.0,
            uplift_factor: 0.0,
            uplift_confidence: String::new(),
            uplift_pooling: String::new(),
            event_m_i: 0.0,
            event_reason: String::new(),
            event_u_store_day: 0.0,
            event_beta_i: 0.0,
            post_promo_factor: 0.0,
            post_promo_dip_factor: 0.0,
            post_promo_cap_applied: false,
            downlift_factor: 0.0,
            downlift_driver_sku: String::new(),
            downlift_confidence: String::new(),
            order_raw: 0.0,
            order_rounded: 0,
            order_final: 0,
            constraint_pack: false,
            constraint_moq: false,
            constraint_max_stock: false,
            constraint_shelf_life: false,
            constraint_details: String::new(),
            simulation_used: false,
            history_valid_days: 0,
            oos_days_count: 0,
            oos_boost_applied: false,
            error: Some(reason.into()),
            notes: String::new(),
        }
    }
}
