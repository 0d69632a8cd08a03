//! `propose_order_for_sku` / `explain_order` / `propose_orders_batch`: the
//! orchestration facade. Each SKU's decision runs independently — one bad
//! SKU never corrupts the rest of a batch.

use chrono::{Duration, NaiveDate};
use tracing::{instrument, warn};

use crate::calendar::{Lane, LogisticsCalendar};
use crate::config::SettingsTree;
use crate::constraints::{self, PendingReceipt};
use crate::domain::sku::ForecastMethodName;
use crate::domain::{EventUpliftRule, OrderExplain, OrderProposal, PromoWindow, SalesRecord, Sku, Transaction};
use crate::error::{CoreError, CoreResult};
use crate::forecast::{self, ForecastInput, HistoryPoint};
use crate::ledger::StockCalculator;
use crate::modifiers;
use crate::policy;

/// Every read-only collaborator collection the core consumes, loaded once
/// per batch — callers are expected to load these once, not re-scan per SKU.
pub struct DecisionInputs<'a> {
    pub all_skus: &'a [Sku],
    pub ledger: &'a [Transaction],
    pub sales: &'a [SalesRecord],
    pub promo_windows: &'a [PromoWindow],
    pub event_rules: &'a [EventUpliftRule],
    pub substitute_groups: &'a [Vec<String>],
    pub settings: &'a SettingsTree,
    pub calendar: &'a LogisticsCalendar,
}

/// `propose_order_for_sku`: decides how many units of `sku` to order today
/// (`asof`) for delivery on the resolved receipt date. Never panics and
/// never propagates a `CoreError` to the caller — any internal failure is
/// folded into a zero-quantity proposal and a fully zero-filled explain row,
/// so a batch of SKUs can always produce one row each.
#[instrument(skip(inputs), fields(sku = %sku.sku))]
pub fn propose_order_for_sku(
    sku: &Sku,
    inputs: &DecisionInputs,
    lane: Lane,
    asof: NaiveDate,
    receipt_override: Option<NaiveDate>,
) -> (OrderProposal, OrderExplain) {
    match try_propose(sku, inputs, lane, asof, receipt_override) {
        Ok(pair) => pair,
        Err(err) => {
            warn!(sku = %sku.sku, error = %err, "reorder decision failed, proposing zero");
            (
                OrderProposal::failed(&sku.sku, asof, err.reason()),
                OrderExplain::failed(&sku.sku, asof, err.reason()),
            )
        }
    }
}

/// Same orchestration, explain-only. Used by batch export: callers that
/// only need the audit trail (not the proposal) skip building the unused
/// half of the pair.
pub fn explain_order(
    sku: &Sku,
    inputs: &DecisionInputs,
    lane: Lane,
    asof: NaiveDate,
    receipt_override: Option<NaiveDate>,
) -> OrderExplain {
    propose_order_for_sku(sku, inputs, lane, asof, receipt_override).1
}

/// Batch entry point: iterates every in-assortment SKU sequentially. One
/// failing SKU never aborts the batch. Out-of-assortment SKUs are skipped
/// entirely — they never receive a proposal.
pub fn propose_orders_batch(
    skus: &[Sku],
    inputs: &DecisionInputs,
    lane: Lane,
    asof: NaiveDate,
) -> Vec<(OrderProposal, OrderExplain)> {
    skus.iter()
        .filter(|s| s.in_assortment)
        .map(|s| propose_order_for_sku(s, inputs, lane, asof, None))
        .collect()
}

fn try_propose(
    sku: &Sku,
    inputs: &DecisionInputs,
    lane: Lane,
    asof: NaiveDate,
    receipt_override: Option<NaiveDate>,
) -> CoreResult<(OrderProposal, OrderExplain)> {
    let global_lead_time = inputs.settings.get_u32("reorder_engine", "lead_time_days", 7);
    let lead_time = sku.effective_lead_time_days(global_lead_time);

    let (r1, protection_days) =
        inputs
            .calendar
            .resolve_receipt_and_protection(asof, lane, lead_time, receipt_override)?;

    let calc = StockCalculator::new(&sku.sku, inputs.ledger)?;
    let stock = calc.stock_asof(asof)?;

    let lookback_days = inputs.settings.get_u32("reorder_engine", "oos_lookback_days", 30) as i64;
    let (history, oos_days_count, history_valid_days) =
        build_history(sku, inputs.sales, &calc, asof, lookback_days, inputs.settings)?;
    let censored_day_ratio = if lookback_days > 0 {
        oos_days_count as f64 / lookback_days as f64
    } else {
        0.0
    };

    let method = resolve_forecast_method(sku, inputs.settings);
    let forecast_input = ForecastInput {
        history: &history,
        horizon_start: asof + Duration::days(1),
        horizon_days: protection_days,
        asof,
    };
    let forecast_result = forecast::forecast(method, &forecast_input, inputs.settings)?;

    let chain = modifiers::apply_chain(
        forecast_result.mu_p,
        sku,
        inputs.all_skus,
        r1,
        inputs.promo_windows,
        inputs.event_rules,
        inputs.substitute_groups,
        inputs.sales,
        inputs.ledger,
        inputs.settings,
        asof,
    );
    let mu_p_adjusted = chain.mu_p_adjusted;
    let sigma_p_adjusted = forecast_result.sigma_p;

    let (policy_mode, policy_result) = policy::compute_policy(
        sku,
        mu_p_adjusted,
        sigma_p_adjusted,
        &forecast_result.quantiles,
        censored_day_ratio,
        inputs.settings,
    );
    let oos_boost_applied = (policy_result.csl_alpha_eff - policy_result.csl_alpha_target).abs() > 1e-9;

    let mu_daily = if protection_days > 0 { mu_p_adjusted / protection_days as f64 } else { 0.0 };
    let pending: Vec<PendingReceipt> = calc
        .pending_receipts_asof(asof)
        .into_iter()
        .map(|(qty, receipt_date)| PendingReceipt { qty, receipt_date })
        .collect();

    let days_to_r1 = (r1 - asof).num_days().max(0) as f64;
    let expected_demand_before_r1 = mu_daily * days_to_r1;

    let usable = constraints::usable_stock_at_r1(sku, stock.on_hand as f64, &[], &pending, r1, protection_days);
    let ip_at_r1 = constraints::inventory_position_at_r1(
        usable.usable,
        &pending,
        r1,
        expected_demand_before_r1,
        stock.unfulfilled_qty as f64,
    );

    let order_raw = (policy_result.reorder_point - ip_at_r1).max(0.0);
    let simulation_used = constraints::should_simulate(order_raw, mu_daily, sku.pack_size);
    let pre_constraint_qty = if simulation_used {
        let simulated = constraints::simulate_intermittent_order(ip_at_r1, mu_daily, sku.pack_size, protection_days);
        simulated as f64
    } else {
        order_raw
    };

    let post_promo_absolute_cap = inputs
        .settings
        .get("post_promo_guardrail", "absolute_qty_cap")
        .and_then(|v| v.as_f64());

    let (order_final, constraint_report) = constraints::apply_constraints(
        sku,
        pre_constraint_qty,
        ip_at_r1,
        mu_daily,
        usable.waste_risk_percent,
        inputs.settings,
        chain.post_promo.cap_applied,
        post_promo_absolute_cap,
    );

    let order_rounded = constraints::round_to_pack_and_moq(pre_constraint_qty, sku.pack_size.max(1), sku.moq.max(1));

    let notes = constraint_report.details_joined();

    let proposal = OrderProposal {
        sku: sku.sku.clone(),
        qty: order_final,
        receipt_date: r1,
        notes: notes.clone(),
        error: None,
    };

    let intermittent_classifier = if forecast_result.meta.auto_selected {
        forecast_result.method.clone()
    } else {
        String::new()
    };

    let explain = OrderExplain {
        sku: sku.sku.clone(),
        asof_date: asof,
        receipt_date: r1,
        protection_period_days: protection_days,
        policy_mode,
        forecast_method: forecast_result.method.clone(),
        intermittent_classifier,

        demand_mu_p: forecast_result.mu_p,
        demand_sigma_p: forecast_result.sigma_p,
        demand_forecast_method: forecast_result.method.clone(),
        demand_mc_n_simulations: forecast_result
            .meta
            .seed
            .map(|_| inputs.settings.get_u32("monte_carlo", "n_simulations", 1000))
            .unwrap_or(0),
        demand_mc_random_seed: forecast_result.meta.seed.unwrap_or(0),
        demand_mc_distribution: forecast_result.meta.distribution.clone().unwrap_or_default(),
        demand_mc_horizon_days: if forecast_result.meta.seed.is_some() { protection_days } else { 0 },
        demand_quantiles: forecast_result
            .quantiles
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect(),

        reorder_point: policy_result.reorder_point,
        reorder_point_method: policy_result.reorder_point_method,
        quantile_used: policy_result.quantile_used,
        csl_alpha_target: policy_result.csl_alpha_target,
        csl_alpha_eff: policy_result.csl_alpha_eff,
        csl_z_score: policy_result.csl_z_score,

        inventory_position: ip_at_r1,
        on_hand: stock.on_hand,
        usable_stock: usable.usable,
        unusable_stock: usable.unusable,
        on_order: stock.on_order,
        unfulfilled_qty: stock.unfulfilled_qty,
        waste_risk_percent: usable.waste_risk_percent,

        uplift_factor: chain.uplift.uplift_factor,
        uplift_confidence: chain.uplift.confidence,
        uplift_pooling: chain.uplift.pooling_source,

        event_m_i: chain.event.m_i,
        event_reason: chain.event.reason,
        event_u_store_day: chain.event.u_store_day,
        event_beta_i: chain.event.beta_i,

        post_promo_factor: chain.post_promo.factor,
        post_promo_dip_factor: chain.post_promo.dip_factor,
        post_promo_cap_applied: chain.post_promo.cap_applied,

        downlift_factor: chain.downlift.factor,
        downlift_driver_sku: chain.downlift.driver_sku,
        downlift_confidence: chain.downlift.confidence,

        order_raw,
        order_rounded,
        order_final,

        constraint_pack: constraint_report.pack_applied,
        constraint_moq: constraint_report.moq_applied,
        constraint_max_stock: constraint_report.max_stock_applied,
        constraint_shelf_life: constraint_report.shelf_life_applied,
        constraint_details: notes,
        simulation_used,

        history_valid_days,
        oos_days_count,
        oos_boost_applied,

        error: None,
        notes: String::new(),
    };

    Ok((proposal, explain))
}

fn resolve_forecast_method(sku: &Sku, settings: &SettingsTree) -> ForecastMethodName {
    if let Some(m) = sku.forecast_method_override {
        return m;
    }
    match settings.get_str("reorder_engine", "forecast_method", "simple").as_str() {
        "monte_carlo" => ForecastMethodName::MonteCarlo,
        "croston" => ForecastMethodName::Croston,
        "sba" => ForecastMethodName::Sba,
        "tsb" => ForecastMethodName::Tsb,
        "intermittent_auto" => ForecastMethodName::IntermittentAuto,
        _ => ForecastMethodName::Simple,
    }
}

/// Builds the date-indexed history the forecast engine consumes: one
/// `HistoryPoint` per calendar day over the history window, not one per
/// `SalesRecord`. Real demand data has no row on no-sale days, and the
/// ADI/CV² classifier and Croston/SBA/TSB interval estimation need those
/// gaps materialized as explicit zero-qty days — a sparse, sales-only
/// history collapses every no-sale day out of the series and makes
/// intermittency structurally unobservable.
///
/// The window spans from `max(oos_lookback_days, intermittent_forecast
/// .lookback_days, service_level.lookback_days)` days before `asof` through
/// `asof - 1`. Also returns `(oos_days, valid_days)` over the narrower
/// trailing `lookback_days` window, used for the CSL censoring boost and
/// the explain record.
fn build_history(
    sku: &Sku,
    sales: &[SalesRecord],
    calc: &StockCalculator,
    asof: NaiveDate,
    lookback_days: i64,
    settings: &SettingsTree,
) -> CoreResult<(Vec<HistoryPoint>, u32, u32)> {
    let intermittent_lookback = settings.get_u32("intermittent_forecast", "lookback_days", 180) as i64;
    let service_level_lookback = settings.get_u32("service_level", "lookback_days", 90) as i64;
    let history_window_days = lookback_days.max(intermittent_lookback).max(service_level_lookback);
    let history_start = asof - Duration::days(history_window_days);
    let lookback_start = asof - Duration::days(lookback_days);

    let mut qty_by_date: std::collections::HashMap<NaiveDate, f64> = std::collections::HashMap::new();
    for s in sales
        .iter()
        .filter(|s| s.sku == sku.sku && s.date >= history_start && s.date < asof)
    {
        *qty_by_date.entry(s.date).or_insert(0.0) += s.qty_sold;
    }

    let mut history = Vec::new();
    let mut oos_days_count = 0_u32;
    let mut valid_days = 0_u32;

    let mut date = history_start;
    while date < asof {
        let qty = qty_by_date.get(&date).copied().unwrap_or(0.0);
        let censored = calc.is_day_censored(date).unwrap_or_else(|e| {
            warn!(sku = %sku.sku, date = %date, error = %e, "censoring check failed, treating day as censored");
            true
        });
        history.push(HistoryPoint { date, qty, censored });
        if date >= lookback_start {
            if censored {
                oos_days_count += 1;
            } else {
                valid_days += 1;
            }
        }
        date += Duration::days(1);
    }
    Ok((history, oos_days_count, valid_days))
}
