//! Constraints, shelf-life and inventory position: inventory position at
//! `r1`, usable-stock/FEFO estimation, pack/MOQ rounding, caps (max-stock,
//! shelf-life, post-promo absolute), waste penalty, and the
//! intermittent-demand day-by-day simulation fallback.

use chrono::{Duration, NaiveDate};

use crate::config::SettingsTree;
use crate::domain::Sku;

/// A batch of received units sharing an expiry date.
#[derive(Debug, Clone, Copy)]
pub struct Lot {
    pub qty: f64,
    pub expiry_date: NaiveDate,
}

/// An open purchase order arriving on or before some date.
#[derive(Debug, Clone, Copy)]
pub struct PendingReceipt {
    pub qty: f64,
    pub receipt_date: NaiveDate,
}

/// Inventory position at `r1`: on-hand plus in-transit qty expected by `r1`,
/// minus expected demand over `[asof+1, r1]`, minus current unfulfilled qty.
/// Floored at zero: a position is never reported as negative physical stock
/// (on_hand 50 minus 7x10 expected demand reports as 0, not -20).
pub fn inventory_position_at_r1(
    on_hand: f64,
    pending: &[PendingReceipt],
    r1: NaiveDate,
    expected_demand_before_r1: f64,
    unfulfilled_qty: f64,
) -> f64 {
    let in_transit: f64 = pending.iter().filter(|p| p.receipt_date <= r1).map(|p| p.qty).sum();
    (on_hand + in_transit - expected_demand_before_r1 - unfulfilled_qty).max(0.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UsableStockResult {
    pub usable: f64,
    pub unusable: f64,
    pub waste_risk_percent: f64,
}

/// Usable stock at `r1` for perishable SKUs: subtracts lots whose expiry
/// falls at or before the mid-point of the protection window. Uses tracked
/// lots when `has_expiry_label` is true; otherwise estimates FIFO lots from
/// each pending receipt's `receipt_date + shelf_life_days`.
pub fn usable_stock_at_r1(
    sku: &Sku,
    on_hand: f64,
    tracked_lots: &[Lot],
    receipt_history: &[PendingReceipt],
    r1: NaiveDate,
    protection_days: u32,
) -> UsableStockResult {
    if !sku.is_perishable() {
        return UsableStockResult { usable: on_hand, unusable: 0.0, waste_risk_percent: 0.0 };
    }

    let midpoint = r1 + Duration::days((protection_days as i64) / 2);

    let lots: Vec<Lot> = if sku.has_expiry_label && !tracked_lots.is_empty() {
        tracked_lots.to_vec()
    } else {
        receipt_history
            .iter()
            .map(|r| Lot { qty: r.qty, expiry_date: r.receipt_date + Duration::days(sku.shelf_life_days as i64) })
            .collect()
    };

    if lots.is_empty() {
        return UsableStockResult { usable: on_hand, unusable: 0.0, waste_risk_percent: 0.0 };
    }

    let tracked_total: f64 = lots.iter().map(|l| l.qty).sum();
    let expiring_before_midpoint: f64 = lots.iter().filter(|l| l.expiry_date <= midpoint).map(|l| l.qty).sum();

    // Scale the tracked-lot split onto the actual on_hand (tracked lots may
    // not sum to exactly on_hand when reconstructed from receipt history).
    let scale = if tracked_total > 0.0 { on_hand / tracked_total } else { 0.0 };
    let unusable = (expiring_before_midpoint * scale).min(on_hand);
    let usable = (on_hand - unusable).max(0.0);
    let waste_risk_percent = if on_hand > 0.0 { (unusable / on_hand) * 100.0 } else { 0.0 };

    UsableStockResult { usable, unusable, waste_risk_percent }
}

/// Rounds `qty_raw` up to the nearest multiple of `pack_size`, then bumps to
/// `moq` if still below it. `qty_raw == 0` always rounds to 0.
pub fn round_to_pack_and_moq(qty_raw: f64, pack_size: u32, moq: u32) -> u32 {
    if qty_raw <= 0.0 {
        return 0;
    }
    let pack_size = pack_size.max(1) as f64;
    let packs = (qty_raw / pack_size).ceil();
    let rounded = (packs * pack_size) as u32;
    rounded.max(moq)
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintReport {
    pub pack_applied: bool,
    pub moq_applied: bool,
    pub max_stock_applied: bool,
    pub shelf_life_applied: bool,
    pub post_promo_cap_applied: bool,
    pub waste_penalty_applied: bool,
    pub simulation_used: bool,
    pub details: Vec<String>,
}

impl ConstraintReport {
    fn note(&mut self, msg: impl Into<String>) {
        self.details.push(msg.into());
    }

    pub fn details_joined(&self) -> String {
        self.details.join("; ")
    }
}

/// Caps `q` so that `ip_at_r1 + q <= max_stock`.
fn apply_max_stock_cap(q: u32, ip_at_r1: f64, max_stock: u32, report: &mut ConstraintReport) -> u32 {
    let headroom = (max_stock as f64 - ip_at_r1).max(0.0);
    if (q as f64) > headroom {
        report.max_stock_applied = true;
        report.note(format!("max_stock cap: {q} -> {}", headroom.floor() as u32));
        headroom.floor() as u32
    } else {
        q
    }
}

/// Caps `q` to `mu_daily * shelf_life_days` when the SKU is perishable.
fn apply_shelf_life_cap(q: u32, mu_daily: f64, shelf_life_days: u32, report: &mut ConstraintReport) -> u32 {
    if shelf_life_days == 0 {
        return q;
    }
    let cap = (mu_daily * shelf_life_days as f64).floor().max(0.0) as u32;
    if q > cap {
        report.shelf_life_applied = true;
        report.note(format!("shelf_life cap: {q} -> {cap} (S would have exceeded carrying capacity)"));
        cap
    } else {
        q
    }
}

/// Waste penalty: soft (multiplicative reduction) or hard (subtract a fixed
/// quantity, floor at 0) when `waste_risk_percent` exceeds the threshold.
fn apply_waste_penalty(q: u32, waste_risk_percent: f64, settings: &SettingsTree, report: &mut ConstraintReport) -> u32 {
    let threshold = settings.get_f64("shelf_life_policy", "waste_risk_threshold", 20.0);
    if waste_risk_percent <= threshold {
        return q;
    }
    report.waste_penalty_applied = true;
    let mode = settings.get_str("shelf_life_policy", "waste_penalty_mode", "soft");
    if mode == "hard" {
        let fixed = settings.get_f64("shelf_life_policy", "waste_penalty_factor", 0.5) * q as f64;
        let reduced = (q as f64 - fixed).max(0.0).floor() as u32;
        report.note(format!("hard waste penalty: {q} -> {reduced}"));
        reduced
    } else {
        let factor = settings.get_f64("shelf_life_policy", "waste_penalty_factor", 0.5);
        let reduced = ((q as f64) * factor).floor().max(0.0) as u32;
        report.note(format!("soft waste penalty (x{factor}): {q} -> {reduced}"));
        reduced
    }
}

/// Day-by-day simulation fallback for the intermittent special case: when
/// `q_raw` is small and pack_size is comparable to several days of demand,
/// order one pack whenever projected inventory position would dip below one
/// pack within `[asof+1, r1+P]`.
pub fn simulate_intermittent_order(
    ip_start: f64,
    mu_daily: f64,
    pack_size: u32,
    horizon_days: u32,
) -> u32 {
    let pack = pack_size.max(1) as f64;
    let mut ip = ip_start;
    let mut ordered_packs = 0_u32;
    for _ in 0..horizon_days {
        ip -= mu_daily;
        if ip < pack {
            ip += pack;
            ordered_packs += 1;
        }
    }
    ordered_packs * pack_size
}

/// True when the linear horizon formula is expected to under-order: demand
/// is sparse (`q_raw` small relative to one pack) and the pack itself covers
/// several days of demand.
pub fn should_simulate(q_raw: f64, mu_daily: f64, pack_size: u32) -> bool {
    if mu_daily <= 0.0 {
        return false;
    }
    let pack_days_cover = pack_size as f64 / mu_daily;
    q_raw < pack_size as f64 && pack_days_cover >= 3.0
}

#[allow(clippy::too_many_arguments)]
pub fn apply_constraints(
    sku: &Sku,
    q_raw: f64,
    ip_at_r1: f64,
    mu_daily: f64,
    waste_risk_percent: f64,
    settings: &SettingsTree,
    post_promo_cap_applied_by_modifier: bool,
    post_promo_absolute_cap: Option<f64>,
) -> (u32, ConstraintReport) {
    let mut report = ConstraintReport::default();

    if sku.pack_size == 0 || sku.moq == 0 {
        report.note("pack_size or moq is zero: treating as unconfigured, ordering 0".to_string());
        return (0, report);
    }

    let mut q = round_to_pack_and_moq(q_raw, sku.pack_size, sku.moq);
    if q_raw > 0.0 {
        let pack_only = ((q_raw / sku.pack_size.max(1) as f64).ceil() as u32) * sku.pack_size.max(1);
        report.pack_applied = q != q_raw.round() as u32;
        if q > pack_only {
            report.moq_applied = true;
            report.note(format!("moq bump: {pack_only} -> {q}"));
        }
    }

    q = apply_max_stock_cap(q, ip_at_r1, sku.max_stock, &mut report);
    q = apply_shelf_life_cap(q, mu_daily, sku.shelf_life_days, &mut report);

    if post_promo_cap_applied_by_modifier {
        if let Some(cap) = post_promo_absolute_cap {
            if (q as f64) > cap {
                report.post_promo_cap_applied = true;
                report.note(format!("post-promo absolute cap: {q} -> {}", cap.floor() as u32));
                q = cap.floor().max(0.0) as u32;
            }
        }
    }

    let enable_waste = settings.get_bool("shelf_life_policy", "enabled", true);
    if enable_waste && sku.is_perishable() {
        q = apply_waste_penalty(q, waste_risk_percent, settings, &mut report);
    }

    (q, report)
}
