//! End-to-end scenarios from spec §8 not already covered by
//! `src/facade.rs`'s S1 unit test: CSL monotonicity with Monte Carlo
//! quantiles (S2), promo uplift (S3), post-promo cooldown (S4),
//! cannibalisation (S5) and the intermittent simulation fallback (S6).

use chrono::{Duration, NaiveDate};

use reorder_core::calendar::{Lane, LogisticsCalendar};
use reorder_core::config::SettingsTree;
use reorder_core::domain::sku::{DemandVariability, ForecastMethodName, MonteCarloOverrides, OosPopupPreference, PolicyMode};
use reorder_core::domain::{EventType, PromoWindow, SalesRecord, Sku, Transaction};
use reorder_core::facade::{propose_order_for_sku, DecisionInputs};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn base_sku(id: &str) -> Sku {
    Sku {
        sku: id.to_string(),
        description: String::new(),
        ean: None,
        in_assortment: true,
        department: "GROCERY".into(),
        category: "SNACKS".into(),
        pack_size: 1,
        moq: 1,
        lead_time_days: 7,
        review_period: 7,
        safety_stock: 0,
        max_stock: 9999,
        reorder_point: 10,
        shelf_life_days: 0,
        has_expiry_label: false,
        demand_variability: DemandVariability::Stable,
        target_csl: 0.0,
        forecast_method_override: None,
        policy_mode_override: None,
        monte_carlo_overrides: MonteCarloOverrides::default(),
        oos_popup_preference: OosPopupPreference::Ask,
    }
}

fn flat_sales(sku: &str, asof: NaiveDate, qty: f64, days: i64) -> Vec<SalesRecord> {
    (1..=days)
        .map(|i| SalesRecord { date: asof - Duration::days(i), sku: sku.to_string(), qty_sold: qty, promo_flag: None })
        .collect()
}

/// Ledger that never dips to zero across the lookback window, so no day is
/// mistaken for strict-OOS censoring.
fn flat_ledger(sku: &str, asof: NaiveDate, qty: f64, days: i64, on_hand_at_asof: i64) -> Vec<Transaction> {
    let start = asof - Duration::days(days);
    let opening = on_hand_at_asof + (qty as i64) * days;
    let mut ledger = vec![Transaction::new(start, sku, EventType::Snapshot, opening)];
    for i in 1..=days {
        ledger.push(Transaction::new(start + Duration::days(i), sku, EventType::Sale, qty as i64));
    }
    ledger
}

/// S2 — CSL with Monte Carlo quantiles: order_final must be monotone
/// non-decreasing as target_csl increases across {0.80, 0.90, 0.95, 0.98}.
#[test]
fn s2_csl_monte_carlo_is_monotone_in_alpha() {
    let asof = d(2026, 2, 18);
    let mut sku = base_sku("SKU002");
    sku.policy_mode_override = Some(PolicyMode::Csl);
    sku.forecast_method_override = Some(ForecastMethodName::MonteCarlo);
    sku.monte_carlo_overrides = MonteCarloOverrides {
        distribution: Some("empirical".into()),
        n_simulations: Some(1000),
        random_seed: Some(42),
    };

    let sales: Vec<SalesRecord> = (1..=60)
        .map(|i| SalesRecord {
            date: asof - Duration::days(i),
            sku: sku.sku.clone(),
            qty_sold: 10.0 + (i % 5) as f64,
            promo_flag: None,
        })
        .collect();
    let ledger = vec![Transaction::new(asof - Duration::days(61), &sku.sku, EventType::Snapshot, 1000)]
        .into_iter()
        .chain(sales.iter().map(|s| Transaction::new(s.date, &s.sku, EventType::Sale, s.qty_sold as i64)))
        .collect::<Vec<_>>();
    let settings = SettingsTree::defaults();
    let calendar = LogisticsCalendar::default();

    let mut last_qty = 0u32;
    for alpha in [0.80, 0.90, 0.95, 0.98] {
        sku.target_csl = alpha;
        let inputs = DecisionInputs {
            all_skus: std::slice::from_ref(&sku),
            ledger: &ledger,
            sales: &sales,
            promo_windows: &[],
            event_rules: &[],
            substitute_groups: &[],
            settings: &settings,
            calendar: &calendar,
        };
        let (proposal, explain) = propose_order_for_sku(&sku, &inputs, Lane::Standard, asof, None);
        assert!(explain.error.is_none());
        assert!(proposal.qty >= last_qty, "alpha={alpha} regressed order qty");
        last_qty = proposal.qty;
    }
}

/// S3 — promo uplift: a SKU with a clean baseline and five historical
/// promo windows at 2x sales should grade SKU-level confidence A (events
/// meets the threshold_a event count) with an uplift factor close to 2.0.
#[test]
fn s3_promo_uplift_is_graded_a_and_lifts_forecast() {
    let asof = d(2026, 4, 1);
    let sku = base_sku("SKU003");

    let mut sales = flat_sales(&sku.sku, asof, 20.0, 60);
    let mut promo_windows = Vec::new();
    for start_offset in [50, 40, 30, 20, 10] {
        let start = asof - Duration::days(start_offset);
        let end = start + Duration::days(4);
        promo_windows.push(PromoWindow { sku: sku.sku.clone(), start_date: start, end_date: end, store_id: None });
        let mut day = start;
        while day <= end {
            sales.retain(|s: &SalesRecord| s.date != day);
            sales.push(SalesRecord { date: day, sku: sku.sku.clone(), qty_sold: 40.0, promo_flag: Some(true) });
            day += Duration::days(1);
        }
    }
    let ledger = flat_ledger(&sku.sku, asof, 20.0, 60, 100);
    let settings = SettingsTree::defaults();
    let calendar = LogisticsCalendar::default();

    let inputs = DecisionInputs {
        all_skus: std::slice::from_ref(&sku),
        ledger: &ledger,
        sales: &sales,
        promo_windows: &promo_windows,
        event_rules: &[],
        substitute_groups: &[],
        settings: &settings,
        calendar: &calendar,
    };
    let (_, explain) = propose_order_for_sku(&sku, &inputs, Lane::Standard, asof, None);
    assert!(explain.error.is_none());
    assert_eq!(explain.uplift_pooling, "SKU");
    assert_eq!(explain.uplift_confidence, "A");
    // Each event's anti-leakage baseline is trained on all sales before its own
    // start date, so earlier promo windows bleed into later events' baselines
    // and pull the ratio below the raw 2x actual/baseline of the first event;
    // 1.1 comfortably bounds the contaminated-baseline floor while still
    // confirming a real uplift was detected (no contamination -> factor 1.0).
    assert!(explain.uplift_factor > 1.1 && explain.uplift_factor < 2.5, "got {}", explain.uplift_factor);
}

/// S4 — post-promo cooldown: a SKU whose receipt date falls inside the
/// post-promo window gets its forecast dampened by the configured cooldown
/// factor and the cap is flagged in the explain record.
#[test]
fn s4_post_promo_cooldown_caps_the_order() {
    let asof = d(2026, 5, 1);
    let mut sku = base_sku("SKU004");
    sku.lead_time_days = 5; // r1 = asof + 5, inside the post-promo cooldown window below

    let promo_windows = vec![PromoWindow {
        sku: sku.sku.clone(),
        start_date: asof - Duration::days(10),
        end_date: asof - Duration::days(1),
        store_id: None,
    }];
    let sales = flat_sales(&sku.sku, asof, 15.0, 60);
    let ledger = flat_ledger(&sku.sku, asof, 15.0, 60, 0);
    let settings = SettingsTree::defaults();
    let calendar = LogisticsCalendar::default();

    let inputs = DecisionInputs {
        all_skus: std::slice::from_ref(&sku),
        ledger: &ledger,
        sales: &sales,
        promo_windows: &promo_windows,
        event_rules: &[],
        substitute_groups: &[],
        settings: &settings,
        calendar: &calendar,
    };
    let (_, explain) = propose_order_for_sku(&sku, &inputs, Lane::Standard, asof, None);
    assert!(explain.error.is_none());
    assert!((explain.post_promo_factor - 0.8).abs() < 1e-9);
    assert!(explain.post_promo_cap_applied);
}

/// S5 — cannibalisation: a driver SKU on promo at r1 depresses the
/// target's demand; the primary driver and a confidence of at least B are
/// reported once enough historical co-occurrence days (three 3-day windows)
/// accumulate past the minimum valid-day threshold.
#[test]
fn s5_cannibalization_applies_primary_driver_downlift() {
    let asof = d(2026, 6, 1);
    let target = base_sku("TARGET");
    let driver = base_sku("DRIVER");
    let substitute_groups = vec![vec![target.sku.clone(), driver.sku.clone()]];

    let r1 = asof + Duration::days(target.lead_time_days as i64);
    let mut promo_windows = vec![PromoWindow { sku: driver.sku.clone(), start_date: r1, end_date: r1, store_id: None }];

    let mut sales = flat_sales(&target.sku, asof, 20.0, 60);
    for start_offset in [40, 25, 10] {
        let start = asof - Duration::days(start_offset);
        let end = start + Duration::days(2);
        promo_windows.push(PromoWindow { sku: driver.sku.clone(), start_date: start, end_date: end, store_id: None });
        let mut day = start;
        while day <= end {
            sales.retain(|s: &SalesRecord| !(s.sku == target.sku && s.date == day));
            sales.push(SalesRecord { date: day, sku: target.sku.clone(), qty_sold: 12.0, promo_flag: None });
            day += Duration::days(1);
        }
    }
    sales.extend(flat_sales(&driver.sku, asof, 10.0, 60));

    let ledger = flat_ledger(&target.sku, asof, 20.0, 60, 100);
    let settings = SettingsTree::defaults();
    let calendar = LogisticsCalendar::default();
    let all_skus = vec![target.clone(), driver.clone()];

    let inputs = DecisionInputs {
        all_skus: &all_skus,
        ledger: &ledger,
        sales: &sales,
        promo_windows: &promo_windows,
        event_rules: &[],
        substitute_groups: &substitute_groups,
        settings: &settings,
        calendar: &calendar,
    };
    let (_, explain) = propose_order_for_sku(&target, &inputs, Lane::Standard, asof, None);
    assert!(explain.error.is_none());
    assert_eq!(explain.downlift_driver_sku, driver.sku);
    assert!(explain.downlift_factor < 1.0);
    assert!(explain.downlift_confidence == "B" || explain.downlift_confidence == "A");
}

/// S6 — intermittent demand: sparse nonzero history (ADI well above the
/// classifier threshold) selects an intermittent method and the day-by-day
/// simulation fallback rather than the linear horizon formula.
#[test]
fn s6_intermittent_demand_uses_simulation_fallback() {
    let asof = d(2026, 7, 1);
    let mut sku = base_sku("SKU006");
    sku.pack_size = 5;
    sku.forecast_method_override = Some(ForecastMethodName::IntermittentAuto);

    let mut sales = Vec::new();
    let mut ledger = vec![Transaction::new(asof - Duration::days(91), &sku.sku, EventType::Snapshot, 200)];
    for i in 1..=90 {
        let date = asof - Duration::days(i);
        if i % 11 == 0 {
            sales.push(SalesRecord { date, sku: sku.sku.clone(), qty_sold: 3.0, promo_flag: None });
            ledger.push(Transaction::new(date, &sku.sku, EventType::Sale, 3));
        }
    }
    let settings = SettingsTree::defaults();
    let calendar = LogisticsCalendar::default();

    let inputs = DecisionInputs {
        all_skus: std::slice::from_ref(&sku),
        ledger: &ledger,
        sales: &sales,
        promo_windows: &[],
        event_rules: &[],
        substitute_groups: &[],
        settings: &settings,
        calendar: &calendar,
    };
    let (proposal, explain) = propose_order_for_sku(&sku, &inputs, Lane::Standard, asof, None);
    assert!(explain.error.is_none());
    assert!(explain.demand_mu_p >= 0.0);
    assert!(
        ["croston", "sba", "tsb"].contains(&explain.forecast_method.as_str()),
        "expected an intermittent method, got {}",
        explain.forecast_method
    );
    assert_eq!(explain.intermittent_classifier, explain.forecast_method);
    assert!(explain.simulation_used, "expected the day-by-day simulation fallback to run");
    assert_eq!(proposal.qty % sku.pack_size, 0);
}
