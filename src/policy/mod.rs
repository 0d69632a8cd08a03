//! Reorder-point policy: legacy (forecast + safety) or CSL (service-level
//! target via empirical quantile or z-score fallback), per spec §4.5.
//! `inverse_normal_cdf` is ported from the teacher's Newsvendor
//! `optimization.rs` (Abramowitz & Stegun 26.2.23).

use std::collections::BTreeMap;

use crate::config::SettingsTree;
use crate::domain::sku::{DemandVariability, PolicyMode};
use crate::domain::Sku;

#[derive(Debug, Clone)]
pub struct PolicyResult {
    pub reorder_point: f64,
    pub reorder_point_method: String,
    pub quantile_used: Option<f64>,
    pub csl_alpha_target: f64,
    pub csl_alpha_eff: f64,
    pub csl_z_score: f64,
}

/// Abramowitz & Stegun 26.2.23 approximate inverse standard-normal CDF.
/// Absolute error < 4.5e-4.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p >= 1.0 {
        return 5.0;
    }
    if p <= 0.0 {
        return -5.0;
    }
    if p == 0.5 {
        return 0.0;
    }

    let q = if p < 0.5 { p } else { 1.0 - p };
    let t = (-2.0 * q.ln()).sqrt();

    let c0 = 2.515517;
    let c1 = 0.802853;
    let c2 = 0.010328;
    let d1 = 1.432788;
    let d2 = 0.189269;
    let d3 = 0.001308;

    let numerator = c0 + c1 * t + c2 * t * t;
    let denominator = 1.0 + d1 * t + d2 * t * t + d3 * t * t * t;
    let x = t - (numerator / denominator);

    if p < 0.5 {
        -x
    } else {
        x
    }
}

/// Cluster CSL resolver: variability picks the base cluster value,
/// perishability is then applied as an override on top, per the resolved
/// Open Question (§9, kept in that order in DESIGN.md).
pub fn resolve_cluster_csl(sku: &Sku, settings: &SettingsTree) -> f64 {
    let mut csl = match sku.demand_variability {
        DemandVariability::Stable => settings.get_f64("service_level", "cluster_csl_stable", 0.90),
        DemandVariability::Low => settings.get_f64("service_level", "cluster_csl_low", 0.85),
        DemandVariability::High => settings.get_f64("service_level", "cluster_csl_high", 0.95),
        DemandVariability::Seasonal => settings.get_f64("service_level", "cluster_csl_seasonal", 0.93),
    };
    if sku.is_perishable() {
        csl = settings.get_f64("service_level", "cluster_csl_perishable", 0.90);
    }
    csl
}

fn quantile_near(quantiles: &BTreeMap<String, f64>, alpha: f64) -> Option<(f64, f64)> {
    quantiles
        .iter()
        .filter_map(|(k, v)| k.parse::<f64>().ok().map(|level| (level, *v)))
        .min_by(|(a, _), (b, _)| (a - alpha).abs().partial_cmp(&(b - alpha).abs()).unwrap())
        .filter(|(level, _)| (level - alpha).abs() <= 0.01)
}

/// Computes the reorder point S from the modifier-adjusted demand
/// distribution. Returns `(policy_mode, PolicyResult)` where
/// `policy_mode` is the resolved mode name ("legacy" or "csl").
pub fn compute_policy(
    sku: &Sku,
    mu_p_adjusted: f64,
    sigma_p_adjusted: f64,
    quantiles: &BTreeMap<String, f64>,
    censored_day_ratio: f64,
    settings: &SettingsTree,
) -> (String, PolicyResult) {
    let mode = sku.policy_mode_override.unwrap_or_else(|| {
        match settings.get_str("reorder_engine", "policy_mode", "legacy").as_str() {
            "csl" => PolicyMode::Csl,
            _ => PolicyMode::Legacy,
        }
    });

    match mode {
        PolicyMode::Legacy => {
            let safety_stock = settings.get_f64("reorder_engine", "safety_stock", sku.safety_stock as f64);
            let reorder_point = mu_p_adjusted + safety_stock;
            (
                "legacy".to_string(),
                PolicyResult {
                    reorder_point,
                    reorder_point_method: "legacy".to_string(),
                    quantile_used: None,
                    csl_alpha_target: 0.0,
                    csl_alpha_eff: 0.0,
                    csl_z_score: 0.0,
                },
            )
        }
        PolicyMode::Csl => {
            let alpha_target = if sku.target_csl > 0.0 {
                sku.target_csl
            } else {
                resolve_cluster_csl(sku, settings)
            };

            let min_csl = settings.get_f64("closed_loop", "min_csl_absolute", 0.50);
            let max_csl = settings.get_f64("closed_loop", "max_csl_absolute", 0.995);
            let oos_boost_percent = settings.get_f64("reorder_engine", "oos_boost_percent", 0.0);
            let boost_step = oos_boost_percent / 100.0;
            let alpha_eff = (alpha_target + censored_day_ratio * 100.0 * boost_step).clamp(min_csl, max_csl);

            if let Some((level, value)) = quantile_near(quantiles, alpha_eff) {
                (
                    "csl".to_string(),
                    PolicyResult {
                        reorder_point: value,
                        reorder_point_method: "quantile".to_string(),
                        quantile_used: Some(level),
                        csl_alpha_target: alpha_target,
                        csl_alpha_eff: alpha_eff,
                        csl_z_score: 0.0,
                    },
                )
            } else {
                let z = inverse_normal_cdf(alpha_eff);
                let reorder_point = mu_p_adjusted + z * sigma_p_adjusted;
                (
                    "csl".to_string(),
                    PolicyResult {
                        reorder_point: reorder_point.max(0.0),
                        reorder_point_method: "zscore".to_string(),
                        quantile_used: None,
                        csl_alpha_target: alpha_target,
                        csl_alpha_eff: alpha_eff,
                        csl_z_score: z,
                    },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sku::tests::sample_sku;

    #[test]
    fn legacy_mode_adds_safety_stock() {
        let mut sku = sample_sku();
        sku.policy_mode_override = Some(PolicyMode::Legacy);
        sku.safety_stock = 20;
        let settings = SettingsTree::defaults();
        let (mode, result) = compute_policy(&sku, 70.0, 10.0, &BTreeMap::new(), 0.0, &settings);
        assert_eq!(mode, "legacy");
        assert_eq!(result.reorder_point, 90.0);
    }

    #[test]
    fn csl_without_quantiles_uses_zscore_fallback() {
        let mut sku = sample_sku();
        sku.policy_mode_override = Some(PolicyMode::Csl);
        sku.target_csl = 0.95;
        let settings = SettingsTree::defaults();
        let (mode, result) = compute_policy(&sku, 100.0, 10.0, &BTreeMap::new(), 0.0, &settings);
        assert_eq!(mode, "csl");
        assert_eq!(result.reorder_point_method, "zscore");
        assert!(result.reorder_point > 100.0);
    }

    #[test]
    fn increasing_alpha_is_monotone_non_decreasing() {
        let mut sku = sample_sku();
        sku.policy_mode_override = Some(PolicyMode::Csl);
        let settings = SettingsTree::defaults();
        let mut last = 0.0;
        for alpha in [0.80, 0.90, 0.95, 0.98] {
            sku.target_csl = alpha;
            let (_, result) = compute_policy(&sku, 100.0, 10.0, &BTreeMap::new(), 0.0, &settings);
            assert!(result.reorder_point >= last);
            last = result.reorder_point;
        }
    }

    #[test]
    fn quantile_near_target_alpha_is_used_directly() {
        let mut sku = sample_sku();
        sku.policy_mode_override = Some(PolicyMode::Csl);
        sku.target_csl = 0.95;
        let mut quantiles = BTreeMap::new();
        quantiles.insert("0.95".to_string(), 123.0);
        let settings = SettingsTree::defaults();
        let (_, result) = compute_policy(&sku, 100.0, 10.0, &quantiles, 0.0, &settings);
        assert_eq!(result.reorder_point_method, "quantile");
        assert_eq!(result.reorder_point, 123.0);
    }
}
