//! Settings tree: a nested map of values, not types. The core reads leaves
//! by dotted path with a caller-supplied default, the way a config leaf is
//! looked up rather than modelled as a dedicated struct per section — so
//! adding a leaf is a data change, not a code change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One leaf of the settings tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingLeaf {
    pub value: Value,
    #[serde(default)]
    pub auto_apply_to_new_sku: bool,
    #[serde(default)]
    pub description: String,
}

/// A section is a flat map of leaf name to leaf; the tree is a map of
/// section name to section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsTree {
    pub sections: HashMap<String, HashMap<String, SettingLeaf>>,
}

impl SettingsTree {
    pub fn get(&self, section: &str, leaf: &str) -> Option<&Value> {
        self.sections.get(section)?.get(leaf).map(|l| &l.value)
    }

    pub fn get_f64(&self, section: &str, leaf: &str, default: f64) -> f64 {
        self.get(section, leaf).and_then(Value::as_f64).unwrap_or(default)
    }

    pub fn get_u32(&self, section: &str, leaf: &str, default: u32) -> u32 {
        self.get(section, leaf)
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(default)
    }

    pub fn get_u64(&self, section: &str, leaf: &str, default: u64) -> u64 {
        self.get(section, leaf).and_then(Value::as_u64).unwrap_or(default)
    }

    pub fn get_bool(&self, section: &str, leaf: &str, default: bool) -> bool {
        self.get(section, leaf).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn get_str(&self, section: &str, leaf: &str, default: &str) -> String {
        self.get(section, leaf)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    /// Factory-default tree, with every leaf's documented default value.
    /// Used when no settings repository row exists yet, and as the
    /// baseline that per-section accessors layer overrides onto.
    pub fn defaults() -> Self {
        let mut sections: HashMap<String, HashMap<String, SettingLeaf>> = HashMap::new();

        sections.insert(
            "reorder_engine".into(),
            leaves(&[
                ("lead_time_days", Value::from(7)),
                ("moq", Value::from(1)),
                ("pack_size", Value::from(1)),
                ("review_period", Value::from(7)),
                ("safety_stock", Value::from(0)),
                ("max_stock", Value::from(999)),
                ("reorder_point", Value::from(10)),
                ("demand_variability", Value::from("STABLE")),
                ("forecast_method", Value::from("simple")),
                ("policy_mode", Value::from("legacy")),
                ("oos_boost_percent", Value::from(0)),
                ("oos_lookback_days", Value::from(30)),
                ("oos_detection_mode", Value::from("strict")),
            ]),
        );

        sections.insert(
            "monte_carlo".into(),
            leaves(&[
                ("distribution", Value::from("empirical")),
                ("n_simulations", Value::from(1000)),
                ("random_seed", Value::from(42)),
                ("output_stat", Value::from("mean")),
                ("output_percentile", Value::from(0.95)),
                ("horizon_mode", Value::from("auto")),
                ("horizon_days", Value::from(7)),
                ("show_comparison", Value::from(false)),
            ]),
        );

        sections.insert(
            "intermittent_forecast".into(),
            leaves(&[
                ("enabled", Value::from(true)),
                ("adi_threshold", Value::from(1.32)),
                ("cv2_threshold", Value::from(0.49)),
                ("alpha_default", Value::from(0.1)),
                ("lookback_days", Value::from(180)),
                ("min_nonzero_observations", Value::from(5)),
                ("backtest_enabled", Value::from(false)),
                ("backtest_periods", Value::from(8)),
                ("backtest_metric", Value::from("wmape")),
                ("default_method", Value::from("croston")),
                ("fallback_to_simple", Value::from(true)),
                ("sigma_estimation_mode", Value::from("rolling")),
            ]),
        );

        sections.insert(
            "service_level".into(),
            leaves(&[
                ("metric", Value::from("csl")),
                ("default_csl", Value::from(0.90)),
                ("lookback_days", Value::from(90)),
                ("oos_mode", Value::from("strict")),
                ("cluster_csl_high", Value::from(0.95)),
                ("cluster_csl_stable", Value::from(0.90)),
                ("cluster_csl_low", Value::from(0.85)),
                ("cluster_csl_seasonal", Value::from(0.93)),
                ("cluster_csl_perishable", Value::from(0.90)),
            ]),
        );

        sections.insert(
            "closed_loop".into(),
            leaves(&[
                ("enabled", Value::from(false)),
                ("review_frequency_days", Value::from(28)),
                ("max_alpha_step_per_review", Value::from(0.02)),
                ("oos_rate_threshold", Value::from(0.05)),
                ("wmape_threshold", Value::from(0.5)),
                ("waste_rate_threshold", Value::from(0.02)),
                ("action_mode", Value::from("suggest")),
                ("min_csl_absolute", Value::from(0.50)),
                ("max_csl_absolute", Value::from(0.995)),
            ]),
        );

        sections.insert(
            "event_uplift".into(),
            leaves(&[
                ("enabled", Value::from(true)),
                ("default_quantile", Value::from(0.80)),
                ("min_factor", Value::from(0.5)),
                ("max_factor", Value::from(3.0)),
                ("perishables_exclude_threshold", Value::from(2)),
                ("apply_to", Value::from("forecast_only")),
                ("similar_days_window", Value::from(28)),
                ("min_samples_u", Value::from(4)),
                ("min_samples_beta", Value::from(6)),
                ("beta_normalization_mode", Value::from("mean_one")),
            ]),
        );

        sections.insert(
            "shelf_life_policy".into(),
            leaves(&[
                ("enabled", Value::from(true)),
                ("min_shelf_life_global", Value::from(0)),
                ("waste_penalty_mode", Value::from("soft")),
                ("waste_penalty_factor", Value::from(0.5)),
                ("waste_risk_threshold", Value::from(20)),
                ("waste_horizon_days", Value::from(7)),
                ("waste_realization_factor", Value::from(1.0)),
            ]),
        );

        sections.insert(
            "promo_uplift".into(),
            leaves(&[
                ("min_events_sku", Value::from(3)),
                ("min_valid_days_sku", Value::from(7)),
                ("threshold_a", Value::from(5)),
                ("winsorize_trim_percent", Value::from(0.10)),
                ("min_uplift", Value::from(0.5)),
                ("max_uplift", Value::from(5.0)),
                ("baseline_epsilon", Value::from(1e-6)),
                ("merge_gap_days", Value::from(1)),
            ]),
        );

        sections.insert(
            "post_promo_guardrail".into(),
            leaves(&[
                ("enabled", Value::from(true)),
                ("window_days", Value::from(7)),
                ("cooldown_factor", Value::from(0.8)),
                ("use_estimated_dip", Value::from(false)),
                ("dip_floor", Value::from(0.3)),
                ("dip_ceiling", Value::from(1.0)),
                ("absolute_qty_cap", Value::Null),
            ]),
        );

        sections.insert(
            "promo_cannibalization".into(),
            leaves(&[
                ("enabled", Value::from(true)),
                ("min_events", Value::from(2)),
                ("min_valid_days", Value::from(7)),
                ("downlift_min", Value::from(0.3)),
                ("downlift_max", Value::from(1.0)),
            ]),
        );

        sections.insert(
            "calendar".into(),
            leaves(&[("order_days", Value::from(vec![0, 1, 2, 3, 4]))]),
        );

        Self { sections }
    }
}

fn leaves(pairs: &[(&str, Value)]) -> HashMap<String, SettingLeaf> {
    pairs
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                SettingLeaf {
                    value: value.clone(),
                    auto_apply_to_new_sku: false,
                    description: String::new(),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tree_exposes_documented_leaves() {
        let tree = SettingsTree::defaults();
        assert_eq!(tree.get_u32("reorder_engine", "lead_time_days", 0), 7);
        assert_eq!(tree.get_str("reorder_engine", "forecast_method", ""), "simple");
        assert_eq!(tree.get_u32("monte_carlo", "n_simulations", 0), 1000);
    }

    #[test]
    fn missing_leaf_falls_back_to_caller_default() {
        let tree = SettingsTree::defaults();
        assert_eq!(tree.get_f64("reorder_engine", "nonexistent", 3.5), 3.5);
    }
}
