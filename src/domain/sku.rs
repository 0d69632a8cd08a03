//! SKU master record.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemandVariability {
    Stable,
    Low,
    High,
    Seasonal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastMethodName {
    Simple,
    MonteCarlo,
    Croston,
    Sba,
    Tsb,
    IntermittentAuto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyMode {
    Legacy,
    Csl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OosPopupPreference {
    Ask,
    AlwaysYes,
    AlwaysNo,
}

/// Per-SKU Monte Carlo overrides; `None` leaves the global `monte_carlo`
/// settings section in force.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonteCarloOverrides {
    pub distribution: Option<String>,
    pub n_simulations: Option<u32>,
    pub random_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sku {
    pub sku: String,
    pub description: String,
    pub ean: Option<String>,
    pub in_assortment: bool,
    pub department: String,
    pub category: String,
    pub pack_size: u32,
    pub moq: u32,
    /// 0 means "use global lead time".
    pub lead_time_days: u32,
    pub review_period: u32,
    pub safety_stock: u32,
    pub max_stock: u32,
    /// Legacy-mode reorder point override; ignored in CSL mode.
    pub reorder_point: u32,
    pub shelf_life_days: u32,
    pub has_expiry_label: bool,
    pub demand_variability: DemandVariability,
    /// 0 means "resolve from cluster/global".
    pub target_csl: f64,
    pub forecast_method_override: Option<ForecastMethodName>,
    pub policy_mode_override: Option<PolicyMode>,
    pub monte_carlo_overrides: MonteCarloOverrides,
    pub oos_popup_preference: OosPopupPreference,
}

impl Sku {
    pub fn effective_lead_time_days(&self, global_default: u32) -> u32 {
        if self.lead_time_days == 0 {
            global_default
        } else {
            self.lead_time_days
        }
    }

    pub fn is_perishable(&self) -> bool {
        self.shelf_life_days > 0
    }
}

/// Validates an EAN-8 or EAN-13 code's GS1 check digit.
///
/// The check digit is computed from the remaining digits by alternating
/// weights of 3 and 1 starting from the rightmost non-check digit, per the
/// GS1 General Specifications algorithm.
pub fn validate_ean(ean: &str) -> bool {
    if ean.len() != 8 && ean.len() != 13 {
        return false;
    }
    let digits: Vec<u32> = match ean.chars().map(|c| c.to_digit(10)).collect() {
        Some(d) => d,
        None => return false,
    };
    let (body, check) = digits.split_at(digits.len() - 1);
    let check = check[0];

    // Weights alternate 3,1,3,1,... applied right-to-left over the body.
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
        .sum();
    let computed = (10 - (sum % 10)) % 10;
    computed == check
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn validates_known_ean13() {
        // 4006381333931 is the canonical GS1 example code.
        assert!(validate_ean("4006381333931"));
    }

    #[test]
    fn rejects_bad_check_digit() {
        assert!(!validate_ean("4006381333930"));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(!validate_ean("12345"));
    }

    #[test]
    fn effective_lead_time_falls_back_to_global() {
        let mut sku = sample_sku();
        sku.lead_time_days = 0;
        assert_eq!(sku.effective_lead_time_days(7), 7);
        sku.lead_time_days = 3;
        assert_eq!(sku.effective_lead_time_days(7), 3);
    }

    pub fn sample_sku() -> Sku {
        Sku {
            sku: "SKU001".into(),
            description: "Test SKU".into(),
            ean: None,
            in_assortment: true,
            department: "GROCERY".into(),
            category: "DAIRY".into(),
            pack_size: 1,
            moq: 1,
            lead_time_days: 0,
            review_period: 7,
            safety_stock: 0,
            max_stock: 999,
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
}
