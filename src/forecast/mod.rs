//! Forecast engine: five interchangeable methods behind one contract, per
//! spec §4.3. Dynamic dispatch on forecast method (design note §9) — each
//! method implements `fit → predict` behind `ForecastMethod`, selected by a
//! factory keyed by name so the auto-selector can report which one it chose.

pub mod intermittent;
pub mod monte_carlo;
pub mod simple;

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::SettingsTree;
use crate::domain::sku::ForecastMethodName;
use crate::error::CoreResult;

/// One day of (possibly censored) demand history.
#[derive(Debug, Clone, Copy)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub qty: f64,
    pub censored: bool,
}

pub struct ForecastInput<'a> {
    pub history: &'a [HistoryPoint],
    /// First day the forecast must cover (typically asof + 1).
    pub horizon_start: NaiveDate,
    pub horizon_days: u32,
    /// No history at or after this date may be used (cutoff).
    pub asof: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct ForecastMeta {
    pub method_chosen: String,
    pub auto_selected: bool,
    pub seed: Option<u64>,
    pub distribution: Option<String>,
    pub fallback_reason: Option<String>,
    pub low_history: bool,
}

#[derive(Debug, Clone)]
pub struct ForecastResult {
    pub mu_p: f64,
    pub sigma_p: f64,
    /// Keyed by quantile level as a string, e.g. "0.95", matching the JSON
    /// map shape the explain schema exports (spec §6).
    pub quantiles: BTreeMap<String, f64>,
    pub method: String,
    pub meta: ForecastMeta,
}

impl ForecastResult {
    pub fn zero(method: &str, reason: &str) -> Self {
        Self {
            mu_p: 0.0,
            sigma_p: 0.0,
            quantiles: BTreeMap::new(),
            method: method.to_string(),
            meta: ForecastMeta {
                method_chosen: method.to_string(),
                low_history: true,
                fallback_reason: Some(reason.to_string()),
                ..Default::default()
            },
        }
    }
}

pub trait ForecastMethod {
    fn forecast(&self, input: &ForecastInput, settings: &SettingsTree) -> CoreResult<ForecastResult>;
}

pub const MIN_VALID_DAYS: usize = 7;

/// Days with non-negative, non-censored quantities, sorted ascending, with
/// no day at or after `asof` (the structural-validity check §4.3 demands).
pub fn valid_history(input: &ForecastInput) -> CoreResult<Vec<HistoryPoint>> {
    let mut sorted: Vec<HistoryPoint> = input.history.to_vec();
    sorted.sort_by_key(|p| p.date);
    for w in sorted.windows(2) {
        if w[0].date > w[1].date {
            return Err(crate::error::CoreError::ForecastFailure {
                sku: String::new(),
                reason: "history dates are out of order".to_string(),
            });
        }
    }
    for p in &sorted {
        if p.qty < 0.0 {
            return Err(crate::error::CoreError::ForecastFailure {
                sku: String::new(),
                reason: "history contains a negative quantity".to_string(),
            });
        }
    }
    Ok(sorted
        .into_iter()
        .filter(|p| !p.censored && p.date < input.asof)
        .collect())
}

pub fn default_quantile_levels() -> Vec<f64> {
    vec![0.50, 0.80, 0.90, 0.95, 0.98]
}

/// Selects the configured/overridden forecast method and runs it, folding
/// in the intermittency auto-selector when requested.
pub fn forecast(
    method: ForecastMethodName,
    input: &ForecastInput,
    settings: &SettingsTree,
) -> CoreResult<ForecastResult> {
    match method {
        ForecastMethodName::Simple => simple::SimpleForecast.forecast(input, settings),
        ForecastMethodName::MonteCarlo => monte_carlo::MonteCarloForecast.forecast(input, settings),
        ForecastMethodName::Croston => {
            intermittent::IntermittentForecast::fixed(intermittent::IntermittentVariant::Croston)
                .forecast(input, settings)
        }
        ForecastMethodName::Sba => {
            intermittent::IntermittentForecast::fixed(intermittent::IntermittentVariant::Sba)
                .forecast(input, settings)
        }
        ForecastMethodName::Tsb => {
            intermittent::IntermittentForecast::fixed(intermittent::IntermittentVariant::Tsb)
                .forecast(input, settings)
        }
        ForecastMethodName::IntermittentAuto => {
            intermittent::IntermittentForecast::auto().forecast(input, settings)
        }
    }
}
