//! Level + day-of-week simple forecast, per spec §4.3.

use std::collections::BTreeMap;

use chrono::Datelike;

use crate::config::SettingsTree;
use crate::error::CoreResult;

use super::{valid_history, ForecastInput, ForecastMeta, ForecastMethod, ForecastResult, MIN_VALID_DAYS};

pub struct SimpleForecast;

impl SimpleForecast {
    /// Fits a level and a multiplicative day-of-week factor per weekday
    /// over the valid history, then predicts `horizon_days` starting at
    /// `horizon_start`, with residual sigma scaled by `sqrt(P)` (i.i.d. day
    /// assumption).
    pub fn fit_and_predict(input: &ForecastInput, sigma_window_weeks: u32) -> (f64, f64, Vec<f64>) {
        let history = match valid_history(input) {
            Ok(h) => h,
            Err(_) => return (0.0, 0.0, Vec::new()),
        };
        if history.len() < MIN_VALID_DAYS {
            return (0.0, 0.0, Vec::new());
        }

        let level = history.iter().map(|p| p.qty).sum::<f64>() / history.len() as f64;

        let mut weekday_sums = [0.0_f64; 7];
        let mut weekday_counts = [0_u32; 7];
        for p in &history {
            let idx = p.date.weekday().num_days_from_monday() as usize;
            weekday_sums[idx] += p.qty;
            weekday_counts[idx] += 1;
        }
        let mut dow_factor = [1.0_f64; 7];
        for i in 0..7 {
            if weekday_counts[i] > 0 && level > 0.0 {
                let weekday_mean = weekday_sums[i] / weekday_counts[i] as f64;
                dow_factor[i] = weekday_mean / level;
            }
        }

        let window_cutoff = input.asof - chrono::Duration::days((sigma_window_weeks as i64) * 7);
        let residuals: Vec<f64> = history
            .iter()
            .filter(|p| p.date >= window_cutoff)
            .map(|p| {
                let idx = p.date.weekday().num_days_from_monday() as usize;
                p.qty - level * dow_factor[idx]
            })
            .collect();
        let residual_sigma = if residuals.len() > 1 {
            let mean = residuals.iter().sum::<f64>() / residuals.len() as f64;
            let var = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (residuals.len() - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        let mut daily_forecasts = Vec::with_capacity(input.horizon_days as usize);
        for d in 0..input.horizon_days {
            let date = input.horizon_start + chrono::Duration::days(d as i64);
            let idx = date.weekday().num_days_from_monday() as usize;
            daily_forecasts.push(level * dow_factor[idx]);
        }
        let mu_p = daily_forecasts.iter().sum();
        let sigma_p = residual_sigma * (input.horizon_days as f64).sqrt();
        (mu_p, sigma_p, daily_forecasts)
    }
}

impl ForecastMethod for SimpleForecast {
    fn forecast(&self, input: &ForecastInput, settings: &SettingsTree) -> CoreResult<ForecastResult> {
        let history = valid_history(input)?;
        if history.len() < MIN_VALID_DAYS {
            return Ok(ForecastResult::zero("simple", "low_history"));
        }

        let sigma_window_weeks = settings.get_u32("reorder_engine", "sigma_window_weeks", 8);
        let (mu_p, sigma_p, _) = Self::fit_and_predict(input, sigma_window_weeks);

        Ok(ForecastResult {
            mu_p,
            sigma_p,
            quantiles: BTreeMap::new(),
            method: "simple".to_string(),
            meta: ForecastMeta {
                method_chosen: "simple".to_string(),
                ..Default::default()
            },
        })
    }
}
