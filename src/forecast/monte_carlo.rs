//! Monte Carlo forecast: sums `horizon_days` sampled daily draws over `N`
//! trajectories and summarises the empirical distribution, per spec §4.3.
//! Samples never escape this module — only (mu_P, sigma_P, quantiles) do
//! (design note §9's streaming-accumulator guidance); we keep one running
//! total per trajectory rather than materialising full daily paths.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal, Normal};

use crate::config::SettingsTree;
use crate::error::CoreResult;

use super::simple::SimpleForecast;
use super::{default_quantile_levels, valid_history, ForecastInput, ForecastMeta, ForecastMethod, ForecastResult, MIN_VALID_DAYS};

const MIN_SAMPLES: usize = 14;

pub struct MonteCarloForecast;

impl ForecastMethod for MonteCarloForecast {
    fn forecast(&self, input: &ForecastInput, settings: &SettingsTree) -> CoreResult<ForecastResult> {
        let history = valid_history(input)?;
        if history.len() < MIN_VALID_DAYS {
            return Ok(ForecastResult::zero("monte_carlo", "low_history"));
        }
        if history.len() < MIN_SAMPLES {
            let mut fallback = SimpleForecast.forecast(input, settings)?;
            fallback.meta.fallback_reason = Some("insufficient samples for monte_carlo".to_string());
            fallback.meta.method_chosen = "simple".to_string();
            return Ok(fallback);
        }

        let distribution = settings.get_str("monte_carlo", "distribution", "empirical");
        let n_simulations = settings.get_u32("monte_carlo", "n_simulations", 1000).max(1) as usize;
        let seed = settings.get_u64("monte_carlo", "random_seed", 42);

        let daily: Vec<f64> = history.iter().map(|p| p.qty).collect();
        let mean = daily.iter().sum::<f64>() / daily.len() as f64;
        let variance = daily.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (daily.len().max(2) - 1) as f64;
        let std = variance.sqrt().max(1e-9);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut totals = Vec::with_capacity(n_simulations);

        match distribution.as_str() {
            "normal" => {
                let normal = Normal::new(mean, std).unwrap_or_else(|_| Normal::new(0.0, 1.0).unwrap());
                for _ in 0..n_simulations {
                    let mut total = 0.0;
                    for _ in 0..input.horizon_days {
                        total += normal.sample(&mut rng).max(0.0);
                    }
                    totals.push(total);
                }
            }
            "lognormal" => {
                let safe_mean = mean.max(1e-6);
                let sigma2 = (1.0 + (std / safe_mean).powi(2)).ln().max(1e-9);
                let mu = safe_mean.ln() - sigma2 / 2.0;
                let lognormal = LogNormal::new(mu, sigma2.sqrt()).unwrap_or_else(|_| LogNormal::new(0.0, 1.0).unwrap());
                for _ in 0..n_simulations {
                    let mut total = 0.0;
                    for _ in 0..input.horizon_days {
                        total += lognormal.sample(&mut rng);
                    }
                    totals.push(total);
                }
            }
            "residual_around_simple" => {
                let (simple_mu, _, daily_forecasts) = SimpleForecast::fit_and_predict(input, 8);
                let residuals: Vec<f64> = daily.iter().map(|d| d - mean).collect();
                for _ in 0..n_simulations {
                    let mut total = 0.0;
                    for d in 0..input.horizon_days as usize {
                        let base = daily_forecasts.get(d).copied().unwrap_or(simple_mu / input.horizon_days.max(1) as f64);
                        let idx = rng.gen_range(0..residuals.len());
                        total += (base + residuals[idx]).max(0.0);
                    }
                    totals.push(total);
                }
            }
            _ => {
                // empirical: draw daily quantities from history with replacement.
                for _ in 0..n_simulations {
                    let mut total = 0.0;
                    for _ in 0..input.horizon_days {
                        let idx = rng.gen_range(0..daily.len());
                        total += daily[idx];
                    }
                    totals.push(total);
                }
            }
        }

        totals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mu_p = totals.iter().sum::<f64>() / totals.len() as f64;
        let sigma_p = {
            let var = totals.iter().map(|t| (t - mu_p).powi(2)).sum::<f64>() / (totals.len().max(2) - 1) as f64;
            var.sqrt()
        };

        let mut quantiles = BTreeMap::new();
        for level in default_quantile_levels() {
            quantiles.insert(format!("{:.2}", level), percentile(&totals, level));
        }

        Ok(ForecastResult {
            mu_p,
            sigma_p,
            quantiles,
            method: "monte_carlo".to_string(),
            meta: ForecastMeta {
                method_chosen: "monte_carlo".to_string(),
                seed: Some(seed),
                distribution: Some(distribution),
                ..Default::default()
            },
        })
    }
}

/// Linear-interpolated percentile over an already-sorted sample.
fn percentile(sorted: &[f64], level: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = level * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] + frac * (sorted[upper] - sorted[lower])
    }
}
