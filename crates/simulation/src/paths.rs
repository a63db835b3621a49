//! Geometric Brownian motion growth paths.

use crate::make_rng;
use finboard_core::config::SimulationConfig;
use finboard_core::{Error, Result};
use finboard_stats::quantile;
use rand::distributions::Distribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use tracing::info;

/// Simulated growth factors, one row per path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathMatrix {
    pub horizon: usize,
    /// `paths[sample][period]`, the growth of 1 unit after `period + 1` steps.
    pub paths: Vec<Vec<f64>>,
}

impl PathMatrix {
    pub fn sample_count(&self) -> usize {
        self.paths.len()
    }

    /// Cross-section of every path at one period.
    pub fn period(&self, t: usize) -> Vec<f64> {
        self.paths.iter().filter_map(|p| p.get(t).copied()).collect()
    }

    /// Growth factor of every path after the last period.
    pub fn final_values(&self) -> Vec<f64> {
        self.paths.iter().filter_map(|p| p.last().copied()).collect()
    }

    /// Per-period mean across paths.
    pub fn mean_path(&self) -> Vec<f64> {
        let n = self.paths.len() as f64;
        (0..self.horizon)
            .map(|t| self.period(t).iter().sum::<f64>() / n)
            .collect()
    }

    /// Per-period `q` quantile across paths.
    pub fn quantile_path(&self, q: f64) -> Vec<f64> {
        (0..self.horizon)
            .map(|t| {
                let mut values = self.period(t);
                values.sort_by(f64::total_cmp);
                quantile(&values, q)
            })
            .collect()
    }
}

/// GBM path simulator: per-period log growth `(mu - sigma^2 / 2) + sigma * z`.
#[derive(Debug, Clone)]
pub struct PathSimulator {
    expected_return: f64,
    volatility: f64,
    horizon: usize,
    samples: usize,
    seed: Option<u64>,
}

impl PathSimulator {
    pub fn new(expected_return: f64, volatility: f64, horizon: usize, samples: usize, seed: Option<u64>) -> Self {
        Self {
            expected_return,
            volatility,
            horizon,
            samples,
            seed,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.expected_return,
            config.volatility,
            config.horizon_periods,
            config.path_samples,
            config.path_seed,
        )
    }

    pub fn simulate(&self) -> Result<PathMatrix> {
        if self.horizon == 0 || self.samples == 0 {
            return Err(Error::config("path horizon and sample count must be > 0"));
        }
        if !(self.volatility.is_finite() && self.volatility >= 0.0) {
            return Err(Error::config(format!("invalid volatility {}", self.volatility)));
        }
        let normal = Normal::new(0.0, 1.0).map_err(|err| Error::config(err.to_string()))?;
        let mut rng = make_rng(self.seed);
        let drift = self.expected_return - 0.5 * self.volatility * self.volatility;

        let paths: Vec<Vec<f64>> = (0..self.samples)
            .map(|_| {
                let mut log_growth = 0.0;
                (0..self.horizon)
                    .map(|_| {
                        log_growth += drift + self.volatility * normal.sample(&mut rng);
                        log_growth.exp()
                    })
                    .collect()
            })
            .collect();

        info!(
            samples = self.samples,
            horizon = self.horizon,
            mu = self.expected_return,
            sigma = self.volatility,
            "simulated growth paths"
        );
        Ok(PathMatrix {
            horizon: self.horizon,
            paths,
        })
    }
}
