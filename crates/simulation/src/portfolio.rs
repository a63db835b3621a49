//! Random long-only portfolios.
//!
//! Weights are drawn from a symmetric Dirichlet distribution as normalized
//! Gamma(alpha, 1) variates; each sample is scored with the annualized mean
//! return vector and covariance of the assets' daily simple returns.

use crate::make_rng;
use finboard_core::config::SimulationConfig;
use finboard_core::{Error, PriceTable, Result, TRADING_DAYS_PER_YEAR};
use finboard_stats::{covariance_matrix, returns_table, ReturnsTable};
use rand::distributions::Distribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::Gamma;
use tracing::info;

/// Degenerate (all-zero) Dirichlet draws tolerated per run.
const MAX_REDRAWS: usize = 10_000;

/// One weighted portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSample {
    /// Asset weights, non-negative and summing to 1.
    pub weights: Vec<f64>,
    /// Annualized expected return.
    pub expected_return: f64,
    /// Annualized risk (standard deviation).
    pub risk: f64,
}

impl PortfolioSample {
    /// Expected return per unit of risk (0 when risk is 0).
    pub fn return_to_risk(&self) -> f64 {
        if self.risk > 0.0 {
            self.expected_return / self.risk
        } else {
            0.0
        }
    }
}

/// Monte Carlo portfolio sampler.
#[derive(Debug, Clone)]
pub struct PortfolioSampler {
    samples: usize,
    concentration: f64,
    seed: Option<u64>,
}

impl PortfolioSampler {
    pub fn new(samples: usize, concentration: f64, seed: Option<u64>) -> Self {
        Self {
            samples,
            concentration,
            seed,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.portfolio_samples,
            config.dirichlet_concentration,
            config.portfolio_seed,
        )
    }

    /// Sample portfolios over the assets of a price table.
    pub fn sample_prices(&self, prices: &PriceTable) -> Result<Vec<PortfolioSample>> {
        self.sample(&returns_table(prices))
    }

    /// Sample portfolios from daily returns.
    ///
    /// Fails with `InsufficientData` with fewer than two return rows or no
    /// assets.
    pub fn sample(&self, returns: &ReturnsTable) -> Result<Vec<PortfolioSample>> {
        let n = returns.asset_count();
        if n == 0 {
            return Err(Error::insufficient_data("no assets to weight"));
        }
        let mean: Vec<f64> = returns
            .means()
            .into_iter()
            .map(|m| m * TRADING_DAYS_PER_YEAR)
            .collect();
        let cov = covariance_matrix(returns)?.scaled(TRADING_DAYS_PER_YEAR);

        let gamma = Gamma::new(self.concentration, 1.0)
            .map_err(|err| Error::config(format!("invalid Dirichlet concentration {}: {err}", self.concentration)))?;
        let mut rng = make_rng(self.seed);

        let mut samples = Vec::with_capacity(self.samples);
        let mut redraws = 0;
        while samples.len() < self.samples {
            let draws: Vec<f64> = (0..n).map(|_| gamma.sample(&mut rng)).collect();
            let total: f64 = draws.iter().sum();
            // All-zero draws only happen for tiny concentrations; redraw.
            if !(total > 0.0) {
                redraws += 1;
                if redraws > MAX_REDRAWS {
                    return Err(Error::config(format!(
                        "Dirichlet concentration {} too small: {redraws} draws underflowed to zero",
                        self.concentration
                    )));
                }
                continue;
            }
            let weights: Vec<f64> = draws.iter().map(|g| g / total).collect();

            let expected_return = weights.iter().zip(&mean).map(|(w, m)| w * m).sum();
            let mut variance = 0.0;
            for i in 0..n {
                for j in 0..n {
                    variance += weights[i] * weights[j] * cov.get(i, j);
                }
            }
            samples.push(PortfolioSample {
                weights,
                expected_return,
                risk: variance.max(0.0).sqrt(),
            });
        }

        info!(
            assets = n,
            samples = samples.len(),
            concentration = self.concentration,
            seeded = self.seed.is_some(),
            "sampled portfolios"
        );
        Ok(samples)
    }
}

/// The sample with the lowest risk.
pub fn min_risk(samples: &[PortfolioSample]) -> Option<&PortfolioSample> {
    samples.iter().min_by(|a, b| a.risk.total_cmp(&b.risk))
}

/// The sample with the highest return per unit of risk.
pub fn best_return_to_risk(samples: &[PortfolioSample]) -> Option<&PortfolioSample> {
    samples
        .iter()
        .max_by(|a, b| a.return_to_risk().total_cmp(&b.return_to_risk()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use finboard_core::PriceIndex;

    fn prices() -> PriceTable {
        let a = [100.0, 101.0, 99.5, 102.0, 103.5, 102.8, 104.0];
        let b = [50.0, 49.0, 50.5, 50.0, 51.5, 52.0, 51.0];
        let c = [20.0, 20.2, 20.1, 20.6, 20.5, 20.9, 21.3];
        PriceTable {
            index: PriceIndex::Dates(
                (0..a.len())
                    .map(|d| {
                        NaiveDate::from_ymd_opt(2024, 1, 1 + d as u32)
                            .unwrap()
                            .and_hms_opt(0, 0, 0)
                            .unwrap()
                    })
                    .collect(),
            ),
            assets: vec!["A".into(), "B".into(), "C".into()],
            columns: vec![a.to_vec(), b.to_vec(), c.to_vec()],
        }
    }

    #[test]
    fn test_weights_are_on_the_simplex() {
        let samples = PortfolioSampler::new(200, 1.0, Some(7)).sample_prices(&prices()).unwrap();
        assert_eq!(samples.len(), 200);
        for s in &samples {
            assert_eq!(s.weights.len(), 3);
            assert!(s.weights.iter().all(|&w| w >= 0.0));
            assert_relative_eq!(s.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
            assert!(s.risk >= 0.0);
            assert!(s.expected_return.is_finite());
        }
    }

    #[test]
    fn test_seed_reproducible() {
        let sampler = PortfolioSampler::new(10, 1.0, Some(42));
        let a = sampler.sample_prices(&prices()).unwrap();
        let b = sampler.sample_prices(&prices()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_asset_matches_asset_stats() {
        let mut table = prices();
        table.assets.truncate(1);
        table.columns.truncate(1);
        let samples = PortfolioSampler::new(3, 1.0, Some(1)).sample_prices(&table).unwrap();
        let perf = finboard_stats::asset_performance(&table);
        for s in &samples {
            assert_eq!(s.weights, vec![1.0]);
            assert_relative_eq!(s.expected_return, perf[0].annualized_return, epsilon = 1e-12);
            assert_relative_eq!(s.risk, perf[0].annualized_risk, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_helpers_pick_extremes() {
        let samples = PortfolioSampler::new(100, 1.0, Some(3)).sample_prices(&prices()).unwrap();
        let lowest = min_risk(&samples).unwrap();
        assert!(samples.iter().all(|s| s.risk >= lowest.risk));
        let best = best_return_to_risk(&samples).unwrap();
        assert!(samples.iter().all(|s| s.return_to_risk() <= best.return_to_risk()));
        assert!(min_risk(&[]).is_none());
    }

    #[test]
    fn test_too_few_rows() {
        let table = prices().select_rows(&[0, 1]);
        let err = PortfolioSampler::new(10, 1.0, None).sample_prices(&table).unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_invalid_concentration() {
        let err = PortfolioSampler::new(10, 0.0, None).sample_prices(&prices()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_underflowing_concentration_fails() {
        let err = PortfolioSampler::new(10, 1e-300, Some(5)).sample_prices(&prices()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_return_to_risk() {
        let sample = PortfolioSample {
            weights: vec![0.5, 0.5],
            expected_return: 0.1,
            risk: 0.2,
        };
        assert_relative_eq!(sample.return_to_risk(), 0.5);
    }
}
