//! Summary statistics for one price column of a series.

use crate::returns::{cumulative_return, simple_returns};
use finboard_core::{CanonicalSeries, PriceColumn};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

/// Return statistics for one price column of a series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SummaryStatistics {
    /// Number of price observations used.
    pub observation_count: usize,
    /// Sample mean of simple period returns (NaN with fewer than 2 returns).
    pub mean_return: f64,
    /// Sample standard deviation of simple returns (NaN with fewer than 2 returns).
    pub return_volatility: f64,
    /// `last / first - 1` (NaN with fewer than 2 prices).
    pub cumulative_return: f64,
}

impl SummaryStatistics {
    /// Compute over the bars that carry `column`; others are skipped.
    pub fn compute(series: &CanonicalSeries, column: PriceColumn) -> Self {
        let prices = series.prices(column);
        if prices.len() < series.len() {
            debug!(
                column = %column,
                skipped = series.len() - prices.len(),
                "bars without the selected price column skipped"
            );
        }
        Self::from_prices(&prices)
    }

    pub fn from_prices(prices: &[f64]) -> Self {
        let returns = simple_returns(prices);
        let (mean_return, return_volatility) = if returns.len() >= 2 {
            (returns.iter().mean(), returns.iter().std_dev())
        } else {
            (f64::NAN, f64::NAN)
        };
        Self {
            observation_count: prices.len(),
            mean_return,
            return_volatility,
            cumulative_return: cumulative_return(prices),
        }
    }

    /// All statistics undefined.
    pub fn undefined(observation_count: usize) -> Self {
        Self {
            observation_count,
            mean_return: f64::NAN,
            return_volatility: f64::NAN,
            cumulative_return: f64::NAN,
        }
    }
}
