//! Annualized per-asset performance and co-movement of a price table.

use crate::returns::simple_returns;
use finboard_core::{Error, PriceIndex, PriceTable, Result, TRADING_DAYS_PER_YEAR};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

/// Per-asset simple returns sharing one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnsTable {
    /// Row label of the later price in each return.
    pub index: PriceIndex,
    pub assets: Vec<String>,
    /// Column-major returns, `columns[asset][row]`. Never NaN.
    pub columns: Vec<Vec<f64>>,
}

impl ReturnsTable {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn column(&self, asset: &str) -> Option<&[f64]> {
        self.assets
            .iter()
            .position(|a| a == asset)
            .map(|i| self.columns[i].as_slice())
    }

    /// Per-asset sample mean.
    pub fn means(&self) -> Vec<f64> {
        self.columns.iter().map(|c| c.iter().mean()).collect()
    }
}

/// Simple returns for every asset. Rows where any asset's return is NaN
/// (a missing price on either side) are dropped.
pub fn returns_table(prices: &PriceTable) -> ReturnsTable {
    let per_asset: Vec<Vec<f64>> = prices.columns.iter().map(|c| simple_returns(c)).collect();
    let rows = prices.len().saturating_sub(1);

    let keep: Vec<usize> = (0..rows)
        .filter(|&r| per_asset.iter().all(|c| c[r].is_finite()))
        .collect();
    if keep.len() < rows {
        debug!(dropped = rows - keep.len(), "return rows with missing prices dropped");
    }

    ReturnsTable {
        index: prices.index.select(&keep.iter().map(|&r| r + 1).collect::<Vec<_>>()),
        assets: prices.assets.clone(),
        columns: per_asset
            .iter()
            .map(|c| keep.iter().map(|&r| c[r]).collect())
            .collect(),
    }
}

/// Annualized return and risk of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPerformance {
    pub asset: String,
    /// Mean daily return x 252.
    pub annualized_return: f64,
    /// Daily return sample standard deviation x sqrt(252).
    pub annualized_risk: f64,
}

impl AssetPerformance {
    pub fn from_returns(asset: impl Into<String>, returns: &[f64]) -> Self {
        Self {
            asset: asset.into(),
            annualized_return: returns.iter().mean() * TRADING_DAYS_PER_YEAR,
            annualized_risk: returns.iter().std_dev() * TRADING_DAYS_PER_YEAR.sqrt(),
        }
    }
}

/// Annualized performance of every asset in the table.
pub fn asset_performance(prices: &PriceTable) -> Vec<AssetPerformance> {
    let returns = returns_table(prices);
    returns
        .assets
        .iter()
        .zip(&returns.columns)
        .map(|(asset, column)| AssetPerformance::from_returns(asset.as_str(), column))
        .collect()
}

/// Square matrix with row/column labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl LabeledMatrix {
    pub fn size(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    /// Every entry multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            labels: self.labels.clone(),
            values: self
                .values
                .iter()
                .map(|row| row.iter().map(|v| v * factor).collect())
                .collect(),
        }
    }
}

fn require_rows(returns: &ReturnsTable, what: &str) -> Result<()> {
    if returns.len() < 2 {
        return Err(Error::insufficient_data(format!(
            "{what} needs at least 2 return rows, got {}",
            returns.len()
        )));
    }
    Ok(())
}

/// Sample (n-1) covariance of the return columns.
pub fn covariance_matrix(returns: &ReturnsTable) -> Result<LabeledMatrix> {
    require_rows(returns, "covariance")?;
    let n = returns.asset_count();
    let mut values = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let cov = returns.columns[i].iter().covariance(returns.columns[j].iter());
            values[i][j] = cov;
            values[j][i] = cov;
        }
    }
    Ok(LabeledMatrix {
        labels: returns.assets.clone(),
        values,
    })
}

/// Pearson correlation of the return columns. Pairs involving a constant
/// column are NaN, except the diagonal which is always 1.
pub fn correlation_matrix(returns: &ReturnsTable) -> Result<LabeledMatrix> {
    let cov = covariance_matrix(returns)?;
    let n = cov.size();
    let std: Vec<f64> = (0..n).map(|i| cov.get(i, i).sqrt()).collect();
    let values = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        1.0
                    } else if std[i] > 0.0 && std[j] > 0.0 {
                        cov.get(i, j) / (std[i] * std[j])
                    } else {
                        f64::NAN
                    }
                })
                .collect()
        })
        .collect();
    Ok(LabeledMatrix {
        labels: cov.labels,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn table(columns: Vec<Vec<f64>>) -> PriceTable {
        let rows = columns[0].len();
        PriceTable {
            index: PriceIndex::Dates(
                (0..rows)
                    .map(|d| {
                        NaiveDate::from_ymd_opt(2024, 1, 1 + d as u32)
                            .unwrap()
                            .and_hms_opt(0, 0, 0)
                            .unwrap()
                    })
                    .collect(),
            ),
            assets: (0..columns.len()).map(|i| format!("A{i}")).collect(),
            columns,
        }
    }

    #[test]
    fn test_returns_table_drops_rows_with_missing_prices() {
        let prices = table(vec![
            vec![100.0, 110.0, f64::NAN, 121.0, 133.1],
            vec![50.0, 50.0, 55.0, 55.0, 60.5],
        ]);
        let returns = returns_table(&prices);
        // Rows 1->2 and 2->3 touch the NaN.
        assert_eq!(returns.len(), 2);
        assert_eq!(returns.index.timestamp(0), prices.index.timestamp(1));
        assert_eq!(returns.index.timestamp(1), prices.index.timestamp(4));
        assert_relative_eq!(returns.column("A0").unwrap()[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(returns.column("A1").unwrap()[1], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_positional_prices_give_positional_returns() {
        let prices = PriceTable {
            index: PriceIndex::Rows(3),
            assets: vec!["A0".into()],
            columns: vec![vec![100.0, 110.0, 99.0]],
        };
        let returns = returns_table(&prices);
        assert_eq!(returns.index, PriceIndex::Rows(2));
        assert_relative_eq!(returns.column("A0").unwrap()[1], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_asset_performance_annualizes() {
        let prices = table(vec![vec![100.0, 110.0, 99.0, 108.9]]);
        let perf = asset_performance(&prices);
        let returns = [0.1, -0.1, 0.1];
        let mean = returns.iter().sum::<f64>() / 3.0;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 2.0;
        assert_relative_eq!(perf[0].annualized_return, mean * 252.0, epsilon = 1e-9);
        assert_relative_eq!(perf[0].annualized_risk, var.sqrt() * 252f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_covariance_and_correlation() {
        // A1 moves exactly twice as much as A0; A2 mirrors A0.
        let returns = ReturnsTable {
            index: PriceIndex::Rows(4),
            assets: vec!["A0".into(), "A1".into(), "A2".into()],
            columns: vec![
                vec![0.01, -0.02, 0.03, 0.00],
                vec![0.02, -0.04, 0.06, 0.00],
                vec![-0.01, 0.02, -0.03, 0.00],
            ],
        };
        let cov = covariance_matrix(&returns).unwrap();
        assert_relative_eq!(cov.get(1, 1), 4.0 * cov.get(0, 0), epsilon = 1e-12);
        assert_relative_eq!(cov.get(0, 1), cov.get(1, 0), epsilon = 1e-15);

        let corr = correlation_matrix(&returns).unwrap();
        assert_relative_eq!(corr.get(0, 1), 1.0, epsilon = 1e-9);
        assert_relative_eq!(corr.get(0, 2), -1.0, epsilon = 1e-9);
        assert_eq!(corr.get(2, 2), 1.0);

        let annual = cov.scaled(252.0);
        assert_relative_eq!(annual.get(0, 0), cov.get(0, 0) * 252.0, epsilon = 1e-15);
    }

    #[test]
    fn test_constant_column_correlation_is_nan() {
        let returns = ReturnsTable {
            index: PriceIndex::Rows(3),
            assets: vec!["A0".into(), "FLAT".into()],
            columns: vec![vec![0.01, -0.02, 0.03], vec![0.0, 0.0, 0.0]],
        };
        let corr = correlation_matrix(&returns).unwrap();
        assert!(corr.get(0, 1).is_nan());
        assert_eq!(corr.get(1, 1), 1.0);
    }

    #[test]
    fn test_too_few_rows() {
        let returns = returns_table(&table(vec![vec![100.0, 101.0]]));
        assert!(matches!(covariance_matrix(&returns), Err(Error::InsufficientData(_))));
    }
}
