//! Per-column descriptive statistics.

use finboard_core::PriceTable;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// count, mean, std, min, quartiles, max of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    /// Non-NaN observations.
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl ColumnSummary {
    /// Summarize `values`, ignoring NaN. Every statistic is NaN for an empty
    /// column; `std` is NaN for a single value.
    pub fn from_values(name: impl Into<String>, values: &[f64]) -> Self {
        let mut sorted: Vec<OrderedFloat<f64>> = values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|&v| OrderedFloat(v))
            .collect();
        sorted.sort();
        let sorted: Vec<f64> = sorted.into_iter().map(|v| v.0).collect();

        Self {
            name: name.into(),
            count: sorted.len(),
            mean: sorted.iter().mean(),
            std: sorted.iter().std_dev(),
            min: sorted.first().copied().unwrap_or(f64::NAN),
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted.last().copied().unwrap_or(f64::NAN),
        }
    }
}

/// Linear-interpolated quantile of ascending-sorted values, NaN when empty.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Summaries of every asset column.
pub fn describe(table: &PriceTable) -> Vec<ColumnSummary> {
    table
        .assets
        .iter()
        .zip(&table.columns)
        .map(|(name, column)| ColumnSummary::from_values(name.as_str(), column))
        .collect()
}
