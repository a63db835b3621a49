//! Period-over-period return series.

/// `p[t] / p[t-1] - 1`. The output is one shorter than the input.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// `ln(p[t] / p[t-1])`.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

/// `last / first - 1`, NaN with fewer than two prices.
pub fn cumulative_return(prices: &[f64]) -> f64 {
    match (prices.first(), prices.last()) {
        (Some(first), Some(last)) if prices.len() >= 2 => last / first - 1.0,
        _ => f64::NAN,
    }
}
