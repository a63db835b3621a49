//! Configuration structures for the finboard pipeline.

use crate::error::{Error, Result};
use crate::types::{DateRange, PeriodRule, PriceColumn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration. Every section falls back to its defaults when absent
/// from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ingestor (HTTP sources, retries) configuration.
    pub ingest: IngestConfig,
    /// Normalizer configuration.
    pub normalize: NormalizeConfig,
    /// Aggregation and series selection.
    pub aggregation: AggregationConfig,
    /// Monte Carlo configuration.
    pub simulation: SimulationConfig,
    /// Personal cash-flow summary configuration.
    pub cashflow: CashFlowConfig,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(raw).map_err(|err| Error::config(format!("invalid TOML: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.request_timeout_secs == 0 {
            return Err(Error::config("ingest.request_timeout_secs must be > 0"));
        }
        if self.ingest.stooq_mirrors.is_empty() || self.ingest.binance_mirrors.is_empty() {
            return Err(Error::config("mirror lists must not be empty"));
        }
        if let (Some(s), Some(e)) = (self.aggregation.date_range.start, self.aggregation.date_range.end) {
            if s > e {
                return Err(Error::config(format!("aggregation.date_range start {s} is after end {e}")));
            }
        }
        let sim = &self.simulation;
        if sim.portfolio_samples == 0 || sim.path_samples == 0 {
            return Err(Error::config("simulation sample counts must be > 0"));
        }
        if !(sim.dirichlet_concentration.is_finite() && sim.dirichlet_concentration > 0.0) {
            return Err(Error::config("simulation.dirichlet_concentration must be > 0"));
        }
        if sim.horizon_periods == 0 {
            return Err(Error::config("simulation.horizon_periods must be > 0"));
        }
        if !(sim.volatility.is_finite() && sim.volatility >= 0.0) {
            return Err(Error::config("simulation.volatility must be >= 0"));
        }
        if !sim.expected_return.is_finite() {
            return Err(Error::config("simulation.expected_return must be finite"));
        }
        if self.cashflow.savings_goal < 0.0 {
            return Err(Error::config("cashflow.savings_goal must be >= 0"));
        }
        Ok(())
    }
}

/// HTTP source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Per-request socket timeout (seconds).
    pub request_timeout_secs: u64,
    /// Wait before the second attempt against a rate-limited vendor (ms).
    pub rate_limit_delay_ms: u64,
    /// Alpha Vantage query endpoint.
    pub alphavantage_url: String,
    /// Stooq CSV download mirrors, tried in order.
    pub stooq_mirrors: Vec<String>,
    /// Binance REST mirrors, tried in order.
    pub binance_mirrors: Vec<String>,
    /// Maximum klines requested per Binance call.
    pub binance_limit: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            // 5 requests/minute budget
            rate_limit_delay_ms: 12_000,
            alphavantage_url: "https://www.alphavantage.co/query".to_string(),
            stooq_mirrors: vec![
                "https://stooq.com/q/d/l/".to_string(),
                "https://stooq.pl/q/d/l/".to_string(),
            ],
            binance_mirrors: vec![
                "https://api.binance.com".to_string(),
                "https://api1.binance.com".to_string(),
                "https://data-api.binance.vision".to_string(),
            ],
            binance_limit: 1000,
        }
    }
}

/// What to do with rows that violate price/volume sanity rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Pass rows through untouched.
    #[default]
    Accept,
    /// Drop rows with non-positive prices, negative quantities, or
    /// inconsistent high/low.
    DropRow,
}

/// Normalizer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub validation: ValidationPolicy,
}

/// Aggregation and series selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Bucket width for tick and sub-daily input.
    pub period: PeriodRule,
    /// Column used for returns.
    pub price_column: PriceColumn,
    /// Optional inclusive date filter.
    pub date_range: DateRange,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            period: PeriodRule::Day,
            price_column: PriceColumn::Close,
            date_range: DateRange::unbounded(),
        }
    }
}

/// Monte Carlo configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Weight vectors drawn per portfolio sweep.
    pub portfolio_samples: usize,
    /// Symmetric Dirichlet concentration.
    pub dirichlet_concentration: f64,
    /// Seed for the portfolio sweep (`None` = entropy).
    pub portfolio_seed: Option<u64>,
    /// Expected return per period for price paths.
    pub expected_return: f64,
    /// Volatility per period for price paths.
    pub volatility: f64,
    /// Number of periods per path.
    pub horizon_periods: usize,
    /// Number of simulated paths.
    pub path_samples: usize,
    /// Seed for price paths (`None` = entropy).
    pub path_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            portfolio_samples: 1000,
            dirichlet_concentration: 1.0,
            portfolio_seed: None,
            expected_return: 0.10,
            volatility: 0.15,
            horizon_periods: 10,
            path_samples: 500,
            path_seed: Some(42),
        }
    }
}

/// Personal cash-flow summary configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CashFlowConfig {
    /// Monthly savings target.
    pub savings_goal: f64,
    /// Display currency code.
    pub currency: String,
}

impl Default for CashFlowConfig {
    fn default() -> Self {
        Self {
            savings_goal: 1000.0,
            currency: "USD".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ingest.rate_limit_delay_ms, 12_000);
        assert_eq!(config.aggregation.period, PeriodRule::Day);
        assert_eq!(config.simulation.portfolio_samples, 1000);
        assert_eq!(config.normalize.validation, ValidationPolicy::Accept);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [aggregation]
            period = "hour"
            price_column = "vwap"
            date_range = { start = "2024-01-01" }

            [simulation]
            portfolio_seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.aggregation.period, PeriodRule::Hour);
        assert_eq!(config.aggregation.price_column, PriceColumn::Vwap);
        assert_eq!(config.aggregation.date_range.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(config.aggregation.date_range.end, None);
        assert_eq!(config.simulation.portfolio_seed, Some(7));
        assert_eq!(config.simulation.path_samples, 500);
        assert_eq!(config.ingest.request_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_toml_str("[simulation]\ndirichlet_concentration = 0.0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_toml_str("[normalize]\nvalidation = \"maybe\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
