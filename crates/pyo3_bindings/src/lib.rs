//! PyO3 bindings for the finboard pipeline.
//!
//! Exposes the Rust core to a Python dashboard:
//! - Loading uploads and vendor fetches into canonical series
//! - Tick aggregation and resampling
//! - Summary statistics and per-asset performance
//! - Portfolio and price-path Monte Carlo
//! - Cash-flow ledger summaries

use chrono::NaiveDate;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use finboard_core::{
    to_epoch_ms, CanonicalBar as RustBar, CanonicalSeries as RustSeries, Config as RustConfig, DateRange,
    Error as RustError, PeriodRule, PriceColumn, RawTick as RustTick,
};
use finboard_ingestion::{
    aggregate_ticks, resample, series_to_csv_string, BarBuilder, FetchRequest, Normalizer, Pipeline, Vendor,
};
use finboard_sim::{
    best_return_to_risk as rust_best_return_to_risk, min_risk as rust_min_risk, PathSimulator,
    PortfolioSample as RustPortfolioSample, PortfolioSampler,
};
use finboard_stats::{
    CashFlowSummary as RustCashFlowSummary, ColumnSummary as RustColumnSummary,
    SummaryStatistics as RustSummaryStatistics,
};

// ============================================================================
// Error mapping
// ============================================================================

/// Input problems become `ValueError`; source and I/O failures `RuntimeError`.
fn to_py_err(err: RustError) -> PyErr {
    if err.is_input_error() {
        PyValueError::new_err(err.to_string())
    } else {
        PyRuntimeError::new_err(err.to_string())
    }
}

fn parse_rule(rule: &str) -> PyResult<PeriodRule> {
    rule.parse().map_err(to_py_err)
}

fn parse_column(column: &str) -> PyResult<PriceColumn> {
    column.parse().map_err(to_py_err)
}

fn parse_date(value: Option<&str>) -> PyResult<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|err| PyValueError::new_err(format!("invalid date {s:?}: {err}")))
        })
        .transpose()
}

fn date_range(start: Option<&str>, end: Option<&str>) -> PyResult<DateRange> {
    DateRange::new(parse_date(start)?, parse_date(end)?).map_err(to_py_err)
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// A single executed trade.
#[pyclass]
#[derive(Clone)]
pub struct Tick {
    #[pyo3(get, set)]
    pub ts_ms: i64,
    #[pyo3(get, set)]
    pub price: f64,
    #[pyo3(get, set)]
    pub quantity: f64,
}

#[pymethods]
impl Tick {
    #[new]
    fn new(ts_ms: i64, price: f64, quantity: f64) -> Self {
        Tick { ts_ms, price, quantity }
    }

    fn __repr__(&self) -> String {
        format!("Tick(ts_ms={}, price={}, quantity={})", self.ts_ms, self.price, self.quantity)
    }
}

impl TryFrom<Tick> for RustTick {
    type Error = PyErr;

    fn try_from(t: Tick) -> PyResult<Self> {
        let timestamp = finboard_core::from_epoch_ms(t.ts_ms)
            .ok_or_else(|| PyValueError::new_err(format!("timestamp out of range: {}", t.ts_ms)))?;
        Ok(RustTick::new(timestamp, t.price, t.quantity))
    }
}

/// One canonical OHLCV row.
#[pyclass]
#[derive(Clone)]
pub struct Bar {
    #[pyo3(get)]
    pub ts_ms: i64,
    /// `YYYY-MM-DD HH:MM:SS[.fff]`, naive UTC.
    #[pyo3(get)]
    pub timestamp: String,
    #[pyo3(get)]
    pub open: Option<f64>,
    #[pyo3(get)]
    pub high: Option<f64>,
    #[pyo3(get)]
    pub low: Option<f64>,
    #[pyo3(get)]
    pub close: Option<f64>,
    #[pyo3(get)]
    pub adj_close: Option<f64>,
    #[pyo3(get)]
    pub volume: Option<f64>,
    #[pyo3(get)]
    pub vwap: Option<f64>,
}

#[pymethods]
impl Bar {
    fn __repr__(&self) -> String {
        format!(
            "Bar(timestamp={}, open={:?}, high={:?}, low={:?}, close={:?}, volume={:?})",
            self.timestamp, self.open, self.high, self.low, self.close, self.volume
        )
    }
}

impl From<&RustBar> for Bar {
    fn from(b: &RustBar) -> Self {
        Bar {
            ts_ms: to_epoch_ms(b.timestamp),
            timestamp: b
                .timestamp
                .format(finboard_ingestion::export::TIMESTAMP_FORMAT)
                .to_string(),
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            adj_close: b.adj_close,
            volume: b.volume,
            vwap: b.vwap,
        }
    }
}

/// Return statistics for one price column.
#[pyclass]
#[derive(Clone)]
pub struct SummaryStatistics {
    #[pyo3(get)]
    pub observation_count: usize,
    #[pyo3(get)]
    pub mean_return: f64,
    #[pyo3(get)]
    pub return_volatility: f64,
    #[pyo3(get)]
    pub cumulative_return: f64,
}

#[pymethods]
impl SummaryStatistics {
    fn __repr__(&self) -> String {
        format!(
            "SummaryStatistics(n={}, mean={}, vol={}, cumulative={})",
            self.observation_count, self.mean_return, self.return_volatility, self.cumulative_return
        )
    }
}

impl From<RustSummaryStatistics> for SummaryStatistics {
    fn from(s: RustSummaryStatistics) -> Self {
        SummaryStatistics {
            observation_count: s.observation_count,
            mean_return: s.mean_return,
            return_volatility: s.return_volatility,
            cumulative_return: s.cumulative_return,
        }
    }
}

/// A canonical time series.
#[pyclass]
#[derive(Clone)]
pub struct Series {
    inner: RustSeries,
}

#[pymethods]
impl Series {
    fn __len__(&self) -> usize {
        self.inner.len()
    }

    /// All rows as `Bar` objects.
    fn bars(&self) -> Vec<Bar> {
        self.inner.bars.iter().map(Bar::from).collect()
    }

    /// Values of one price column (`close`, `vwap`, `adj_close`), skipping
    /// rows without it.
    #[pyo3(signature = (column = "close"))]
    fn prices(&self, column: &str) -> PyResult<Vec<f64>> {
        Ok(self.inner.prices(parse_column(column)?))
    }

    #[pyo3(signature = (column = "close"))]
    fn summary(&self, column: &str) -> PyResult<SummaryStatistics> {
        Ok(RustSummaryStatistics::compute(&self.inner, parse_column(column)?).into())
    }

    /// Re-bucket at `minute`, `hour`, or `day`.
    fn resample(&self, rule: &str) -> PyResult<Series> {
        Ok(Series {
            inner: resample(&self.inner, parse_rule(rule)?),
        })
    }

    /// Keep rows whose date lies in the inclusive `YYYY-MM-DD` range.
    #[pyo3(signature = (start = None, end = None))]
    fn filter_range(&self, start: Option<&str>, end: Option<&str>) -> PyResult<Series> {
        let range = date_range(start, end)?;
        Ok(Series {
            inner: self.inner.filter_range(&range).map_err(to_py_err)?,
        })
    }

    fn to_csv(&self) -> PyResult<String> {
        series_to_csv_string(&self.inner).map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "Series(len={}, first={:?}, last={:?})",
            self.inner.len(),
            self.inner.first_timestamp().map(|t| t.to_string()),
            self.inner.last_timestamp().map(|t| t.to_string())
        )
    }
}

/// One sampled portfolio.
#[pyclass]
#[derive(Clone)]
pub struct PortfolioSample {
    #[pyo3(get)]
    pub weights: Vec<f64>,
    #[pyo3(get)]
    pub expected_return: f64,
    #[pyo3(get)]
    pub risk: f64,
}

#[pymethods]
impl PortfolioSample {
    #[getter]
    fn return_to_risk(&self) -> f64 {
        if self.risk > 0.0 {
            self.expected_return / self.risk
        } else {
            0.0
        }
    }
}

impl From<&RustPortfolioSample> for PortfolioSample {
    fn from(p: &RustPortfolioSample) -> Self {
        PortfolioSample {
            weights: p.weights.clone(),
            expected_return: p.expected_return,
            risk: p.risk,
        }
    }
}

/// Descriptive statistics of one column.
#[pyclass]
#[derive(Clone)]
pub struct ColumnSummary {
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub count: usize,
    #[pyo3(get)]
    pub mean: f64,
    #[pyo3(get)]
    pub std: f64,
    #[pyo3(get)]
    pub min: f64,
    #[pyo3(get)]
    pub q25: f64,
    #[pyo3(get)]
    pub median: f64,
    #[pyo3(get)]
    pub q75: f64,
    #[pyo3(get)]
    pub max: f64,
}

impl From<RustColumnSummary> for ColumnSummary {
    fn from(c: RustColumnSummary) -> Self {
        ColumnSummary {
            name: c.name,
            count: c.count,
            mean: c.mean,
            std: c.std,
            min: c.min,
            q25: c.q25,
            median: c.median,
            q75: c.q75,
            max: c.max,
        }
    }
}

/// Cash-flow ledger totals.
#[pyclass]
#[derive(Clone)]
pub struct CashFlowSummary {
    #[pyo3(get)]
    pub total_income: f64,
    #[pyo3(get)]
    pub total_expenses: f64,
    #[pyo3(get)]
    pub net_balance: f64,
    #[pyo3(get)]
    pub savings: f64,
    #[pyo3(get)]
    pub goal_progress_pct: f64,
    #[pyo3(get)]
    pub goal_progress: f64,
}

impl From<RustCashFlowSummary> for CashFlowSummary {
    fn from(s: RustCashFlowSummary) -> Self {
        CashFlowSummary {
            total_income: s.total_income,
            total_expenses: s.total_expenses,
            net_balance: s.net_balance,
            savings: s.savings,
            goal_progress_pct: s.goal_progress_pct,
            goal_progress: s.goal_progress,
        }
    }
}

// ============================================================================
// Engine classes
// ============================================================================

/// Session pipeline: ingest, normalize, aggregate, filter. Successful
/// uploads and fetches are memoized for the life of the object.
#[pyclass]
pub struct PyPipeline {
    inner: Pipeline,
    config: RustConfig,
}

#[pymethods]
impl PyPipeline {
    /// Build from an optional TOML configuration document.
    #[new]
    #[pyo3(signature = (config_toml = None))]
    fn new(config_toml: Option<&str>) -> PyResult<Self> {
        let config = match config_toml {
            Some(raw) => RustConfig::from_toml_str(raw).map_err(to_py_err)?,
            None => RustConfig::default(),
        };
        let inner = Pipeline::from_config(&config).map_err(to_py_err)?;
        Ok(PyPipeline { inner, config })
    }

    /// Canonical series from uploaded CSV bytes.
    fn load_csv(&self, data: &[u8]) -> PyResult<Series> {
        let inner = self.inner.series_from_bytes(data).map_err(to_py_err)?;
        Ok(Series { inner })
    }

    /// Canonical series from a vendor (`alphavantage`, `stooq`, `binance`).
    #[pyo3(signature = (vendor, symbol, api_key = None, interval = "1d", start = None, end = None))]
    fn fetch(
        &self,
        vendor: &str,
        symbol: &str,
        api_key: Option<String>,
        interval: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> PyResult<Series> {
        let vendor = match vendor.trim().to_ascii_lowercase().as_str() {
            "alphavantage" | "alpha_vantage" => Vendor::AlphaVantage {
                api_key: api_key.ok_or_else(|| PyValueError::new_err("alphavantage requires api_key"))?,
            },
            "stooq" => Vendor::Stooq,
            "binance" => Vendor::Binance {
                interval: interval.to_string(),
            },
            other => return Err(PyValueError::new_err(format!("unknown vendor: {other}"))),
        };
        let request = FetchRequest::new(vendor, symbol).with_range(date_range(start, end)?);
        let inner = self.inner.series_from_fetch(&request).map_err(to_py_err)?;
        Ok(Series { inner })
    }

    /// Annualized `(asset, return, risk)` for a multi-asset price upload.
    fn asset_performance(&self, data: &[u8]) -> PyResult<Vec<(String, f64, f64)>> {
        let prices = self.inner.price_table_from_bytes(data).map_err(to_py_err)?;
        Ok(finboard_stats::asset_performance(&prices)
            .into_iter()
            .map(|p| (p.asset, p.annualized_return, p.annualized_risk))
            .collect())
    }

    /// `(labels, matrix)` correlation of daily returns.
    fn correlation(&self, data: &[u8]) -> PyResult<(Vec<String>, Vec<Vec<f64>>)> {
        let prices = self.inner.price_table_from_bytes(data).map_err(to_py_err)?;
        let corr = finboard_stats::correlation_matrix(&finboard_stats::returns_table(&prices)).map_err(to_py_err)?;
        Ok((corr.labels, corr.values))
    }

    /// Per-column count, mean, std, min, quartiles, max.
    fn describe(&self, data: &[u8]) -> PyResult<Vec<ColumnSummary>> {
        let prices = self.inner.price_table_from_bytes(data).map_err(to_py_err)?;
        Ok(finboard_stats::describe(&prices).into_iter().map(ColumnSummary::from).collect())
    }

    /// Random portfolios over the assets of a price upload.
    #[pyo3(signature = (data, samples = None, concentration = None, seed = None))]
    fn sample_portfolios(
        &self,
        data: &[u8],
        samples: Option<usize>,
        concentration: Option<f64>,
        seed: Option<u64>,
    ) -> PyResult<Vec<PortfolioSample>> {
        let prices = self.inner.price_table_from_bytes(data).map_err(to_py_err)?;
        let sim = &self.config.simulation;
        let sampler = PortfolioSampler::new(
            samples.unwrap_or(sim.portfolio_samples),
            concentration.unwrap_or(sim.dirichlet_concentration),
            seed.or(sim.portfolio_seed),
        );
        let drawn = sampler.sample_prices(&prices).map_err(to_py_err)?;
        Ok(drawn.iter().map(PortfolioSample::from).collect())
    }
}

/// Streaming bar builder for ticks.
#[pyclass]
pub struct PyBarBuilder {
    inner: BarBuilder,
}

#[pymethods]
impl PyBarBuilder {
    #[new]
    #[pyo3(signature = (rule = "minute"))]
    fn new(rule: &str) -> PyResult<Self> {
        Ok(PyBarBuilder {
            inner: BarBuilder::new(parse_rule(rule)?),
        })
    }

    /// Add a tick. Ticks must arrive in time order.
    fn add_tick(&mut self, tick: Tick) -> PyResult<()> {
        self.inner.add_tick(&tick.try_into()?);
        Ok(())
    }

    /// Finalize and emit bars of buckets before the one holding `current_ts_ms`.
    fn finalize_before(&mut self, current_ts_ms: i64) -> PyResult<Vec<Bar>> {
        let current = finboard_core::from_epoch_ms(current_ts_ms)
            .ok_or_else(|| PyValueError::new_err(format!("timestamp out of range: {current_ts_ms}")))?;
        Ok(self.inner.finalize_before(current).iter().map(Bar::from).collect())
    }

    /// Emit every pending bar.
    fn finish(&mut self) -> Vec<Bar> {
        self.inner.finish().iter().map(Bar::from).collect()
    }

    /// Get number of pending bars.
    fn pending_bar_count(&self) -> usize {
        self.inner.pending_bar_count()
    }

    /// Clear all state.
    fn clear(&mut self) {
        self.inner.clear();
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Normalize CSV bytes without a pipeline (no caching, no date filter).
#[pyfunction]
#[pyo3(signature = (data, rule = "day"))]
fn load_series_csv(data: &[u8], rule: &str) -> PyResult<Series> {
    let table = finboard_ingestion::read_csv_bytes(data).map_err(to_py_err)?;
    let rule = parse_rule(rule)?;
    let inner = match Normalizer::default().normalize(&table).map_err(to_py_err)? {
        finboard_ingestion::Normalized::Ticks(ticks) => aggregate_ticks(&ticks, rule),
        finboard_ingestion::Normalized::Bars(series) => series,
    };
    Ok(Series { inner })
}

/// Aggregate ticks into bars.
#[pyfunction]
#[pyo3(signature = (ticks, rule = "minute"))]
fn aggregate(ticks: Vec<Tick>, rule: &str) -> PyResult<Series> {
    let ticks: Vec<RustTick> = ticks.into_iter().map(RustTick::try_from).collect::<PyResult<_>>()?;
    Ok(Series {
        inner: aggregate_ticks(&ticks, parse_rule(rule)?),
    })
}

/// GBM growth paths as `paths[sample][period]`.
#[pyfunction]
#[pyo3(signature = (expected_return = 0.10, volatility = 0.15, horizon = 10, samples = 500, seed = Some(42)))]
fn simulate_paths(
    expected_return: f64,
    volatility: f64,
    horizon: usize,
    samples: usize,
    seed: Option<u64>,
) -> PyResult<Vec<Vec<f64>>> {
    let matrix = PathSimulator::new(expected_return, volatility, horizon, samples, seed)
        .simulate()
        .map_err(to_py_err)?;
    Ok(matrix.paths)
}

/// Cash-flow summary of a `category,amount,kind` CSV ledger.
#[pyfunction]
#[pyo3(signature = (data, savings_goal = 1000.0))]
fn cashflow_summary(data: &[u8], savings_goal: f64) -> PyResult<CashFlowSummary> {
    let entries = finboard_stats::read_ledger_csv(data).map_err(to_py_err)?;
    Ok(RustCashFlowSummary::compute(&entries, savings_goal).into())
}

/// The lowest-risk sample.
#[pyfunction]
fn min_risk(samples: Vec<PortfolioSample>) -> Option<PortfolioSample> {
    let rust: Vec<RustPortfolioSample> = samples.into_iter().map(to_rust_sample).collect();
    rust_min_risk(&rust).map(PortfolioSample::from)
}

/// The sample with the best return per unit of risk.
#[pyfunction]
fn best_return_to_risk(samples: Vec<PortfolioSample>) -> Option<PortfolioSample> {
    let rust: Vec<RustPortfolioSample> = samples.into_iter().map(to_rust_sample).collect();
    rust_best_return_to_risk(&rust).map(PortfolioSample::from)
}

fn to_rust_sample(p: PortfolioSample) -> RustPortfolioSample {
    RustPortfolioSample {
        weights: p.weights,
        expected_return: p.expected_return,
        risk: p.risk,
    }
}

// ============================================================================
// Module Definition
// ============================================================================

/// finboard - market-data normalization and statistics in Rust.
#[pymodule]
fn finboard(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<Tick>()?;
    m.add_class::<Bar>()?;
    m.add_class::<Series>()?;
    m.add_class::<SummaryStatistics>()?;
    m.add_class::<PortfolioSample>()?;
    m.add_class::<ColumnSummary>()?;
    m.add_class::<CashFlowSummary>()?;

    // Engine classes
    m.add_class::<PyPipeline>()?;
    m.add_class::<PyBarBuilder>()?;

    // Functions
    m.add_function(wrap_pyfunction!(load_series_csv, m)?)?;
    m.add_function(wrap_pyfunction!(aggregate, m)?)?;
    m.add_function(wrap_pyfunction!(simulate_paths, m)?)?;
    m.add_function(wrap_pyfunction!(cashflow_summary, m)?)?;
    m.add_function(wrap_pyfunction!(min_risk, m)?)?;
    m.add_function(wrap_pyfunction!(best_return_to_risk, m)?)?;

    Ok(())
}
