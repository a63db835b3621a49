//! Core data types for the finboard pipeline.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Trading days per year used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Interpret a naive timestamp as UTC and return epoch milliseconds.
#[inline]
pub fn to_epoch_ms(ts: NaiveDateTime) -> TimestampMs {
    ts.and_utc().timestamp_millis()
}

/// Convert epoch milliseconds to a naive UTC timestamp.
#[inline]
pub fn from_epoch_ms(ts_ms: TimestampMs) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ts_ms).map(|dt| dt.naive_utc())
}

/// Align a timestamp to the start of its fixed-width bucket.
#[inline]
pub fn ts_to_bucket(ts_ms: TimestampMs, width_ms: i64) -> TimestampMs {
    ts_ms - ts_ms.rem_euclid(width_ms)
}

/// Resampling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodRule {
    Minute,
    Hour,
    Day,
}

impl PeriodRule {
    /// Bucket width in milliseconds.
    #[inline]
    pub fn width_ms(self) -> i64 {
        match self {
            PeriodRule::Minute => 60_000,
            PeriodRule::Hour => 3_600_000,
            PeriodRule::Day => 86_400_000,
        }
    }

    /// Start of the bucket holding `ts_ms`.
    #[inline]
    pub fn bucket_start_ms(self, ts_ms: TimestampMs) -> TimestampMs {
        ts_to_bucket(ts_ms, self.width_ms())
    }

    /// Start of the bucket holding `ts`.
    pub fn bucket_start(self, ts: NaiveDateTime) -> NaiveDateTime {
        let start = self.bucket_start_ms(to_epoch_ms(ts));
        from_epoch_ms(start).unwrap_or(ts)
    }
}

impl fmt::Display for PeriodRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeriodRule::Minute => "minute",
            PeriodRule::Hour => "hour",
            PeriodRule::Day => "day",
        };
        f.write_str(s)
    }
}

impl FromStr for PeriodRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" | "1min" | "min" | "minute" | "t" => Ok(PeriodRule::Minute),
            "1h" | "h" | "hour" | "hourly" => Ok(PeriodRule::Hour),
            "1d" | "d" | "day" | "daily" => Ok(PeriodRule::Day),
            other => Err(Error::config(format!("unsupported period rule: {other}"))),
        }
    }
}

/// Price column used for return computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceColumn {
    Close,
    Vwap,
    AdjClose,
}

impl fmt::Display for PriceColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriceColumn::Close => "close",
            PriceColumn::Vwap => "vwap",
            PriceColumn::AdjClose => "adj_close",
        };
        f.write_str(s)
    }
}

impl FromStr for PriceColumn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "close" => Ok(PriceColumn::Close),
            "vwap" => Ok(PriceColumn::Vwap),
            "adj_close" | "adjclose" | "adjusted_close" | "adj close" => Ok(PriceColumn::AdjClose),
            other => Err(Error::config(format!("unsupported price column: {other}"))),
        }
    }
}

/// Inclusive calendar-date filter. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(Error::config(format!("date range start {s} is after end {e}")));
            }
        }
        Ok(Self { start, end })
    }

    /// Range with neither bound set.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Whether the timestamp's calendar date lies inside the range.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let date = ts.date();
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_bound = |b: Option<NaiveDate>| b.map_or_else(|| "..".to_string(), |d| d.to_string());
        write!(f, "[{}, {}]", fmt_bound(self.start), fmt_bound(self.end))
    }
}

/// An untyped table exactly as read from a file or vendor response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Original column names.
    pub headers: Vec<String>,
    /// Cell values, one `Vec` per row, each as wide as `headers`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, column), empty string when the row is short.
    #[inline]
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    /// Trade time (naive UTC).
    pub timestamp: NaiveDateTime,
    /// Trade price.
    pub price: f64,
    /// Quantity in base-asset units.
    pub quantity: f64,
    /// Quantity in quote-asset units (`price * quantity` when the source omits it).
    pub quote_quantity: f64,
    /// Exchange trade id, if present.
    pub trade_id: Option<i64>,
    /// Whether the buyer was the maker, if present.
    pub is_buyer_maker: Option<bool>,
}

impl RawTick {
    /// Build a tick with derived quote quantity and no optional fields.
    pub fn new(timestamp: NaiveDateTime, price: f64, quantity: f64) -> Self {
        Self {
            timestamp,
            price,
            quantity,
            quote_quantity: price * quantity,
            trade_id: None,
            is_buyer_maker: None,
        }
    }

    #[inline]
    pub fn ts_ms(&self) -> TimestampMs {
        to_epoch_ms(self.timestamp)
    }
}

/// One row of a canonical OHLCV table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalBar {
    /// Bar time (naive UTC), strictly increasing within a series.
    pub timestamp: NaiveDateTime,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    /// Vendor-adjusted close, kept apart from `close`.
    pub adj_close: Option<f64>,
    /// Traded volume, absent when the source lacks it.
    pub volume: Option<f64>,
    /// VWAP, only when derived from ticks.
    pub vwap: Option<f64>,
}

impl CanonicalBar {
    /// A bar carrying only a close price.
    pub fn close_only(timestamp: NaiveDateTime, close: f64) -> Self {
        Self {
            timestamp,
            open: None,
            high: None,
            low: None,
            close: Some(close),
            adj_close: None,
            volume: None,
            vwap: None,
        }
    }

    /// A full OHLCV bar without adjusted close or VWAP.
    pub fn ohlcv(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            adj_close: None,
            volume: Some(volume),
            vwap: None,
        }
    }

    /// Value of the selected price column.
    #[inline]
    pub fn price(&self, column: PriceColumn) -> Option<f64> {
        match column {
            PriceColumn::Close => self.close,
            PriceColumn::Vwap => self.vwap,
            PriceColumn::AdjClose => self.adj_close,
        }
    }

    /// Whether any price field is present.
    pub fn has_price(&self) -> bool {
        self.open.is_some()
            || self.high.is_some()
            || self.low.is_some()
            || self.close.is_some()
            || self.adj_close.is_some()
    }

    /// Check `high >= max(open, close)` and `low <= min(open, close)` for the
    /// fields that are present.
    pub fn is_consistent(&self) -> bool {
        if let (Some(h), Some(l)) = (self.high, self.low) {
            if h < l {
                return false;
            }
        }
        for px in [self.open, self.close].into_iter().flatten() {
            if self.high.is_some_and(|h| h < px) || self.low.is_some_and(|l| l > px) {
                return false;
            }
        }
        true
    }
}

/// Which detected input shape (or aggregation) produced a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesSource {
    /// Bars built by bucketing ticks or finer bars.
    Aggregated(PeriodRule),
    /// Vendor klines (already-aggregated bars with an open time).
    Kline,
    /// Generic end-of-day date + price table.
    GenericEod,
}

/// A time-ordered canonical series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSeries {
    pub source: SeriesSource,
    pub bars: Vec<CanonicalBar>,
}

impl CanonicalSeries {
    /// Wrap bars that are already strictly increasing.
    pub fn new(source: SeriesSource, bars: Vec<CanonicalBar>) -> Self {
        Self { source, bars }
    }

    /// Stable-sort by timestamp and drop later duplicates.
    pub fn from_unsorted(source: SeriesSource, mut bars: Vec<CanonicalBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by(|later, earlier| later.timestamp == earlier.timestamp);
        Self { source, bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.last().map(|b| b.timestamp)
    }

    /// Values of one price column, skipping bars where it is absent.
    pub fn prices(&self, column: PriceColumn) -> Vec<f64> {
        self.bars.iter().filter_map(|b| b.price(column)).collect()
    }

    /// Keep only bars whose date lies in `range`.
    ///
    /// Fails with `EmptyRange` when the series is non-empty but nothing
    /// survives the filter.
    pub fn filter_range(&self, range: &DateRange) -> Result<CanonicalSeries> {
        if range.is_unbounded() {
            return Ok(self.clone());
        }
        let bars: Vec<CanonicalBar> = self
            .bars
            .iter()
            .filter(|b| range.contains(b.timestamp))
            .cloned()
            .collect();
        if bars.is_empty() {
            return Err(Error::empty_range(format!(
                "no rows between {} ({} rows outside the range)",
                range,
                self.bars.len()
            )));
        }
        Ok(CanonicalSeries::new(self.source, bars))
    }
}

/// Row labels of a [`PriceTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum PriceIndex {
    /// One timestamp per row, ascending.
    Dates(Vec<NaiveDateTime>),
    /// No date column; rows are labelled by position.
    Rows(usize),
}

impl PriceIndex {
    pub fn len(&self) -> usize {
        match self {
            PriceIndex::Dates(ts) => ts.len(),
            PriceIndex::Rows(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of row `i`, `None` for positional rows.
    pub fn timestamp(&self, i: usize) -> Option<NaiveDateTime> {
        match self {
            PriceIndex::Dates(ts) => ts.get(i).copied(),
            PriceIndex::Rows(_) => None,
        }
    }

    /// Index of the selected rows, in the given order.
    pub fn select(&self, rows: &[usize]) -> PriceIndex {
        match self {
            PriceIndex::Dates(ts) => PriceIndex::Dates(rows.iter().map(|&i| ts[i]).collect()),
            PriceIndex::Rows(_) => PriceIndex::Rows(rows.len()),
        }
    }
}

/// Wide table of asset prices sharing one row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    pub index: PriceIndex,
    /// Asset names, one per column.
    pub assets: Vec<String>,
    /// Column-major prices: `columns[asset][row]`, NaN when missing.
    pub columns: Vec<Vec<f64>>,
}

impl PriceTable {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Whether rows carry timestamps.
    pub fn is_dated(&self) -> bool {
        matches!(self.index, PriceIndex::Dates(_))
    }

    /// Prices of one asset by name.
    pub fn column(&self, asset: &str) -> Option<&[f64]> {
        self.assets
            .iter()
            .position(|a| a == asset)
            .map(|i| self.columns[i].as_slice())
    }

    /// Restrict to the given rows.
    pub fn select_rows(&self, rows: &[usize]) -> PriceTable {
        PriceTable {
            index: self.index.select(rows),
            assets: self.assets.clone(),
            columns: self
                .columns
                .iter()
                .map(|col| rows.iter().map(|&i| col[i]).collect())
                .collect(),
        }
    }

    /// Restrict to rows in `range`. A positional table only accepts an
    /// unbounded range.
    pub fn filter_range(&self, range: &DateRange) -> Result<PriceTable> {
        if range.is_unbounded() {
            return Ok(self.clone());
        }
        let PriceIndex::Dates(timestamps) = &self.index else {
            return Err(Error::config(format!(
                "cannot filter {range}: the price table has no date column"
            )));
        };
        let keep: Vec<usize> = (0..timestamps.len())
            .filter(|&i| range.contains(timestamps[i]))
            .collect();
        if keep.is_empty() {
            return Err(Error::empty_range(format!("no price rows between {range}")));
        }
        Ok(self.select_rows(&keep))
    }
}
