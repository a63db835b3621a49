//! Fixed-width bar building from ticks or finer bars.
//!
//! Buckets are right-open and aligned to UTC multiples of the period width.
//! Empty buckets produce no bar.

use chrono::NaiveDateTime;
use finboard_core::{
    to_epoch_ms, CanonicalBar, CanonicalSeries, PeriodRule, RawTick, SeriesSource, TimestampMs,
};
use std::collections::BTreeMap;
use tracing::info;

/// Streaming builder for bars of one period rule.
pub struct BarBuilder {
    rule: PeriodRule,
    /// Bars being built, keyed by bucket start.
    bars: BTreeMap<TimestampMs, BarInProgress>,
}

/// A bar that's currently being built.
#[derive(Debug, Clone)]
struct BarInProgress {
    bucket: NaiveDateTime,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    adj_close: Option<f64>,
    volume: Option<f64>,
    vwap_numerator: f64,
    vwap_volume: f64,
    vwap_seen: bool,
    members: u32,
    /// The first member when it was a bar; cleared once a second member arrives.
    only_bar: Option<CanonicalBar>,
}

fn max_opt(acc: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (acc, value) {
        (Some(a), Some(v)) => Some(a.max(v)),
        (a, v) => a.or(v),
    }
}

fn min_opt(acc: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (acc, value) {
        (Some(a), Some(v)) => Some(a.min(v)),
        (a, v) => a.or(v),
    }
}

fn sum_opt(acc: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (acc, value) {
        (Some(a), Some(v)) => Some(a + v),
        (a, v) => a.or(v),
    }
}

impl BarInProgress {
    fn new(bucket: NaiveDateTime) -> Self {
        Self {
            bucket,
            open: None,
            high: None,
            low: None,
            close: None,
            adj_close: None,
            volume: None,
            vwap_numerator: 0.0,
            vwap_volume: 0.0,
            vwap_seen: false,
            members: 0,
            only_bar: None,
        }
    }

    fn add_tick(&mut self, price: f64, quantity: f64) {
        if self.open.is_none() {
            self.open = Some(price);
        }
        self.high = max_opt(self.high, Some(price));
        self.low = min_opt(self.low, Some(price));
        self.close = Some(price);
        self.volume = sum_opt(self.volume, Some(quantity));
        self.vwap_numerator += price * quantity;
        self.vwap_volume += quantity;
        self.vwap_seen = true;
        self.members += 1;
        self.only_bar = None;
    }

    fn add_bar(&mut self, bar: &CanonicalBar) {
        self.only_bar = if self.members == 0 { Some(bar.clone()) } else { None };
        self.members += 1;

        self.open = self.open.or(bar.open);
        self.high = max_opt(self.high, bar.high);
        self.low = min_opt(self.low, bar.low);
        self.close = bar.close.or(self.close);
        self.adj_close = bar.adj_close.or(self.adj_close);
        self.volume = sum_opt(self.volume, bar.volume);
        if let (Some(vwap), Some(volume)) = (bar.vwap, bar.volume) {
            self.vwap_numerator += vwap * volume;
            self.vwap_volume += volume;
            self.vwap_seen = true;
        }
    }

    fn vwap(&self) -> Option<f64> {
        if self.vwap_seen && self.vwap_volume > 0.0 {
            Some(self.vwap_numerator / self.vwap_volume)
        } else {
            None
        }
    }

    fn to_bar(&self) -> CanonicalBar {
        if let Some(only) = &self.only_bar {
            return CanonicalBar {
                timestamp: self.bucket,
                ..only.clone()
            };
        }
        CanonicalBar {
            timestamp: self.bucket,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            adj_close: self.adj_close,
            volume: self.volume,
            vwap: self.vwap(),
        }
    }
}

impl BarBuilder {
    /// Create a new bar builder.
    pub fn new(rule: PeriodRule) -> Self {
        Self {
            rule,
            bars: BTreeMap::new(),
        }
    }

    pub fn rule(&self) -> PeriodRule {
        self.rule
    }

    fn entry(&mut self, ts: NaiveDateTime) -> &mut BarInProgress {
        let bucket = self.rule.bucket_start(ts);
        self.bars
            .entry(to_epoch_ms(bucket))
            .or_insert_with(|| BarInProgress::new(bucket))
    }

    /// Add a tick. Ticks must arrive in time order for `open`/`close` to be
    /// the first and last trade of the bucket.
    pub fn add_tick(&mut self, tick: &RawTick) {
        self.entry(tick.timestamp).add_tick(tick.price, tick.quantity);
    }

    /// Add multiple ticks.
    pub fn add_ticks(&mut self, ticks: &[RawTick]) {
        for tick in ticks {
            self.add_tick(tick);
        }
    }

    /// Add a finer-grained bar.
    pub fn add_bar(&mut self, bar: &CanonicalBar) {
        self.entry(bar.timestamp).add_bar(bar);
    }

    /// Finalize and return completed bars whose bucket ends at or before the
    /// bucket holding `current`.
    pub fn finalize_before(&mut self, current: NaiveDateTime) -> Vec<CanonicalBar> {
        let current_bucket = self.rule.bucket_start_ms(to_epoch_ms(current));
        let pending = self.bars.split_off(&current_bucket);
        let completed = std::mem::replace(&mut self.bars, pending);
        completed.values().map(BarInProgress::to_bar).collect()
    }

    /// Force finalize the bucket holding `ts`, even if not complete.
    pub fn force_finalize(&mut self, ts: NaiveDateTime) -> Option<CanonicalBar> {
        let bucket = self.rule.bucket_start_ms(to_epoch_ms(ts));
        self.bars.remove(&bucket).map(|bar| bar.to_bar())
    }

    /// Finalize every pending bar, in time order.
    pub fn finish(&mut self) -> Vec<CanonicalBar> {
        std::mem::take(&mut self.bars)
            .into_values()
            .map(|bar| bar.to_bar())
            .collect()
    }

    /// Get the number of bars currently being built.
    pub fn pending_bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Clear all state.
    pub fn clear(&mut self) {
        self.bars.clear();
    }
}

/// Bucket ticks into OHLCV bars with VWAP.
///
/// Ticks are stably sorted first, so ties keep their input order.
pub fn aggregate_ticks(ticks: &[RawTick], rule: PeriodRule) -> CanonicalSeries {
    let mut ordered: Vec<&RawTick> = ticks.iter().collect();
    ordered.sort_by_key(|t| t.timestamp);

    let mut builder = BarBuilder::new(rule);
    for tick in ordered {
        builder.add_tick(tick);
    }
    let bars = builder.finish();
    info!(ticks = ticks.len(), bars = bars.len(), rule = %rule, "aggregated ticks");
    CanonicalSeries::new(SeriesSource::Aggregated(rule), bars)
}

/// Re-bucket an existing series. A bucket holding one bar keeps that bar's
/// fields, so resampling twice at the same rule changes nothing.
pub fn resample(series: &CanonicalSeries, rule: PeriodRule) -> CanonicalSeries {
    let mut builder = BarBuilder::new(rule);
    for bar in &series.bars {
        builder.add_bar(bar);
    }
    let bars = builder.finish();
    info!(input = series.len(), bars = bars.len(), rule = %rule, "resampled bars");
    CanonicalSeries::new(SeriesSource::Aggregated(rule), bars)
}
