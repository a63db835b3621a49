//! Ingest -> detect -> normalize -> aggregate -> filter.

use crate::bar_builder::{aggregate_ticks, resample};
use crate::fetch::{FetchRequest, ReqwestTransport, Transport};
use crate::ingestor::Ingestor;
use crate::normalizer::{Normalized, Normalizer};
use finboard_core::config::AggregationConfig;
use finboard_core::{CanonicalSeries, Config, PriceTable, RawTable, Result, SeriesSource};
use tracing::info;

/// End-to-end series loader configured once per session.
pub struct Pipeline<T: Transport = ReqwestTransport> {
    ingestor: Ingestor<T>,
    normalizer: Normalizer,
    aggregation: AggregationConfig,
}

impl Pipeline<ReqwestTransport> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let ingestor = Ingestor::from_config(config.ingest.clone())?;
        Ok(Self::new(ingestor, Normalizer::from_config(&config.normalize), config.aggregation.clone()))
    }
}

impl<T: Transport> Pipeline<T> {
    pub fn new(ingestor: Ingestor<T>, normalizer: Normalizer, aggregation: AggregationConfig) -> Self {
        Self {
            ingestor,
            normalizer,
            aggregation,
        }
    }

    pub fn ingestor(&self) -> &Ingestor<T> {
        &self.ingestor
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn aggregation(&self) -> &AggregationConfig {
        &self.aggregation
    }

    /// Canonical series from uploaded CSV bytes.
    pub fn series_from_bytes(&self, bytes: &[u8]) -> Result<CanonicalSeries> {
        let table = self.ingestor.read_upload(bytes)?;
        self.series_from_table(&table)
    }

    /// Canonical series from a vendor fetch.
    pub fn series_from_fetch(&self, request: &FetchRequest) -> Result<CanonicalSeries> {
        let table = self.ingestor.fetch(request)?;
        self.series_from_table(&table)
    }

    /// Ticks are aggregated and klines resampled at the configured period;
    /// end-of-day series pass through. The date range applies last.
    pub fn series_from_table(&self, table: &RawTable) -> Result<CanonicalSeries> {
        let rule = self.aggregation.period;
        let series = match self.normalizer.normalize(table)? {
            Normalized::Ticks(ticks) => aggregate_ticks(&ticks, rule),
            Normalized::Bars(series) if series.source == SeriesSource::Kline => resample(&series, rule),
            Normalized::Bars(series) => series,
        };
        let filtered = series.filter_range(&self.aggregation.date_range)?;
        info!(
            bars = filtered.len(),
            first = ?filtered.first_timestamp(),
            last = ?filtered.last_timestamp(),
            "series ready"
        );
        Ok(filtered)
    }

    /// Multi-asset price table from uploaded CSV bytes, filtered to the
    /// configured date range.
    pub fn price_table_from_bytes(&self, bytes: &[u8]) -> Result<PriceTable> {
        let table = self.ingestor.read_upload(bytes)?;
        let prices = self.normalizer.normalize_price_table(&table)?;
        prices.filter_range(&self.aggregation.date_range)
    }
}
