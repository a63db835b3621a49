//! Conversion of classified raw tables into canonical data.
//!
//! One conversion function per detected format. Malformed rows are dropped
//! and counted; only an input that loses every row is an error.

use crate::detector::{detect, BarColumns, ColumnIndex, DetectedFormat, FormatKind, TickColumns};
use crate::parse::{parse_bool, parse_epoch_ms_or_timestamp, parse_integer, parse_number, parse_timestamp};
use finboard_core::config::{NormalizeConfig, ValidationPolicy};
use finboard_core::{
    CanonicalBar, CanonicalSeries, Error, PriceIndex, PriceTable, RawTable, RawTick, Result, SeriesSource,
};
use chrono::NaiveDateTime;
use tracing::{debug, info};

/// Output of [`Normalizer::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Trade ticks, sorted by time, awaiting aggregation.
    Ticks(Vec<RawTick>),
    /// A bar series (klines or end-of-day).
    Bars(CanonicalSeries),
}

impl Normalized {
    pub fn len(&self) -> usize {
        match self {
            Normalized::Ticks(ticks) => ticks.len(),
            Normalized::Bars(series) => series.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counts of dropped rows by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationStats {
    /// Rows read.
    pub total_rows: usize,
    /// Rows with a missing or unparseable timestamp.
    pub bad_timestamp: usize,
    /// Rows without any usable price (or quantity, for ticks).
    pub missing_fields: usize,
    /// Rows dropped by the validation policy.
    pub rejected: usize,
    /// Rows dropped as duplicate timestamps.
    pub duplicates: usize,
}

impl NormalizationStats {
    /// Rows that survived.
    pub fn kept(&self) -> usize {
        self.total_rows
            .saturating_sub(self.bad_timestamp + self.missing_fields + self.rejected + self.duplicates)
    }

    fn log(&self, kind: FormatKind) {
        info!(
            format = %kind,
            total = self.total_rows,
            kept = self.kept(),
            bad_timestamp = self.bad_timestamp,
            missing_fields = self.missing_fields,
            rejected = self.rejected,
            duplicates = self.duplicates,
            "normalized table"
        );
    }
}

/// Raw table to canonical data converter.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    policy: ValidationPolicy,
}

impl Normalizer {
    /// Create a normalizer with the given validation policy.
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &NormalizeConfig) -> Self {
        Self::new(config.validation)
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    /// Detect the table's format and convert it.
    pub fn normalize(&self, table: &RawTable) -> Result<Normalized> {
        match detect(table)? {
            DetectedFormat::Tick(cols) => self.normalize_ticks(table, &cols).map(Normalized::Ticks),
            DetectedFormat::Kline(cols) => self.normalize_klines(table, &cols).map(Normalized::Bars),
            DetectedFormat::GenericEod(cols) => self.normalize_eod(table, &cols).map(Normalized::Bars),
        }
    }

    /// Convert a tick table. Integer times are epoch milliseconds. Ticks are
    /// stably sorted by time and never de-duplicated.
    pub fn normalize_ticks(&self, table: &RawTable, cols: &TickColumns) -> Result<Vec<RawTick>> {
        let mut stats = NormalizationStats {
            total_rows: table.len(),
            ..Default::default()
        };
        let mut ticks = Vec::with_capacity(table.len());

        for row in 0..table.len() {
            let Some(timestamp) = parse_epoch_ms_or_timestamp(table.cell(row, cols.time)) else {
                debug!(row, value = table.cell(row, cols.time), "dropping tick: bad timestamp");
                stats.bad_timestamp += 1;
                continue;
            };
            let (Some(price), Some(quantity)) = (
                parse_number(table.cell(row, cols.price)),
                parse_number(table.cell(row, cols.qty)),
            ) else {
                debug!(row, "dropping tick: missing price or quantity");
                stats.missing_fields += 1;
                continue;
            };
            if self.policy == ValidationPolicy::DropRow && (price <= 0.0 || quantity < 0.0) {
                debug!(row, price, quantity, "dropping tick: rejected by validation policy");
                stats.rejected += 1;
                continue;
            }

            let quote_quantity = cols
                .quote_qty
                .and_then(|c| parse_number(table.cell(row, c)))
                .unwrap_or(price * quantity);

            ticks.push(RawTick {
                timestamp,
                price,
                quantity,
                quote_quantity,
                trade_id: cols.trade_id.and_then(|c| parse_integer(table.cell(row, c))),
                is_buyer_maker: cols.is_buyer_maker.and_then(|c| parse_bool(table.cell(row, c))),
            });
        }

        stats.log(FormatKind::Tick);
        if ticks.is_empty() {
            return Err(all_rows_dropped(FormatKind::Tick, &stats));
        }
        ticks.sort_by_key(|t| t.timestamp);
        Ok(ticks)
    }

    /// Convert a kline table. Integer open times are epoch milliseconds.
    pub fn normalize_klines(&self, table: &RawTable, cols: &BarColumns) -> Result<CanonicalSeries> {
        self.normalize_bars(table, cols, FormatKind::Kline, SeriesSource::Kline, parse_epoch_ms_or_timestamp)
    }

    /// Convert a generic end-of-day table.
    pub fn normalize_eod(&self, table: &RawTable, cols: &BarColumns) -> Result<CanonicalSeries> {
        self.normalize_bars(table, cols, FormatKind::GenericEod, SeriesSource::GenericEod, parse_timestamp)
    }

    fn normalize_bars(
        &self,
        table: &RawTable,
        cols: &BarColumns,
        kind: FormatKind,
        source: SeriesSource,
        parse_time: fn(&str) -> Option<NaiveDateTime>,
    ) -> Result<CanonicalSeries> {
        let mut stats = NormalizationStats {
            total_rows: table.len(),
            ..Default::default()
        };
        let mut bars = Vec::with_capacity(table.len());

        for row in 0..table.len() {
            let Some(timestamp) = parse_time(table.cell(row, cols.time)) else {
                debug!(row, value = table.cell(row, cols.time), "dropping bar: bad timestamp");
                stats.bad_timestamp += 1;
                continue;
            };
            let field = |col: Option<usize>| col.and_then(|c| parse_number(table.cell(row, c)));
            let bar = CanonicalBar {
                timestamp,
                open: field(cols.open),
                high: field(cols.high),
                low: field(cols.low),
                close: field(cols.close),
                adj_close: field(cols.adj_close),
                volume: field(cols.volume),
                vwap: field(cols.vwap),
            };
            if !bar.has_price() {
                debug!(row, "dropping bar: no price field");
                stats.missing_fields += 1;
                continue;
            }
            if self.policy == ValidationPolicy::DropRow && !passes_validation(&bar) {
                debug!(row, "dropping bar: rejected by validation policy");
                stats.rejected += 1;
                continue;
            }
            bars.push(bar);
        }

        let parsed = bars.len();
        let series = CanonicalSeries::from_unsorted(source, bars);
        stats.duplicates = parsed - series.len();
        stats.log(kind);

        if series.is_empty() {
            return Err(all_rows_dropped(kind, &stats));
        }
        Ok(series)
    }

    /// Convert a wide multi-asset price table.
    ///
    /// The index is the first `date`/`time` column, else column 0 when it
    /// holds date text. Without either, rows are indexed by position and
    /// column 0 is an ordinary column. Every non-index column holding at
    /// least one number is an asset; missing cells are NaN.
    pub fn normalize_price_table(&self, table: &RawTable) -> Result<PriceTable> {
        let index = ColumnIndex::new(&table.headers);
        let time_col = index
            .find("date")
            .or_else(|| index.find("time"))
            .or_else(|| (table.headers.len() > 1 && holds_date_text(table, 0)).then_some(0));

        let asset_cols: Vec<usize> = (0..table.headers.len())
            .filter(|&c| Some(c) != time_col)
            .filter(|&c| (0..table.len()).any(|r| parse_number(table.cell(r, c)).is_some()))
            .collect();
        if asset_cols.is_empty() {
            return Err(Error::normalization("price table has no numeric asset columns"));
        }

        let mut stats = NormalizationStats {
            total_rows: table.len(),
            ..Default::default()
        };
        let mut rows: Vec<(Option<NaiveDateTime>, Vec<f64>)> = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let timestamp = match time_col {
                Some(col) => match parse_timestamp(table.cell(row, col)) {
                    Some(ts) => Some(ts),
                    None => {
                        debug!(row, value = table.cell(row, col), "dropping price row: bad timestamp");
                        stats.bad_timestamp += 1;
                        continue;
                    }
                },
                None => None,
            };
            let values: Vec<f64> = asset_cols
                .iter()
                .map(|&c| parse_number(table.cell(row, c)).unwrap_or(f64::NAN))
                .collect();
            if values.iter().all(|v| v.is_nan()) {
                stats.missing_fields += 1;
                continue;
            }
            if self.policy == ValidationPolicy::DropRow && values.iter().any(|&v| v <= 0.0) {
                stats.rejected += 1;
                continue;
            }
            rows.push((timestamp, values));
        }

        if time_col.is_some() {
            let parsed = rows.len();
            rows.sort_by_key(|(ts, _)| *ts);
            rows.dedup_by(|later, earlier| later.0 == earlier.0);
            stats.duplicates = parsed - rows.len();
        }
        stats.log(FormatKind::GenericEod);

        if rows.is_empty() {
            return Err(all_rows_dropped(FormatKind::GenericEod, &stats));
        }

        let assets: Vec<String> = asset_cols.iter().map(|&c| table.headers[c].trim().to_string()).collect();
        let mut columns = vec![Vec::with_capacity(rows.len()); assets.len()];
        let mut timestamps = Vec::with_capacity(rows.len());
        let row_count = rows.len();
        for (ts, values) in rows {
            timestamps.extend(ts);
            for (column, value) in columns.iter_mut().zip(values) {
                column.push(value);
            }
        }
        let index = match time_col {
            Some(_) => PriceIndex::Dates(timestamps),
            None => PriceIndex::Rows(row_count),
        };
        Ok(PriceTable {
            index,
            assets,
            columns,
        })
    }
}

/// Whether some cell of `col` is date text rather than a plain number.
fn holds_date_text(table: &RawTable, col: usize) -> bool {
    (0..table.len()).any(|r| {
        let cell = table.cell(r, col);
        parse_number(cell).is_none() && parse_timestamp(cell).is_some()
    })
}

fn passes_validation(bar: &CanonicalBar) -> bool {
    let prices = [bar.open, bar.high, bar.low, bar.close, bar.adj_close, bar.vwap];
    if prices.iter().flatten().any(|&p| p <= 0.0) {
        return false;
    }
    if bar.volume.is_some_and(|v| v < 0.0) {
        return false;
    }
    bar.is_consistent()
}

fn all_rows_dropped(kind: FormatKind, stats: &NormalizationStats) -> Error {
    Error::normalization(format!(
        "all {} rows of the {} table were unusable ({} bad timestamps, {} missing fields, {} rejected)",
        stats.total_rows, kind, stats.bad_timestamp, stats.missing_fields, stats.rejected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_csv_bytes;
    use finboard_core::PriceColumn;

    fn normalize_csv(csv: &str) -> Result<Normalized> {
        Normalizer::default().normalize(&read_csv_bytes(csv.as_bytes())?)
    }

    #[test]
    fn test_ticks_sorted_without_dedup() {
        let csv = "id,price,qty,time,is_buyer_maker\n\
                   3,101,1,61000,false\n\
                   1,100,1,0,true\n\
                   2,102,2,0,false\n";
        let Normalized::Ticks(ticks) = normalize_csv(csv).unwrap() else {
            panic!("expected ticks");
        };
        assert_eq!(ticks.len(), 3);
        // Equal timestamps keep input order.
        assert_eq!(ticks[0].trade_id, Some(1));
        assert_eq!(ticks[1].trade_id, Some(2));
        assert_eq!(ticks[2].trade_id, Some(3));
        assert_eq!(ticks[0].is_buyer_maker, Some(true));
        assert!((ticks[1].quote_quantity - 204.0).abs() < 1e-12);
    }

    #[test]
    fn test_small_tick_times_are_millis() {
        let csv = "price,qty,time\n100,1,0\n102,2,500\n101,1,61000\n";
        let Normalized::Ticks(ticks) = normalize_csv(csv).unwrap() else {
            panic!("expected ticks");
        };
        assert_eq!(ticks[1].ts_ms(), 500);
        assert_eq!(ticks[2].ts_ms(), 61_000);

        let series = crate::bar_builder::aggregate_ticks(&ticks, finboard_core::PeriodRule::Minute);
        assert_eq!(series.len(), 2);
        assert!((series.bars[0].vwap.unwrap() - 304.0 / 3.0).abs() < 1e-9);
        assert_eq!(series.bars[1].vwap, Some(101.0));

        let csv = "price,qty,time\n100,1,1000000000\n";
        let Normalized::Ticks(ticks) = normalize_csv(csv).unwrap() else {
            panic!("expected ticks");
        };
        assert_eq!(ticks[0].timestamp.to_string(), "1970-01-12 13:46:40");
    }

    #[test]
    fn test_tick_rows_with_bad_cells_dropped() {
        let csv = "price,qty,time\n100,1,1700000000000\nabc,1,1700000000001\n100,1,yesterday\n";
        let Normalized::Ticks(ticks) = normalize_csv(csv).unwrap() else {
            panic!("expected ticks");
        };
        assert_eq!(ticks.len(), 1);
    }

    #[test]
    fn test_eod_sorted_and_deduplicated() {
        let csv = "Date,Close,Adj Close,Volume\n\
                   2024-01-03,103,102.5,\n\
                   2024-01-02,101,100.5,1000\n\
                   2024-01-03,999,999,1\n";
        let Normalized::Bars(series) = normalize_csv(csv).unwrap() else {
            panic!("expected bars");
        };
        assert_eq!(series.source, SeriesSource::GenericEod);
        assert_eq!(series.prices(PriceColumn::Close), vec![101.0, 103.0]);
        assert_eq!(series.prices(PriceColumn::AdjClose), vec![100.5, 102.5]);
        assert_eq!(series.bars[0].volume, Some(1000.0));
        assert_eq!(series.bars[1].volume, None);
    }

    #[test]
    fn test_klines_from_epoch_millis() {
        let csv = "open_time,open,high,low,close,volume\n\
                   1704067200000,42000,42500,41800,42300,12.5\n\
                   1704153600000,42300,43000,42100,42900,10\n";
        let Normalized::Bars(series) = normalize_csv(csv).unwrap() else {
            panic!("expected bars");
        };
        assert_eq!(series.source, SeriesSource::Kline);
        assert_eq!(series.bars[0].timestamp.to_string(), "2024-01-01 00:00:00");
        assert_eq!(series.bars[1].high, Some(43000.0));
        assert_eq!(series.bars[0].vwap, None);
    }

    #[test]
    fn test_all_rows_unusable_is_normalization_error() {
        let err = normalize_csv("date,close\nfoo,1\n2024-01-01,abc\n").unwrap_err();
        assert!(matches!(err, Error::Normalization(_)));

        let err = normalize_csv("price,qty,time\nx,y,z\n").unwrap_err();
        assert!(matches!(err, Error::Normalization(_)));
    }

    #[test]
    fn test_drop_row_policy() {
        let csv = "date,open,high,low,close\n\
                   2024-01-01,10,12,9,11\n\
                   2024-01-02,10,9,8,11\n\
                   2024-01-03,-1,12,-2,11\n";
        let table = read_csv_bytes(csv.as_bytes()).unwrap();

        let Normalized::Bars(accepted) = Normalizer::default().normalize(&table).unwrap() else {
            panic!("expected bars");
        };
        assert_eq!(accepted.len(), 3);

        let strict = Normalizer::new(ValidationPolicy::DropRow);
        let Normalized::Bars(filtered) = strict.normalize(&table).unwrap() else {
            panic!("expected bars");
        };
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.bars[0].close, Some(11.0));
    }

    #[test]
    fn test_price_table() {
        let csv = ",AAPL,MSFT,Ticker\n\
                   2024-01-03,186,371,x\n\
                   2024-01-02,185,370,x\n\
                   bad,1,1,x\n\
                   2024-01-04,,372,x\n";
        let table = read_csv_bytes(csv.as_bytes()).unwrap();
        let prices = Normalizer::default().normalize_price_table(&table).unwrap();
        assert_eq!(prices.assets, vec!["AAPL", "MSFT"]);
        assert_eq!(prices.len(), 3);
        assert_eq!(prices.column("MSFT").unwrap(), &[370.0, 371.0, 372.0]);
        assert!(prices.column("AAPL").unwrap()[2].is_nan());
    }

    #[test]
    fn test_price_table_without_date_column_is_positional() {
        let table = read_csv_bytes(b"ticker_a,ticker_b\n10,20\n11,21\n12,19\n").unwrap();
        let prices = Normalizer::default().normalize_price_table(&table).unwrap();
        assert_eq!(prices.index, PriceIndex::Rows(3));
        assert_eq!(prices.assets, vec!["ticker_a", "ticker_b"]);
        assert_eq!(prices.column("ticker_a").unwrap(), &[10.0, 11.0, 12.0]);
        assert_eq!(prices.column("ticker_b").unwrap(), &[20.0, 21.0, 19.0]);
    }

    #[test]
    fn test_price_table_without_assets() {
        let table = read_csv_bytes(b"date,name\n2024-01-01,x\n").unwrap();
        let err = Normalizer::default().normalize_price_table(&table).unwrap_err();
        assert!(matches!(err, Error::Normalization(_)));
    }
}
