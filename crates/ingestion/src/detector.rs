//! Input shape classification.
//!
//! Column names are trimmed, case-folded, and resolved through a fixed
//! alias table, then matched against three rule sets in precedence order:
//! klines, ticks, generic end-of-day.

use finboard_core::{Error, RawTable, Result};
use std::fmt;

/// Vendor-specific spellings and their canonical names.
const ALIASES: &[(&str, &str)] = &[
    ("timestamp", "time"),
    ("transact_time", "time"),
    ("trade_time", "time"),
    ("datetime", "date"),
    ("day", "date"),
    ("unnamed: 0", "date"),
    ("quantity", "qty"),
    ("amount", "qty"),
    ("size", "qty"),
    ("quote_quantity", "quote_qty"),
    ("quoteqty", "quote_qty"),
    ("id", "trade_id"),
    ("agg_trade_id", "trade_id"),
    ("tradeid", "trade_id"),
    ("isbuyermaker", "is_buyer_maker"),
    ("opentime", "open_time"),
    ("open time", "open_time"),
    ("kline_open_time", "open_time"),
    ("adj close", "adj_close"),
    ("adjclose", "adj_close"),
    ("adjusted_close", "adj_close"),
    ("adjusted close", "adj_close"),
    ("vol", "volume"),
    ("1. open", "open"),
    ("2. high", "high"),
    ("3. low", "low"),
    ("4. close", "close"),
    ("5. adjusted close", "adj_close"),
    ("5. volume", "volume"),
    ("6. volume", "volume"),
    ("last", "price"),
];

/// Canonical name for a raw header.
pub fn canonical_column_name(raw: &str) -> String {
    let folded = raw.trim().to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == folded)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(folded)
}

/// Which rule set matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Tick,
    Kline,
    GenericEod,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormatKind::Tick => "tick",
            FormatKind::Kline => "kline",
            FormatKind::GenericEod => "generic end-of-day",
        };
        f.write_str(s)
    }
}

/// Column positions for a trade-tick table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickColumns {
    pub time: usize,
    pub price: usize,
    pub qty: usize,
    pub quote_qty: Option<usize>,
    pub trade_id: Option<usize>,
    pub is_buyer_maker: Option<usize>,
}

/// Column positions for a bar table (klines or end-of-day).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarColumns {
    pub time: usize,
    pub open: Option<usize>,
    pub high: Option<usize>,
    pub low: Option<usize>,
    pub close: Option<usize>,
    pub adj_close: Option<usize>,
    pub volume: Option<usize>,
    pub vwap: Option<usize>,
}

/// Result of classifying a raw table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedFormat {
    Tick(TickColumns),
    Kline(BarColumns),
    GenericEod(BarColumns),
}

impl DetectedFormat {
    pub fn kind(&self) -> FormatKind {
        match self {
            DetectedFormat::Tick(_) => FormatKind::Tick,
            DetectedFormat::Kline(_) => FormatKind::Kline,
            DetectedFormat::GenericEod(_) => FormatKind::GenericEod,
        }
    }
}

/// Canonicalized headers with first-match lookup.
pub(crate) struct ColumnIndex {
    names: Vec<String>,
}

impl ColumnIndex {
    pub(crate) fn new(headers: &[String]) -> Self {
        let names = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let name = canonical_column_name(h);
                // A blank leading header is a serialized dataframe index.
                if i == 0 && name.is_empty() {
                    "date".to_string()
                } else {
                    name
                }
            })
            .collect();
        Self { names }
    }

    pub(crate) fn find(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn find_any(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.find(n))
    }
}

/// Classify a raw table.
///
/// Fails with `UnrecognizedFormat` when no rule set matches.
pub fn detect(table: &RawTable) -> Result<DetectedFormat> {
    let index = ColumnIndex::new(&table.headers);

    if let Some(format) = detect_kline(&index) {
        return Ok(format);
    }
    if let Some(format) = detect_tick(&index) {
        return Ok(format);
    }
    if let Some(format) = detect_eod(&index) {
        return Ok(format);
    }

    Err(Error::unrecognized_format(format!(
        "expected kline columns (open_time, open, high, low, close), tick columns \
         (price, qty, time) or a date column with a close price; got [{}]",
        table.headers.join(", ")
    )))
}

fn detect_kline(index: &ColumnIndex) -> Option<DetectedFormat> {
    let time = index.find("open_time")?;
    let open = index.find("open")?;
    let high = index.find("high")?;
    let low = index.find("low")?;
    let close = index.find("close")?;
    Some(DetectedFormat::Kline(BarColumns {
        time,
        open: Some(open),
        high: Some(high),
        low: Some(low),
        close: Some(close),
        adj_close: None,
        volume: index.find("volume"),
        vwap: None,
    }))
}

fn detect_tick(index: &ColumnIndex) -> Option<DetectedFormat> {
    Some(DetectedFormat::Tick(TickColumns {
        time: index.find("time")?,
        price: index.find("price")?,
        qty: index.find("qty")?,
        quote_qty: index.find("quote_qty"),
        trade_id: index.find("trade_id"),
        is_buyer_maker: index.find("is_buyer_maker"),
    }))
}

fn detect_eod(index: &ColumnIndex) -> Option<DetectedFormat> {
    let time = index.find_any(&["date", "time"])?;
    let close = index.find_any(&["close", "price"]);
    let adj_close = index.find("adj_close");
    if close.is_none() && adj_close.is_none() {
        return None;
    }
    Some(DetectedFormat::GenericEod(BarColumns {
        time,
        open: index.find("open"),
        high: index.find("high"),
        low: index.find("low"),
        close,
        adj_close,
        volume: index.find("volume"),
        vwap: index.find("vwap"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str]) -> RawTable {
        RawTable::new(headers.iter().map(|h| h.to_string()).collect(), vec![])
    }

    #[test]
    fn test_alias_resolution() {
        assert_eq!(canonical_column_name(" Adj Close "), "adj_close");
        assert_eq!(canonical_column_name("TIMESTAMP"), "time");
        assert_eq!(canonical_column_name("4. close"), "close");
        assert_eq!(canonical_column_name("Close"), "close");
    }

    #[test]
    fn test_detects_binance_trades() {
        let t = table(&["id", "price", "qty", "quote_qty", "time", "is_buyer_maker"]);
        match detect(&t).unwrap() {
            DetectedFormat::Tick(cols) => {
                assert_eq!(cols.time, 4);
                assert_eq!(cols.price, 1);
                assert_eq!(cols.qty, 2);
                assert_eq!(cols.quote_qty, Some(3));
                assert_eq!(cols.trade_id, Some(0));
                assert_eq!(cols.is_buyer_maker, Some(5));
            }
            other => panic!("unexpected format {other:?}"),
        }
    }

    #[test]
    fn test_kline_takes_precedence_over_eod() {
        let t = table(&["Open Time", "Open", "High", "Low", "Close", "Volume", "Date"]);
        assert_eq!(detect(&t).unwrap().kind(), FormatKind::Kline);
    }

    #[test]
    fn test_tick_takes_precedence_over_eod() {
        // A tick table also has a time + price pair.
        let t = table(&["time", "price", "quantity"]);
        assert_eq!(detect(&t).unwrap().kind(), FormatKind::Tick);
    }

    #[test]
    fn test_detects_yahoo_style_eod() {
        let t = table(&["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"]);
        match detect(&t).unwrap() {
            DetectedFormat::GenericEod(cols) => {
                assert_eq!(cols.time, 0);
                assert_eq!(cols.close, Some(4));
                assert_eq!(cols.adj_close, Some(5));
                assert_eq!(cols.volume, Some(6));
            }
            other => panic!("unexpected format {other:?}"),
        }
    }

    #[test]
    fn test_detects_alphavantage_flattened_table() {
        let t = table(&["date", "1. open", "2. high", "3. low", "4. close", "5. adjusted close", "6. volume"]);
        assert_eq!(detect(&t).unwrap().kind(), FormatKind::GenericEod);
    }

    #[test]
    fn test_blank_index_header_is_date() {
        let t = table(&["", "close"]);
        assert_eq!(detect(&t).unwrap().kind(), FormatKind::GenericEod);
    }

    #[test]
    fn test_price_only_series_is_eod() {
        let t = table(&["timestamp", "price"]);
        match detect(&t).unwrap() {
            DetectedFormat::GenericEod(cols) => assert_eq!(cols.close, Some(1)),
            other => panic!("unexpected format {other:?}"),
        }
    }

    #[test]
    fn test_unrecognized() {
        let err = detect(&table(&["category", "amount", "kind"])).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedFormat(_)));
        assert!(err.to_string().contains("category"));
    }
}
