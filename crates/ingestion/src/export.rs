//! CSV export of canonical data.
//!
//! Floats are written with `Display`, the shortest representation that
//! parses back to the same `f64`. Missing values are empty cells.

use finboard_core::{CanonicalBar, CanonicalSeries, PriceTable, Result};
use std::io::Write;

/// Timestamp layout of the first column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

type Field = (&'static str, fn(&CanonicalBar) -> Option<f64>);

const BAR_FIELDS: [Field; 7] = [
    ("open", |b| b.open),
    ("high", |b| b.high),
    ("low", |b| b.low),
    ("close", |b| b.close),
    ("adj_close", |b| b.adj_close),
    ("volume", |b| b.volume),
    ("vwap", |b| b.vwap),
];

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write a series as CSV. Only columns present in at least one bar are
/// written.
pub fn write_series_csv<W: Write>(series: &CanonicalSeries, writer: W) -> Result<()> {
    let present: Vec<&Field> = BAR_FIELDS
        .iter()
        .filter(|(_, get)| series.bars.iter().any(|b| get(b).is_some()))
        .collect();

    let mut csv = csv::Writer::from_writer(writer);
    let mut header = vec!["timestamp"];
    header.extend(present.iter().map(|(name, _)| *name));
    csv.write_record(&header)?;

    for bar in &series.bars {
        let mut record = Vec::with_capacity(present.len() + 1);
        record.push(bar.timestamp.format(TIMESTAMP_FORMAT).to_string());
        record.extend(present.iter().map(|(_, get)| cell(get(bar))));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Render a series as a CSV string.
pub fn series_to_csv_string(series: &CanonicalSeries) -> Result<String> {
    let mut buf = Vec::new();
    write_series_csv(series, &mut buf)?;
    // The writer only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write a price table as CSV. Dated tables lead with a `date` column;
/// positional tables carry only the asset columns.
pub fn write_price_table_csv<W: Write>(table: &PriceTable, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    let dated = table.is_dated();
    let mut header = Vec::with_capacity(table.asset_count() + 1);
    if dated {
        header.push("date".to_string());
    }
    header.extend(table.assets.iter().cloned());
    csv.write_record(&header)?;

    for row in 0..table.len() {
        let mut record = Vec::with_capacity(header.len());
        if let Some(ts) = table.index.timestamp(row) {
            record.push(ts.format(TIMESTAMP_FORMAT).to_string());
        }
        for column in &table.columns {
            let value = column[row];
            record.push(cell(Some(value).filter(|v| !v.is_nan())));
        }
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use finboard_core::{PriceIndex, SeriesSource};

    #[test]
    fn test_only_present_columns_written() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let series = CanonicalSeries::new(
            SeriesSource::GenericEod,
            vec![
                CanonicalBar {
                    adj_close: Some(0.1 + 0.2),
                    ..CanonicalBar::close_only(t, 101.5)
                },
                CanonicalBar::close_only(t + chrono::Duration::days(1), 102.0),
            ],
        );
        let csv = series_to_csv_string(&series).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp,close,adj_close");
        assert_eq!(lines[1], "2024-01-02 00:00:00,101.5,0.30000000000000004");
        assert_eq!(lines[2], "2024-01-03 00:00:00,102,");
    }

    #[test]
    fn test_fractional_seconds_kept() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_milli_opt(9, 30, 0, 250)
            .unwrap();
        let series = CanonicalSeries::new(SeriesSource::Kline, vec![CanonicalBar::close_only(t, 1.0)]);
        let csv = series_to_csv_string(&series).unwrap();
        assert!(csv.contains("2024-01-02 09:30:00.250,1"));
    }

    #[test]
    fn test_price_table_nan_as_empty() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let table = PriceTable {
            index: PriceIndex::Dates(vec![t]),
            assets: vec!["AAPL".to_string(), "MSFT".to_string()],
            columns: vec![vec![185.0], vec![f64::NAN]],
        };
        let mut buf = Vec::new();
        write_price_table_csv(&table, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "date,AAPL,MSFT\n2024-01-02 00:00:00,185,\n");

        let positional = PriceTable {
            index: PriceIndex::Rows(1),
            ..table
        };
        let mut buf = Vec::new();
        write_price_table_csv(&positional, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "AAPL,MSFT\n185,\n");
    }
}
