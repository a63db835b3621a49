//! CSV bytes to raw tables.

use finboard_core::{Error, RawTable, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Whether a body is an HTML page (vendors serve these in place of CSV on
/// errors).
pub fn looks_like_html(body: &[u8]) -> bool {
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    let head = &body[start..body.len().min(start + 64)];
    let lowered = String::from_utf8_lossy(head).to_ascii_lowercase();
    ["<!doctype html", "<html", "<?xml", "<head", "<body"]
        .iter()
        .any(|tag| lowered.starts_with(tag))
}

/// Parse CSV bytes into a raw table.
///
/// The header row is mandatory. Cells are trimmed, ragged rows are padded or
/// truncated to the header width, and blank lines are skipped. Fails with
/// `Ingest` on empty input, HTML, malformed CSV, or zero data rows.
pub fn read_csv_bytes(bytes: &[u8]) -> Result<RawTable> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(Error::ingest("empty body"));
    }
    if looks_like_html(bytes) {
        return Err(Error::ingest("HTML page returned instead of CSV"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| Error::ingest(format!("malformed CSV header: {err}")))?
        .iter()
        .map(str::to_string)
        .collect();
    let width = headers.len();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record =
            record.map_err(|err| Error::ingest(format!("malformed CSV at record {}: {err}", i + 1)))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(Error::ingest("no data rows"));
    }
    Ok(RawTable::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_headers_and_rows() {
        let table = read_csv_bytes(b"Date,Close\n2024-01-02, 101.5\n2024-01-03,102\n").unwrap();
        assert_eq!(table.headers, vec!["Date", "Close"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 1), "101.5");
    }

    #[test]
    fn test_strips_bom_and_pads_ragged_rows() {
        let table = read_csv_bytes(b"\xEF\xBB\xBFa,b,c\n1,2\n4,5,6,7\n\n").unwrap();
        assert_eq!(table.headers[0], "a");
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
        assert_eq!(table.rows[1], vec!["4", "5", "6"]);
    }

    #[test]
    fn test_empty_and_header_only_fail() {
        assert!(matches!(read_csv_bytes(b"  \n"), Err(Error::Ingest(_))));
        assert!(matches!(read_csv_bytes(b"No data"), Err(Error::Ingest(_))));
    }

    #[test]
    fn test_html_is_rejected() {
        let err = read_csv_bytes(b"\n<!DOCTYPE html><html><body>Exceeded</body></html>").unwrap_err();
        assert!(err.to_string().contains("HTML"));
    }

    #[test]
    fn test_invalid_utf8_is_ingest_error() {
        assert!(matches!(read_csv_bytes(b"a,b\n\xff\xfe,1\n"), Err(Error::Ingest(_))));
    }
}
