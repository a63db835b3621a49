//! Vendor requests, fetch strategies, and response interpretation.
//!
//! A [`FetchRequest`] expands into an ordered list of [`FetchStrategy`]
//! candidates (mirrors and fallback endpoints). The [`Ingestor`] runs them in
//! order; this module only plans requests and turns responses into raw
//! tables or failure reasons.
//!
//! [`Ingestor`]: crate::Ingestor

use crate::reader::{looks_like_html, read_csv_bytes};
use chrono::{NaiveDate, NaiveTime};
use finboard_core::config::IngestConfig;
use finboard_core::{to_epoch_ms, DateRange, Error, RawTable, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Supported data vendors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "vendor", rename_all = "snake_case")]
pub enum Vendor {
    /// Daily adjusted series as JSON; rate limited to 5 requests/minute.
    AlphaVantage { api_key: String },
    /// Daily CSV downloads.
    Stooq,
    /// Exchange klines as JSON arrays.
    Binance { interval: String },
}

impl Vendor {
    pub fn name(&self) -> &'static str {
        match self {
            Vendor::AlphaVantage { .. } => "alphavantage",
            Vendor::Stooq => "stooq",
            Vendor::Binance { .. } => "binance",
        }
    }
}

/// A vendor + symbol + optional date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub vendor: Vendor,
    pub symbol: String,
    #[serde(default)]
    pub range: DateRange,
}

impl FetchRequest {
    pub fn new(vendor: Vendor, symbol: impl Into<String>) -> Self {
        Self {
            vendor,
            symbol: symbol.into(),
            range: DateRange::unbounded(),
        }
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }
}

/// How a strategy's response body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Csv,
    AlphaVantageJson,
    BinanceKlinesJson,
}

/// One candidate attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchStrategy {
    /// Short label used in failure messages, e.g. `stooq/stooq.pl`.
    pub label: String,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub format: ResponseFormat,
    /// Wait applied before this attempt when an earlier one failed.
    pub delay_before: Duration,
}

/// Expand a request into its ordered strategy list.
pub fn plan(request: &FetchRequest, config: &IngestConfig) -> Vec<FetchStrategy> {
    match &request.vendor {
        Vendor::AlphaVantage { api_key } => {
            let delays = [Duration::ZERO, Duration::from_millis(config.rate_limit_delay_ms)];
            ["TIME_SERIES_DAILY_ADJUSTED", "TIME_SERIES_DAILY"]
                .into_iter()
                .zip(delays)
                .map(|(function, delay_before)| FetchStrategy {
                    label: format!("alphavantage/{function}"),
                    url: config.alphavantage_url.clone(),
                    query: vec![
                        ("function".to_string(), function.to_string()),
                        ("symbol".to_string(), request.symbol.clone()),
                        ("outputsize".to_string(), "full".to_string()),
                        ("datatype".to_string(), "json".to_string()),
                        ("apikey".to_string(), api_key.clone()),
                    ],
                    format: ResponseFormat::AlphaVantageJson,
                    delay_before,
                })
                .collect()
        }
        Vendor::Stooq => {
            let mut query = vec![
                ("s".to_string(), request.symbol.to_lowercase()),
                ("i".to_string(), "d".to_string()),
            ];
            if let Some(start) = request.range.start {
                query.push(("d1".to_string(), start.format("%Y%m%d").to_string()));
            }
            if let Some(end) = request.range.end {
                query.push(("d2".to_string(), end.format("%Y%m%d").to_string()));
            }
            config
                .stooq_mirrors
                .iter()
                .map(|mirror| FetchStrategy {
                    label: format!("stooq/{}", host_of(mirror)),
                    url: mirror.clone(),
                    query: query.clone(),
                    format: ResponseFormat::Csv,
                    delay_before: Duration::ZERO,
                })
                .collect()
        }
        Vendor::Binance { interval } => {
            let mut query = vec![
                ("symbol".to_string(), request.symbol.to_uppercase()),
                ("interval".to_string(), interval.clone()),
                ("limit".to_string(), config.binance_limit.to_string()),
            ];
            if let Some(start) = request.range.start {
                query.push(("startTime".to_string(), day_start_ms(start).to_string()));
            }
            if let Some(end) = request.range.end {
                query.push(("endTime".to_string(), day_end_ms(end).to_string()));
            }
            config
                .binance_mirrors
                .iter()
                .map(|mirror| FetchStrategy {
                    label: format!("binance/{}", host_of(mirror)),
                    url: format!("{}/api/v3/klines", mirror.trim_end_matches('/')),
                    query: query.clone(),
                    format: ResponseFormat::BinanceKlinesJson,
                    delay_before: Duration::ZERO,
                })
                .collect()
        }
    }
}

fn host_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}

fn day_start_ms(date: NaiveDate) -> i64 {
    to_epoch_ms(date.and_time(NaiveTime::MIN))
}

fn day_end_ms(date: NaiveDate) -> i64 {
    day_start_ms(date) + 86_400_000 - 1
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking HTTP GET seam. Transport failures are returned as a reason
/// string so they can be recorded alongside other strategy failures.
pub trait Transport {
    fn get(&self, url: &str, query: &[(String, String)]) -> std::result::Result<HttpResponse, String>;
}

/// `reqwest` blocking transport with a fixed per-request timeout.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("finboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| Error::ingest(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(String, String)]) -> std::result::Result<HttpResponse, String> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|err| format!("request failed: {err}"))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .map_err(|err| format!("failed to read body: {err}"))?
            .to_vec();
        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Keys vendors use to report errors inside an otherwise successful JSON body.
const JSON_ERROR_KEYS: &[&str] = &["Error Message", "Note", "Information", "msg", "error", "message"];

/// Extract a vendor error message from a JSON object body.
fn json_error_message(body: &Value) -> Option<String> {
    let object = body.as_object()?;
    JSON_ERROR_KEYS.iter().find_map(|key| {
        object.get(*key).map(|value| match value {
            Value::String(s) => format!("{key}: {s}"),
            other => format!("{key}: {other}"),
        })
    })
}

/// Turn a response into a raw table, or the reason it is unusable.
pub fn interpret_response(format: ResponseFormat, response: &HttpResponse) -> std::result::Result<RawTable, String> {
    let body = response.body.as_slice();
    if !response.is_success() {
        let detail = serde_json::from_slice::<Value>(body)
            .ok()
            .as_ref()
            .and_then(json_error_message)
            .map(|msg| format!(" ({msg})"))
            .unwrap_or_default();
        return Err(format!("HTTP status {}{detail}", response.status));
    }
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err("empty body".to_string());
    }
    if looks_like_html(body) {
        return Err("HTML page returned instead of data".to_string());
    }

    match format {
        ResponseFormat::Csv => {
            // Some CSV endpoints answer errors with JSON.
            if let Ok(value) = serde_json::from_slice::<Value>(body) {
                if let Some(msg) = json_error_message(&value) {
                    return Err(msg);
                }
            }
            read_csv_bytes(body).map_err(reason)
        }
        ResponseFormat::AlphaVantageJson => {
            let value: Value = serde_json::from_slice(body).map_err(|err| format!("invalid JSON: {err}"))?;
            if let Some(msg) = json_error_message(&value) {
                return Err(msg);
            }
            alphavantage_table(&value)
        }
        ResponseFormat::BinanceKlinesJson => {
            let value: Value = serde_json::from_slice(body).map_err(|err| format!("invalid JSON: {err}"))?;
            if let Some(msg) = json_error_message(&value) {
                return Err(msg);
            }
            binance_table(&value)
        }
    }
}

fn reason(err: Error) -> String {
    match err {
        Error::Ingest(msg) => msg,
        other => other.to_string(),
    }
}

/// Flatten `{"Time Series (Daily)": {"2024-01-02": {"1. open": "..."}}}`.
fn alphavantage_table(value: &Value) -> std::result::Result<RawTable, String> {
    let series: &Map<String, Value> = value
        .as_object()
        .and_then(|obj| {
            obj.iter()
                .find(|(key, _)| key.starts_with("Time Series"))
                .and_then(|(_, v)| v.as_object())
        })
        .ok_or_else(|| "response has no time series object".to_string())?;

    let mut fields: Vec<String> = Vec::new();
    for entry in series.values() {
        if let Some(obj) = entry.as_object() {
            for key in obj.keys() {
                if !fields.contains(key) {
                    fields.push(key.clone());
                }
            }
        }
    }
    fields.sort();

    let rows: Vec<Vec<String>> = series
        .iter()
        .map(|(date, entry)| {
            let mut row = Vec::with_capacity(fields.len() + 1);
            row.push(date.clone());
            for field in &fields {
                row.push(entry.get(field).map(json_cell).unwrap_or_default());
            }
            row
        })
        .collect();
    if rows.is_empty() {
        return Err("no data rows".to_string());
    }

    let mut headers = vec!["date".to_string()];
    headers.extend(fields);
    Ok(RawTable::new(headers, rows))
}

const BINANCE_KLINE_COLUMNS: [&str; 12] = [
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_volume",
    "trades",
    "taker_buy_base",
    "taker_buy_quote",
    "ignore",
];

fn binance_table(value: &Value) -> std::result::Result<RawTable, String> {
    let klines = value
        .as_array()
        .ok_or_else(|| "expected an array of klines".to_string())?;
    if klines.is_empty() {
        return Err("no data rows".to_string());
    }

    let mut rows = Vec::with_capacity(klines.len());
    for (i, kline) in klines.iter().enumerate() {
        let fields = kline
            .as_array()
            .ok_or_else(|| format!("kline {i} is not an array"))?;
        let mut row: Vec<String> = fields
            .iter()
            .take(BINANCE_KLINE_COLUMNS.len())
            .map(json_cell)
            .collect();
        row.resize(BINANCE_KLINE_COLUMNS.len(), String::new());
        rows.push(row);
    }

    let headers = BINANCE_KLINE_COLUMNS.iter().map(|h| h.to_string()).collect();
    Ok(RawTable::new(headers, rows))
}

fn json_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A failed strategy and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub strategy: String,
    pub reason: String,
}

/// Message for an `Ingest` error after every strategy failed: the bare reason
/// for a single candidate, otherwise `label: reason` pairs in order.
pub fn combine_failures(failures: &[FetchFailure]) -> String {
    match failures {
        [] => "no fetch strategies available".to_string(),
        [only] => only.reason.clone(),
        many => many
            .iter()
            .map(|f| format!("{}: {}", f.strategy, f.reason))
            .collect::<Vec<_>>()
            .join("; "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_alphavantage_has_delayed_fallback() {
        let request = FetchRequest::new(
            Vendor::AlphaVantage {
                api_key: "demo".to_string(),
            },
            "IBM",
        );
        let strategies = plan(&request, &IngestConfig::default());
        assert_eq!(strategies.len(), 2);
        assert_eq!(strategies[0].label, "alphavantage/TIME_SERIES_DAILY_ADJUSTED");
        assert_eq!(strategies[0].delay_before, Duration::ZERO);
        assert_eq!(strategies[1].label, "alphavantage/TIME_SERIES_DAILY");
        assert_eq!(strategies[1].delay_before, Duration::from_secs(12));
        assert!(strategies[1]
            .query
            .contains(&("apikey".to_string(), "demo".to_string())));
    }

    #[test]
    fn test_plan_stooq_mirrors_and_range() {
        let range = DateRange::new(NaiveDate::from_ymd_opt(2024, 1, 2), NaiveDate::from_ymd_opt(2024, 2, 1)).unwrap();
        let request = FetchRequest::new(Vendor::Stooq, "AAPL.US").with_range(range);
        let strategies = plan(&request, &IngestConfig::default());
        let labels: Vec<&str> = strategies.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["stooq/stooq.com", "stooq/stooq.pl"]);
        let query = &strategies[0].query;
        assert!(query.contains(&("s".to_string(), "aapl.us".to_string())));
        assert!(query.contains(&("d1".to_string(), "20240102".to_string())));
        assert!(query.contains(&("d2".to_string(), "20240201".to_string())));
    }

    #[test]
    fn test_plan_binance_endpoints() {
        let request = FetchRequest::new(
            Vendor::Binance {
                interval: "1d".to_string(),
            },
            "btcusdt",
        )
        .with_range(DateRange::new(NaiveDate::from_ymd_opt(2024, 1, 1), None).unwrap());
        let strategies = plan(&request, &IngestConfig::default());
        assert_eq!(strategies.len(), 3);
        assert_eq!(strategies[2].url, "https://data-api.binance.vision/api/v3/klines");
        assert!(strategies[0]
            .query
            .contains(&("startTime".to_string(), "1704067200000".to_string())));
        assert!(strategies[0]
            .query
            .contains(&("symbol".to_string(), "BTCUSDT".to_string())));
    }

    #[test]
    fn test_alphavantage_note_is_failure() {
        let body = br#"{"Note": "Thank you for using Alpha Vantage! Our standard API rate limit is 5 requests per minute."}"#;
        let reason = interpret_response(ResponseFormat::AlphaVantageJson, &HttpResponse::ok(body.to_vec())).unwrap_err();
        assert!(reason.contains("standard API rate limit"));
    }

    #[test]
    fn test_alphavantage_series_flattened() {
        let body = br#"{
            "Meta Data": {"2. Symbol": "IBM"},
            "Time Series (Daily)": {
                "2024-01-03": {"1. open": "161.0", "4. close": "160.1", "5. volume": "100"},
                "2024-01-02": {"1. open": "162.8", "4. close": "161.5", "5. volume": "200"}
            }
        }"#;
        let table = interpret_response(ResponseFormat::AlphaVantageJson, &HttpResponse::ok(body.to_vec())).unwrap();
        assert_eq!(table.headers, vec!["date", "1. open", "4. close", "5. volume"]);
        assert_eq!(table.len(), 2);
        let row = table.rows.iter().find(|r| r[0] == "2024-01-02").unwrap();
        assert_eq!(row[2], "161.5");
    }

    #[test]
    fn test_binance_klines_flattened() {
        let body = br#"[[1704067200000,"42283.58","44184.10","42180.77","44179.55","27174.29",1704153599999,"1169995216.08",1059897,"14331.34","617327729.66","0"]]"#;
        let table = interpret_response(ResponseFormat::BinanceKlinesJson, &HttpResponse::ok(body.to_vec())).unwrap();
        assert_eq!(table.headers.len(), 12);
        assert_eq!(table.cell(0, 0), "1704067200000");
        assert_eq!(table.cell(0, 4), "44179.55");
    }

    #[test]
    fn test_binance_error_object() {
        let body = br#"{"code": -1121, "msg": "Invalid symbol."}"#;
        let reason = interpret_response(ResponseFormat::BinanceKlinesJson, &HttpResponse::ok(body.to_vec())).unwrap_err();
        assert_eq!(reason, "msg: Invalid symbol.");
    }

    #[test]
    fn test_http_failures() {
        let mut response = HttpResponse::ok(br#"{"msg": "Service unavailable from a restricted location"}"#.to_vec());
        response.status = 451;
        let reason = interpret_response(ResponseFormat::BinanceKlinesJson, &response).unwrap_err();
        assert!(reason.starts_with("HTTP status 451"));
        assert!(reason.contains("restricted location"));

        let reason = interpret_response(ResponseFormat::Csv, &HttpResponse::ok(Vec::new())).unwrap_err();
        assert_eq!(reason, "empty body");

        let reason = interpret_response(ResponseFormat::Csv, &HttpResponse::ok(b"<html><body>busy</body></html>".to_vec())).unwrap_err();
        assert!(reason.contains("HTML"));

        let reason = interpret_response(ResponseFormat::Csv, &HttpResponse::ok(b"No data".to_vec())).unwrap_err();
        assert_eq!(reason, "no data rows");
    }

    #[test]
    fn test_combine_failures() {
        let one = vec![FetchFailure {
            strategy: "stooq/stooq.com".to_string(),
            reason: "empty body".to_string(),
        }];
        assert_eq!(combine_failures(&one), "empty body");

        let two = vec![
            one[0].clone(),
            FetchFailure {
                strategy: "stooq/stooq.pl".to_string(),
                reason: "HTTP status 503".to_string(),
            },
        ];
        assert_eq!(
            combine_failures(&two),
            "stooq/stooq.com: empty body; stooq/stooq.pl: HTTP status 503"
        );
    }
}
