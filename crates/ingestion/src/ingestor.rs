//! Raw table acquisition with memoization.

use crate::fetch::{
    combine_failures, interpret_response, plan, FetchFailure, FetchRequest, FetchStrategy, ReqwestTransport, Transport,
};
use crate::reader::read_csv_bytes;
use finboard_core::config::IngestConfig;
use finboard_core::{CacheKey, Error, MemoCache, RawTable, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reads uploads and fetches vendor data, caching successful results for the
/// lifetime of the ingestor.
pub struct Ingestor<T: Transport = ReqwestTransport> {
    transport: T,
    config: IngestConfig,
    fetch_cache: MemoCache<RawTable>,
    upload_cache: MemoCache<RawTable>,
}

impl Ingestor<ReqwestTransport> {
    /// Ingestor backed by a blocking `reqwest` client.
    pub fn from_config(config: IngestConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> Ingestor<T> {
    pub fn with_transport(transport: T, config: IngestConfig) -> Self {
        Self {
            transport,
            config,
            fetch_cache: MemoCache::new(),
            upload_cache: MemoCache::new(),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Parse uploaded CSV bytes, memoized by content digest.
    pub fn read_upload(&self, bytes: &[u8]) -> Result<RawTable> {
        let key = CacheKey::for_bytes("read_csv_bytes", bytes);
        self.upload_cache
            .get_or_try_insert_with(key, || read_csv_bytes(bytes))
    }

    /// Fetch a vendor series, memoized by request.
    pub fn fetch(&self, request: &FetchRequest) -> Result<RawTable> {
        let key = CacheKey::for_args("fetch", request)?;
        self.fetch_cache
            .get_or_try_insert_with(key, || self.fetch_uncached(request))
    }

    /// Run the request's strategies in order and return the first success.
    pub fn fetch_uncached(&self, request: &FetchRequest) -> Result<RawTable> {
        self.run_strategies(request, &plan(request, &self.config))
    }

    /// Try `strategies` in order. A strategy's `delay_before` is only slept
    /// when an earlier strategy has failed.
    pub(crate) fn run_strategies(&self, request: &FetchRequest, strategies: &[FetchStrategy]) -> Result<RawTable> {
        let mut failures: Vec<FetchFailure> = Vec::new();

        for strategy in strategies {
            if !failures.is_empty() && !strategy.delay_before.is_zero() {
                debug!(
                    strategy = %strategy.label,
                    delay_ms = strategy.delay_before.as_millis() as u64,
                    "waiting before next fetch strategy"
                );
                std::thread::sleep(strategy.delay_before);
            }

            let outcome = self
                .transport
                .get(&strategy.url, &strategy.query)
                .and_then(|response| interpret_response(strategy.format, &response));

            match outcome {
                Ok(table) => {
                    info!(
                        vendor = request.vendor.name(),
                        symbol = %request.symbol,
                        strategy = %strategy.label,
                        rows = table.len(),
                        "fetched raw table"
                    );
                    return Ok(table);
                }
                Err(reason) => {
                    warn!(strategy = %strategy.label, reason = %reason, "fetch strategy failed");
                    failures.push(FetchFailure {
                        strategy: strategy.label.clone(),
                        reason,
                    });
                }
            }
        }

        Err(Error::ingest(combine_failures(&failures)))
    }

    /// Drop all memoized results.
    pub fn clear_cache(&self) {
        self.fetch_cache.clear();
        self.upload_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{HttpResponse, Vendor};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Instant;

    /// Replays canned responses and records requested URLs and call times.
    struct FakeTransport {
        responses: RefCell<VecDeque<std::result::Result<HttpResponse, String>>>,
        calls: RefCell<Vec<String>>,
        called_at: RefCell<Vec<Instant>>,
    }

    impl FakeTransport {
        fn new(responses: Vec<std::result::Result<HttpResponse, String>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                calls: RefCell::new(Vec::new()),
                called_at: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str, _query: &[(String, String)]) -> std::result::Result<HttpResponse, String> {
            self.calls.borrow_mut().push(url.to_string());
            self.called_at.borrow_mut().push(Instant::now());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err("no canned response".to_string()))
        }
    }

    fn config() -> IngestConfig {
        IngestConfig {
            rate_limit_delay_ms: 0,
            ..IngestConfig::default()
        }
    }

    #[test]
    fn test_falls_back_to_second_mirror() {
        let transport = FakeTransport::new(vec![
            Err("connection refused".to_string()),
            Ok(HttpResponse::ok(b"Date,Open,High,Low,Close,Volume\n2024-01-02,1,2,0.5,1.5,10\n".to_vec())),
        ]);
        let ingestor = Ingestor::with_transport(transport, config());
        let table = ingestor.fetch(&FetchRequest::new(Vendor::Stooq, "aapl.us")).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(ingestor.transport.calls.borrow().len(), 2);
        assert!(ingestor.transport.calls.borrow()[1].contains("stooq.pl"));
    }

    fn delayed_strategies(delay: Duration) -> Vec<FetchStrategy> {
        ["first", "second"]
            .into_iter()
            .map(|label| FetchStrategy {
                label: label.to_string(),
                url: format!("https://{label}.test/"),
                query: Vec::new(),
                format: crate::fetch::ResponseFormat::Csv,
                delay_before: delay,
            })
            .collect()
    }

    #[test]
    fn test_delay_only_after_failure() {
        let delay = Duration::from_millis(150);
        let request = FetchRequest::new(Vendor::Stooq, "aapl.us");
        let csv = b"date,close\n2024-01-02,1\n".to_vec();

        // First attempt succeeds: its own delay is never slept.
        let ingestor = Ingestor::with_transport(FakeTransport::new(vec![Ok(HttpResponse::ok(csv.clone()))]), config());
        let started = Instant::now();
        ingestor.run_strategies(&request, &delayed_strategies(delay)).unwrap();
        assert!(started.elapsed() < delay);
        assert_eq!(ingestor.transport.calls.borrow().len(), 1);

        // First attempt fails: the wait precedes the second call.
        let transport = FakeTransport::new(vec![Err("down".to_string()), Ok(HttpResponse::ok(csv))]);
        let ingestor = Ingestor::with_transport(transport, config());
        ingestor.run_strategies(&request, &delayed_strategies(delay)).unwrap();
        let times = ingestor.transport.called_at.borrow();
        assert_eq!(times.len(), 2);
        assert!(times[1].duration_since(times[0]) >= delay);
    }

    #[test]
    fn test_all_failures_combined() {
        let transport = FakeTransport::new(vec![
            Err("connection refused".to_string()),
            Ok(HttpResponse::ok(Vec::new())),
        ]);
        let ingestor = Ingestor::with_transport(transport, config());
        let err = ingestor.fetch(&FetchRequest::new(Vendor::Stooq, "aapl.us")).unwrap_err();
        assert!(matches!(err, Error::Ingest(_)));
        let msg = err.to_string();
        assert!(msg.contains("stooq/stooq.com: connection refused"));
        assert!(msg.contains("stooq/stooq.pl: empty body"));
    }

    #[test]
    fn test_success_is_memoized_failure_is_not() {
        let transport = FakeTransport::new(vec![
            Err("down".to_string()),
            Err("down".to_string()),
            Ok(HttpResponse::ok(b"date,close\n2024-01-02,1\n".to_vec())),
        ]);
        let ingestor = Ingestor::with_transport(transport, config());
        let request = FetchRequest::new(Vendor::Stooq, "spy.us");

        assert!(ingestor.fetch(&request).is_err());
        assert!(ingestor.fetch(&request).is_ok());
        assert!(ingestor.fetch(&request).is_ok());
        assert_eq!(ingestor.transport.calls.borrow().len(), 3);
    }

    #[test]
    fn test_uploads_memoized_by_content() {
        let ingestor = Ingestor::with_transport(FakeTransport::new(vec![]), config());
        let a = ingestor.read_upload(b"date,close\n2024-01-02,1\n").unwrap();
        let b = ingestor.read_upload(b"date,close\n2024-01-02,1\n").unwrap();
        assert_eq!(a, b);
        assert_eq!(ingestor.upload_cache.len(), 1);
        assert!(ingestor.read_upload(b"").is_err());
        assert_eq!(ingestor.upload_cache.len(), 1);
    }
}
