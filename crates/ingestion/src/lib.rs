//! Data ingestion and normalization for the finboard pipeline.
//!
//! This crate handles:
//! - Reading uploaded CSV bytes into raw tables
//! - Fetching vendor data with ordered mirror/format fallbacks
//! - Format detection (tick stream, klines, generic end-of-day)
//! - Normalization into canonical series
//! - Bucketing ticks and bars into OHLCV bars with VWAP
//! - CSV export of canonical series

pub mod bar_builder;
pub mod detector;
pub mod export;
pub mod fetch;
pub mod ingestor;
pub mod normalizer;
pub mod parse;
pub mod pipeline;
pub mod reader;

pub use bar_builder::{aggregate_ticks, resample, BarBuilder};
pub use detector::{detect, BarColumns, DetectedFormat, FormatKind, TickColumns};
pub use export::{series_to_csv_string, write_price_table_csv, write_series_csv};
pub use fetch::{
    FetchFailure, FetchRequest, FetchStrategy, HttpResponse, ReqwestTransport, ResponseFormat, Transport,
    Vendor,
};
pub use ingestor::Ingestor;
pub use normalizer::{NormalizationStats, Normalized, Normalizer};
pub use pipeline::Pipeline;
pub use reader::read_csv_bytes;
