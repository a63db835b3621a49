//! Statistics over canonical series and price tables.
//!
//! This crate handles:
//! - Simple and log return series
//! - Summary statistics for one price column
//! - Annualized per-asset performance, covariance and correlation
//! - Descriptive statistics per column
//! - Personal cash-flow summaries

pub mod cashflow;
pub mod describe;
pub mod performance;
pub mod returns;
pub mod summary;

pub use cashflow::{read_ledger_csv, totals_by_category, CashFlowEntry, CashFlowSummary, EntryKind};
pub use describe::{describe, quantile, ColumnSummary};
pub use performance::{
    asset_performance, correlation_matrix, covariance_matrix, returns_table, AssetPerformance, LabeledMatrix,
    ReturnsTable,
};
pub use returns::{cumulative_return, log_returns, simple_returns};
pub use summary::SummaryStatistics;
