//! Core types and configuration for the finboard market-data pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Market data types (raw tables, ticks, canonical bars, price tables)
//! - Derived records (summary statistics, portfolio samples)
//! - Configuration structures
//! - Common error types
//! - The memoization cache used by the ingestor

pub mod cache;
pub mod config;
pub mod error;
pub mod types;

pub use cache::{CacheKey, MemoCache};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
