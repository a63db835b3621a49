//! Monte Carlo samplers for the finboard dashboards.
//!
//! - Random long-only portfolios over a multi-asset price table
//! - Geometric Brownian motion growth paths

pub mod paths;
pub mod portfolio;

pub use paths::{PathMatrix, PathSimulator};
pub use portfolio::{best_return_to_risk, min_risk, PortfolioSample, PortfolioSampler};

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seeded generator when a seed is configured, OS entropy otherwise.
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
