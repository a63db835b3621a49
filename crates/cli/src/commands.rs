use crate::VendorArg;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use finboard_core::{CanonicalSeries, Config, DateRange, PeriodRule, PriceColumn, PriceTable};
use finboard_ingestion::{write_series_csv, FetchRequest, Pipeline, Vendor};
use finboard_sim::{best_return_to_risk, min_risk, PathSimulator, PortfolioSampler};
use finboard_stats::{
    asset_performance, correlation_matrix, describe, read_ledger_csv, returns_table, totals_by_category,
    CashFlowSummary, SummaryStatistics,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub enum Command {
    Normalize {
        input: PathBuf,
        rule: Option<PeriodRule>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        out: Option<PathBuf>,
    },
    Summarize {
        input: PathBuf,
        column: PriceColumn,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    Fetch {
        vendor: VendorArg,
        symbol: String,
        api_key: Option<String>,
        interval: String,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        out: Option<PathBuf>,
    },
    Describe {
        input: PathBuf,
    },
    Portfolio {
        input: PathBuf,
        samples: Option<usize>,
        concentration: Option<f64>,
        seed: Option<u64>,
    },
    Paths {
        expected_return: Option<f64>,
        volatility: Option<f64>,
        horizon: Option<usize>,
        samples: Option<usize>,
        seed: Option<u64>,
    },
    Cashflow {
        input: PathBuf,
        goal: Option<f64>,
    },
}

pub fn run(config_path: Option<&Path>, command: Command) -> Result<()> {
    let mut config = match config_path {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    match command {
        Command::Normalize {
            input,
            rule,
            start,
            end,
            out,
        } => {
            apply_series_overrides(&mut config, rule, start, end)?;
            let pipeline = Pipeline::from_config(&config)?;
            let bytes = read_input(&input)?;
            let series = pipeline
                .series_from_bytes(&bytes)
                .with_context(|| format!("normalizing {}", input.display()))?;
            export(&series, out.as_deref())
        }
        Command::Summarize {
            input,
            column,
            start,
            end,
        } => {
            apply_series_overrides(&mut config, None, start, end)?;
            let pipeline = Pipeline::from_config(&config)?;
            let bytes = read_input(&input)?;
            let series = pipeline
                .series_from_bytes(&bytes)
                .with_context(|| format!("normalizing {}", input.display()))?;
            print_json(&SummaryStatistics::compute(&series, column))
        }
        Command::Fetch {
            vendor,
            symbol,
            api_key,
            interval,
            start,
            end,
            out,
        } => {
            let vendor = match vendor {
                VendorArg::Alphavantage => match api_key {
                    Some(api_key) => Vendor::AlphaVantage { api_key },
                    None => bail!("alphavantage requires --api-key or ALPHAVANTAGE_API_KEY"),
                },
                VendorArg::Stooq => Vendor::Stooq,
                VendorArg::Binance => Vendor::Binance { interval },
            };
            let request = FetchRequest::new(vendor, &symbol).with_range(DateRange::new(start, end)?);
            let pipeline = Pipeline::from_config(&config)?;
            let series = pipeline
                .series_from_fetch(&request)
                .with_context(|| format!("fetching {symbol} from {}", request.vendor.name()))?;
            export(&series, out.as_deref())
        }
        Command::Describe { input } => {
            let prices = load_prices(&config, &input)?;
            let correlation = match correlation_matrix(&returns_table(&prices)) {
                Ok(matrix) => Some(matrix),
                Err(err) => {
                    warn!(error = %err, "correlation skipped");
                    None
                }
            };
            print_json(&serde_json::json!({
                "columns": describe(&prices),
                "performance": asset_performance(&prices),
                "correlation": correlation,
            }))
        }
        Command::Portfolio {
            input,
            samples,
            concentration,
            seed,
        } => {
            let sim = &mut config.simulation;
            if let Some(samples) = samples {
                sim.portfolio_samples = samples;
            }
            if let Some(concentration) = concentration {
                sim.dirichlet_concentration = concentration;
            }
            if seed.is_some() {
                sim.portfolio_seed = seed;
            }
            config.validate()?;

            let prices = load_prices(&config, &input)?;
            let samples = PortfolioSampler::from_config(&config.simulation).sample_prices(&prices)?;
            print_json(&serde_json::json!({
                "assets": prices.assets,
                "samples": samples.len(),
                "min_risk": min_risk(&samples),
                "best_return_to_risk": best_return_to_risk(&samples),
            }))
        }
        Command::Paths {
            expected_return,
            volatility,
            horizon,
            samples,
            seed,
        } => {
            let sim = &mut config.simulation;
            if let Some(mu) = expected_return {
                sim.expected_return = mu;
            }
            if let Some(sigma) = volatility {
                sim.volatility = sigma;
            }
            if let Some(horizon) = horizon {
                sim.horizon_periods = horizon;
            }
            if let Some(samples) = samples {
                sim.path_samples = samples;
            }
            if seed.is_some() {
                sim.path_seed = seed;
            }
            config.validate()?;

            let paths = PathSimulator::from_config(&config.simulation).simulate()?;
            print_json(&serde_json::json!({
                "samples": paths.sample_count(),
                "horizon": paths.horizon,
                "mean": paths.mean_path(),
                "p05": paths.quantile_path(0.05),
                "p50": paths.quantile_path(0.5),
                "p95": paths.quantile_path(0.95),
            }))
        }
        Command::Cashflow { input, goal } => {
            let goal = goal.unwrap_or(config.cashflow.savings_goal);
            let bytes = read_input(&input)?;
            let entries = read_ledger_csv(&bytes).with_context(|| format!("reading ledger {}", input.display()))?;
            let summary = CashFlowSummary::compute(&entries, goal);
            info!(entries = entries.len(), currency = %config.cashflow.currency, "ledger summarized");
            print_json(&serde_json::json!({
                "currency": config.cashflow.currency,
                "summary": summary,
                "by_category": totals_by_category(&entries),
            }))
        }
    }
}

fn apply_series_overrides(
    config: &mut Config,
    rule: Option<PeriodRule>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<()> {
    if let Some(rule) = rule {
        config.aggregation.period = rule;
    }
    if start.is_some() || end.is_some() {
        config.aggregation.date_range = DateRange::new(start, end)?;
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn load_prices(config: &Config, input: &Path) -> Result<PriceTable> {
    let pipeline = Pipeline::from_config(config)?;
    let bytes = read_input(input)?;
    pipeline
        .price_table_from_bytes(&bytes)
        .with_context(|| format!("reading price table {}", input.display()))
}

fn export(series: &CanonicalSeries, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            write_series_csv(series, BufWriter::new(file))?;
            info!(rows = series.len(), path = %path.display(), "series exported");
        }
        None => write_series_csv(series, io::stdout().lock())?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
