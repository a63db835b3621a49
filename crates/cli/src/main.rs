mod commands;
mod obs;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use commands::Command;
use finboard_core::{PeriodRule, PriceColumn};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "finboard")]
#[command(about = "Market-data normalization and statistics", version, arg_required_else_help = true)]
#[command(
    after_help = "Examples:\n  finboard normalize trades.csv --rule minute --out bars.csv\n  finboard fetch stooq aapl.us --start 2024-01-01\n  finboard portfolio prices.csv --samples 5000 --seed 7\n  finboard cashflow ledger.csv --goal 1500\n"
)]
struct Cli {
    /// TOML configuration; missing sections use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum VendorArg {
    Alphavantage,
    Stooq,
    Binance,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Normalize an uploaded CSV into a canonical series and export it.
    Normalize {
        input: PathBuf,
        /// Bucket width for tick and kline input (minute, hour, day).
        #[arg(long)]
        rule: Option<PeriodRule>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Output CSV; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Summary statistics of one price column.
    Summarize {
        input: PathBuf,
        #[arg(long, default_value = "close")]
        column: PriceColumn,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Fetch a symbol from a vendor and export the canonical series.
    Fetch {
        #[arg(value_enum)]
        vendor: VendorArg,
        symbol: String,
        /// Required for alphavantage.
        #[arg(long, env = "ALPHAVANTAGE_API_KEY")]
        api_key: Option<String>,
        /// Binance kline interval.
        #[arg(long, default_value = "1d")]
        interval: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Per-column descriptive statistics, performance and correlation of a
    /// multi-asset price CSV.
    Describe { input: PathBuf },
    /// Random portfolios over a multi-asset price CSV.
    Portfolio {
        input: PathBuf,
        #[arg(long)]
        samples: Option<usize>,
        #[arg(long)]
        concentration: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Geometric Brownian motion growth paths.
    Paths {
        #[arg(long)]
        expected_return: Option<f64>,
        #[arg(long)]
        volatility: Option<f64>,
        #[arg(long)]
        horizon: Option<usize>,
        #[arg(long)]
        samples: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Summarize a `category,amount,kind` cash-flow ledger.
    Cashflow {
        input: PathBuf,
        #[arg(long)]
        goal: Option<f64>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = obs::init_tracing(&cli.log_level) {
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }

    let command = match cli.command {
        CliCommand::Normalize {
            input,
            rule,
            start,
            end,
            out,
        } => Command::Normalize {
            input,
            rule,
            start,
            end,
            out,
        },
        CliCommand::Summarize {
            input,
            column,
            start,
            end,
        } => Command::Summarize {
            input,
            column,
            start,
            end,
        },
        CliCommand::Fetch {
            vendor,
            symbol,
            api_key,
            interval,
            start,
            end,
            out,
        } => Command::Fetch {
            vendor,
            symbol,
            api_key,
            interval,
            start,
            end,
            out,
        },
        CliCommand::Describe { input } => Command::Describe { input },
        CliCommand::Portfolio {
            input,
            samples,
            concentration,
            seed,
        } => Command::Portfolio {
            input,
            samples,
            concentration,
            seed,
        },
        CliCommand::Paths {
            expected_return,
            volatility,
            horizon,
            samples,
            seed,
        } => Command::Paths {
            expected_return,
            volatility,
            horizon,
            samples,
            seed,
        },
        CliCommand::Cashflow { input, goal } => Command::Cashflow { input, goal },
    };

    if let Err(err) = commands::run(cli.config.as_deref(), command) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
