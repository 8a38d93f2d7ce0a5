//! MemberLab CLI: reconstruct index membership and annotate price history.
//!
//! Commands:
//! - `daily`: NASDAQ-100 style run from a change-log history file
//! - `monthly`: S&P 500 style run from a components table
//! - `run`: either pipeline from a TOML config file

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use memberlab_core::data::LogProgress;
use memberlab_runner::{
    open_provider, run, write_outputs, IndexKind, PipelineConfig, PipelineOutput, ProviderKind,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "memberlab",
    about = "MemberLab CLI: historical index membership, spans and annotated prices"
)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily membership from a change-log history, spans, and prices per exact span.
    Daily {
        /// Change-log history TOML ([[anchor]] / [[change]] tables).
        #[arg(long)]
        history: PathBuf,

        /// First day to sample (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,

        /// Last day to sample, inclusive (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,

        #[command(flatten)]
        prices: PriceArgs,
    },
    /// Monthly survivors from a components table, and prices per whole-month span.
    Monthly {
        /// Components CSV with `date` and `tickers` columns.
        #[arg(long)]
        snapshots: PathBuf,

        /// First month of the run (YYYY-MM-DD, any day of the month).
        #[arg(long)]
        start: NaiveDate,

        /// Last day of the run, inclusive (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,

        /// Exclusive cutoff on snapshot dates. Defaults to the day after --end.
        #[arg(long)]
        window_end: Option<NaiveDate>,

        #[command(flatten)]
        prices: PriceArgs,
    },
    /// Run a pipeline from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Run the membership stages only.
        #[arg(long, default_value_t = false)]
        skip_prices: bool,

        /// Override the config's output directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Yahoo,
    Csv,
}

impl From<ProviderArg> for ProviderKind {
    fn from(p: ProviderArg) -> Self {
        match p {
            ProviderArg::Yahoo => ProviderKind::Yahoo,
            ProviderArg::Csv => ProviderKind::Csv,
        }
    }
}

#[derive(Args)]
struct PriceArgs {
    /// Price source.
    #[arg(long, value_enum, default_value = "yahoo")]
    provider: ProviderArg,

    /// Directory of <SYMBOL>.csv files (with --provider csv).
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Concurrent price fetches.
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Run the membership stages only.
    #[arg(long, default_value_t = false)]
    skip_prices: bool,

    /// Output directory.
    #[arg(long, default_value = "out")]
    output_dir: PathBuf,

    /// Also write records.parquet and presence.parquet.
    #[arg(long, default_value_t = false)]
    parquet: bool,
}

impl PriceArgs {
    fn apply(self, config: &mut PipelineConfig) {
        config.prices.provider = self.provider.into();
        config.prices.csv_dir = self.csv_dir;
        config.prices.workers = self.workers;
        config.prices.skip = self.skip_prices;
        config.output.dir = self.output_dir;
        config.output.parquet = self.parquet;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match cli.command {
        Commands::Daily {
            history,
            start,
            end,
            prices,
        } => {
            let mut config = PipelineConfig::new(IndexKind::Nasdaq100, start, end);
            config.membership.history_file = Some(history);
            prices.apply(&mut config);
            config
        }
        Commands::Monthly {
            snapshots,
            start,
            end,
            window_end,
            prices,
        } => {
            let mut config = PipelineConfig::new(IndexKind::Sp500, start, end);
            config.membership.snapshot_file = Some(snapshots);
            config.membership.window_end = window_end;
            prices.apply(&mut config);
            config
        }
        Commands::Run {
            config,
            skip_prices,
            output_dir,
        } => {
            let mut loaded = PipelineConfig::from_file(&config)
                .with_context(|| format!("loading config {}", config.display()))?;
            loaded.prices.skip |= skip_prices;
            if let Some(dir) = output_dir {
                loaded.output.dir = dir;
            }
            loaded
        }
    };

    config.validate()?;
    let output = run_pipeline(&config)?;

    if !output.report.is_success() {
        for failure in &output.report.ticker_failures {
            tracing::error!(ticker = %failure.item, reason = %failure.reason, "price fetch failed");
        }
        tracing::error!("nothing could be fetched: {}", output.report);
        std::process::exit(1);
    }
    Ok(())
}

fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutput> {
    let provider = open_provider(config)?;
    let output = run(config, provider.as_ref(), &LogProgress)?;

    let written = write_outputs(&config.output.dir, &output, config.output.parquet)
        .with_context(|| format!("writing outputs to {}", config.output.dir.display()))?;

    println!("{}", output.report);
    for failure in &output.report.date_failures {
        tracing::warn!(date = %failure.item, reason = %failure.reason, "membership lookup failed");
    }
    for failure in &output.report.rows_rejected {
        tracing::warn!(row = %failure.item, reason = %failure.reason, "snapshot row rejected");
    }
    println!(
        "Wrote {} files to {}",
        written.len(),
        config.output.dir.display()
    );
    Ok(output)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
