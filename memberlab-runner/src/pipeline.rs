//! The two end-to-end pipelines.
//!
//! Daily (NASDAQ-100 style): sample the ticker history for every calendar
//! day, normalize symbols, build the presence matrix, derive spans, fetch
//! each span's exact date range and flag membership from the matrix.
//!
//! Monthly (S&P 500 style): window the snapshot table, compute survivors
//! for every month of the run, pivot them into a monthly matrix, derive
//! spans, fetch each span widened to whole months and flag membership by
//! month.
//!
//! Collaborators (history, snapshot table, provider) are passed in, so the
//! pipelines run the same against live sources and test doubles.

use crate::config::{IndexKind, PipelineConfig, ProviderKind};
use crate::report::{dataset_hash, FailureNote, PipelineKind, RunReport};
use memberlab_core::data::{
    fetch_batch, CsvPriceProvider, FetchProgress, PriceBatch, PriceProvider, PriceRequest,
    ProviderError, YahooProvider,
};
use memberlab_core::domain::{MonthlySurvivorRecord, PriceRecord, TickerSpan};
use memberlab_core::membership::{
    fetch_daily, ChangeLogHistory, HistoryError, SnapshotError, SnapshotTable, TickerHistory,
};
use memberlab_core::returns::{
    annotate, monthly_return_table, MembershipLookup, MonthlyMembership, MonthlyReturn,
    PresenceMembership,
};
use memberlab_core::symbols::normalize_snapshots;
use memberlab_core::{compute_spans, compute_survivors, PresenceMatrix};
use thiserror::Error;

/// Errors that stop a pipeline before it produces output.
///
/// Per-date and per-ticker failures never end up here; they are recorded in
/// the [`RunReport`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load membership history: {0}")]
    History(#[from] HistoryError),

    #[error("failed to load snapshot table: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("failed to create price provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("config has no {0}")]
    MissingSource(&'static str),
}

/// Everything a pipeline run produces.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Daily presence (daily pipeline) or monthly survivor presence (monthly pipeline).
    pub matrix: PresenceMatrix,
    /// Canonical-symbol spans; one price request each.
    pub spans: Vec<TickerSpan>,
    /// Monthly pipeline only.
    pub survivors: Vec<MonthlySurvivorRecord>,
    /// Sorted by `(ticker, date)`.
    pub records: Vec<PriceRecord>,
    pub monthly_returns: Vec<MonthlyReturn>,
    pub report: RunReport,
}

/// Daily pipeline against an injected history and provider.
pub fn run_daily(
    config: &PipelineConfig,
    history: &dyn TickerHistory,
    provider: &dyn PriceProvider,
    progress: &dyn FetchProgress,
) -> PipelineOutput {
    let (start, end) = (config.pipeline.start, config.pipeline.end);
    let mut report = RunReport::new(PipelineKind::Daily, start, end, config.config_hash());

    let fetch = fetch_daily(history, start, end);
    report.snapshots = fetch.snapshots.len();
    report.date_failures = fetch.failures.iter().map(FailureNote::from).collect();

    let snapshots = normalize_snapshots(&fetch.snapshots, &config.symbol_map());
    let matrix = PresenceMatrix::build(&snapshots);
    let spans = compute_spans(&matrix);
    report.tickers = spans.len();
    tracing::info!(
        dates = matrix.n_rows(),
        tickers = spans.len(),
        "daily presence matrix built"
    );

    let requests: Vec<PriceRequest> = spans.iter().map(PriceRequest::exact).collect();
    let lookup = PresenceMembership::new(&matrix);
    let (records, monthly_returns) =
        fetch_and_annotate(config, provider, progress, &requests, &lookup, &mut report);

    PipelineOutput {
        matrix,
        spans,
        survivors: Vec::new(),
        records,
        monthly_returns,
        report,
    }
}

/// Monthly pipeline against an injected snapshot table and provider.
pub fn run_monthly(
    config: &PipelineConfig,
    table: &SnapshotTable,
    provider: &dyn PriceProvider,
    progress: &dyn FetchProgress,
) -> PipelineOutput {
    let (start, end) = (config.pipeline.start, config.pipeline.end);
    let mut report = RunReport::new(PipelineKind::Monthly, start, end, config.config_hash());
    report.rows_rejected = table
        .rejected
        .iter()
        .map(|r| FailureNote {
            item: format!("line {}", r.line),
            reason: r.reason.clone(),
        })
        .collect();

    let window = table.window(start, config.window_end());
    let window = normalize_snapshots(&window, &config.symbol_map());
    report.snapshots = window.len();

    let (first, last) = config.months();
    let survivors = compute_survivors(&window, first, last);
    report.months = survivors.len();
    report.months_forward_filled = survivors.iter().filter(|r| r.is_forward_filled()).count();

    let matrix = PresenceMatrix::from_survivors(&survivors);
    let spans = compute_spans(&matrix);
    report.tickers = spans.len();
    tracing::info!(
        months = matrix.n_rows(),
        tickers = spans.len(),
        "monthly presence matrix built"
    );

    let requests: Vec<PriceRequest> = spans.iter().map(PriceRequest::whole_months).collect();
    let lookup = MonthlyMembership::from_records(&survivors);
    let (records, monthly_returns) =
        fetch_and_annotate(config, provider, progress, &requests, &lookup, &mut report);

    PipelineOutput {
        matrix,
        spans,
        survivors,
        records,
        monthly_returns,
        report,
    }
}

fn fetch_and_annotate(
    config: &PipelineConfig,
    provider: &dyn PriceProvider,
    progress: &dyn FetchProgress,
    requests: &[PriceRequest],
    lookup: &dyn MembershipLookup,
    report: &mut RunReport,
) -> (Vec<PriceRecord>, Vec<MonthlyReturn>) {
    if config.prices.skip {
        tracing::info!("price stage skipped");
        report.prices_skipped = true;
        return (Vec::new(), Vec::new());
    }

    tracing::info!(
        provider = provider.name(),
        tickers = requests.len(),
        workers = config.prices.workers,
        "fetching prices"
    );
    let batch: PriceBatch = fetch_batch(provider, requests, config.prices.workers, progress);
    report.tickers_fetched = batch.fetched.len();
    report.ticker_failures = batch.failures.iter().map(FailureNote::from).collect();

    let records = annotate(&batch, lookup);
    let monthly = monthly_return_table(&batch);
    report.price_rows = records.len();
    report.dataset_hash = Some(dataset_hash(&records));
    (records, monthly)
}

/// Build the provider named in the config.
pub fn open_provider(config: &PipelineConfig) -> Result<Box<dyn PriceProvider>, PipelineError> {
    match config.prices.provider {
        ProviderKind::Yahoo => Ok(Box::new(YahooProvider::new()?)),
        ProviderKind::Csv => {
            let dir = config
                .prices
                .csv_dir
                .clone()
                .ok_or(PipelineError::MissingSource("[prices] csv_dir"))?;
            Ok(Box::new(CsvPriceProvider::new(dir)))
        }
    }
}

/// Load the membership source named in the config and run the matching pipeline.
pub fn run(
    config: &PipelineConfig,
    provider: &dyn PriceProvider,
    progress: &dyn FetchProgress,
) -> Result<PipelineOutput, PipelineError> {
    match config.pipeline.index {
        IndexKind::Nasdaq100 => {
            let path = config
                .membership
                .history_file
                .as_deref()
                .ok_or(PipelineError::MissingSource("[membership] history_file"))?;
            let history = ChangeLogHistory::from_file(path)?;
            Ok(run_daily(config, &history, provider, progress))
        }
        IndexKind::Sp500 => {
            let path = config
                .membership
                .snapshot_file
                .as_deref()
                .ok_or(PipelineError::MissingSource("[membership] snapshot_file"))?;
            let table = SnapshotTable::from_path(path)?;
            Ok(run_monthly(config, &table, provider, progress))
        }
    }
}
