//! Price fetch orchestrator: per-ticker requests with isolated failures.
//!
//! Each [`PriceRequest`] names an inclusive date range. Providers take an
//! exclusive end, so the request is sent with `end + 1 day`.
//!
//! A failing ticker contributes zero rows and a [`TickerFailure`]; it never
//! stops the batch and never affects another ticker's result.

use super::provider::{PriceProvider, ProviderError};
use crate::domain::{TickerBars, TickerSpan};
use chrono::{Days, NaiveDate};
use rayon::prelude::*;
use thiserror::Error;

/// Bars wanted for `ticker` over `[start, end]`, both inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRequest {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PriceRequest {
    pub fn new(ticker: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            start,
            end,
        }
    }

    /// The span's exact active dates.
    pub fn exact(span: &TickerSpan) -> Self {
        Self::new(span.ticker.clone(), span.first_active, span.last_active)
    }

    /// The span widened to whole calendar months.
    pub fn whole_months(span: &TickerSpan) -> Self {
        let (start, end) = span.month_range();
        Self::new(span.ticker.clone(), start, end)
    }

    /// Exclusive end to hand to a provider.
    pub fn provider_end(&self) -> NaiveDate {
        self.end.checked_add_days(Days::new(1)).unwrap_or(self.end)
    }
}

/// Why a ticker produced no rows.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("no bars returned for {start}..={end}")]
    Empty { start: NaiveDate, end: NaiveDate },

    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug)]
pub struct TickerFailure {
    pub ticker: String,
    pub failure: FetchFailure,
}

/// Combined outcome of a batch of price requests.
#[derive(Debug, Default)]
pub struct PriceBatch {
    /// Successful tickers, in request order.
    pub fetched: Vec<TickerBars>,
    pub failures: Vec<TickerFailure>,
}

impl PriceBatch {
    pub fn total(&self) -> usize {
        self.fetched.len() + self.failures.len()
    }

    pub fn row_count(&self) -> usize {
        self.fetched.iter().map(|t| t.bars.len()).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Progress callback for multi-ticker fetches. Called from worker threads when `workers > 1`.
pub trait FetchProgress: Send + Sync {
    /// Called when starting to fetch a ticker.
    fn on_start(&self, ticker: &str, index: usize, total: usize);

    /// Called when a ticker fetch completes.
    fn on_complete(
        &self,
        ticker: &str,
        index: usize,
        total: usize,
        result: Result<usize, &FetchFailure>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that emits `tracing` events.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        tracing::debug!("[{}/{}] fetching {ticker}", index + 1, total);
    }

    fn on_complete(
        &self,
        ticker: &str,
        _index: usize,
        _total: usize,
        result: Result<usize, &FetchFailure>,
    ) {
        match result {
            Ok(rows) => tracing::debug!(ticker, rows, "fetched"),
            Err(e) => tracing::warn!(ticker, error = %e, "price fetch failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!("price fetch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Fetch one request, compensating for the provider's exclusive end.
///
/// Bars outside `[start, end]` are dropped; the rest are tagged with the ticker.
pub fn fetch_prices(
    provider: &dyn PriceProvider,
    request: &PriceRequest,
) -> Result<TickerBars, FetchFailure> {
    if request.start > request.end {
        return Err(FetchFailure::InvalidRange {
            start: request.start,
            end: request.end,
        });
    }

    let bars = provider.fetch(&request.ticker, request.start, request.provider_end())?;
    let bars: Vec<_> = bars
        .into_iter()
        .filter(|b| b.date >= request.start && b.date <= request.end)
        .collect();

    if bars.is_empty() {
        return Err(FetchFailure::Empty {
            start: request.start,
            end: request.end,
        });
    }
    let void = bars.iter().filter(|b| b.is_void()).count();
    if void > 0 {
        tracing::debug!(ticker = %request.ticker, void, "bars with missing prices");
    }
    Ok(TickerBars::new(request.ticker.clone(), bars))
}

/// Fetch every request, isolating failures per ticker.
///
/// `workers <= 1` runs sequentially on the calling thread; otherwise requests run on a
/// private rayon pool bounded to `workers` threads.
pub fn fetch_batch(
    provider: &dyn PriceProvider,
    requests: &[PriceRequest],
    workers: usize,
    progress: &dyn FetchProgress,
) -> PriceBatch {
    let total = requests.len();

    let run_one = |(i, request): (usize, &PriceRequest)| {
        progress.on_start(&request.ticker, i, total);
        let result = fetch_prices(provider, request);
        progress.on_complete(
            &request.ticker,
            i,
            total,
            result.as_ref().map(|t| t.bars.len()),
        );
        (request.ticker.clone(), result)
    };

    let outcomes: Vec<(String, Result<TickerBars, FetchFailure>)> = if workers > 1 {
        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| requests.par_iter().enumerate().map(run_one).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to build fetch pool, running sequentially");
                requests.iter().enumerate().map(run_one).collect()
            }
        }
    } else {
        requests.iter().enumerate().map(run_one).collect()
    };

    let mut batch = PriceBatch::default();
    for (ticker, outcome) in outcomes {
        match outcome {
            Ok(bars) => batch.fetched.push(bars),
            Err(failure) => batch.failures.push(TickerFailure { ticker, failure }),
        }
    }

    progress.on_batch_complete(batch.fetched.len(), batch.failures.len(), total);
    batch
}
