//! Run report: what was collected, what failed, and a fingerprint of the result.

use chrono::NaiveDate;
use memberlab_core::data::TickerFailure;
use memberlab_core::domain::PriceRecord;
use memberlab_core::membership::DateFailure;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which pipeline produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Daily,
    Monthly,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Daily => write!(f, "daily"),
            PipelineKind::Monthly => write!(f, "monthly"),
        }
    }
}

/// A failed item and its reason, as persisted in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNote {
    pub item: String,
    pub reason: String,
}

impl From<&DateFailure> for FailureNote {
    fn from(f: &DateFailure) -> Self {
        Self {
            item: f.date.to_string(),
            reason: f.error.to_string(),
        }
    }
}

impl From<&TickerFailure> for FailureNote {
    fn from(f: &TickerFailure) -> Self {
        Self {
            item: f.ticker.clone(),
            reason: f.failure.to_string(),
        }
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub pipeline: PipelineKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub config_hash: String,

    /// Dates with a membership snapshot.
    pub snapshots: usize,
    /// Sampled dates whose lookup failed (daily pipeline).
    pub date_failures: Vec<FailureNote>,
    /// Snapshot table rows that could not be parsed (monthly pipeline).
    pub rows_rejected: Vec<FailureNote>,

    pub months: usize,
    pub months_forward_filled: usize,
    /// Distinct canonical tickers with an active span.
    pub tickers: usize,

    pub prices_skipped: bool,
    pub tickers_fetched: usize,
    pub ticker_failures: Vec<FailureNote>,
    pub price_rows: usize,
    /// BLAKE3 over the annotated records; `None` when prices were skipped.
    pub dataset_hash: Option<String>,
}

impl RunReport {
    pub fn new(pipeline: PipelineKind, start: NaiveDate, end: NaiveDate, config_hash: String) -> Self {
        Self {
            pipeline,
            start,
            end,
            config_hash,
            snapshots: 0,
            date_failures: Vec::new(),
            rows_rejected: Vec::new(),
            months: 0,
            months_forward_filled: 0,
            tickers: 0,
            prices_skipped: false,
            tickers_fetched: 0,
            ticker_failures: Vec::new(),
            price_rows: 0,
            dataset_hash: None,
        }
    }

    pub fn tickers_requested(&self) -> usize {
        self.tickers_fetched + self.ticker_failures.len()
    }

    /// A run succeeds if it produced anything at all: membership when prices
    /// are skipped, otherwise at least one ticker's prices.
    pub fn is_success(&self) -> bool {
        if self.prices_skipped {
            self.snapshots > 0
        } else {
            self.tickers_fetched > 0
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}..={}: {} snapshots",
            self.pipeline, self.start, self.end, self.snapshots
        )?;
        if !self.date_failures.is_empty() {
            write!(f, " ({} dates failed)", self.date_failures.len())?;
        }
        if !self.rows_rejected.is_empty() {
            write!(f, " ({} rows rejected)", self.rows_rejected.len())?;
        }
        if self.months > 0 {
            write!(
                f,
                ", {} months ({} forward-filled)",
                self.months, self.months_forward_filled
            )?;
        }
        write!(f, ", {} tickers", self.tickers)?;
        if self.prices_skipped {
            return write!(f, ", prices skipped");
        }
        write!(
            f,
            ", prices {}/{} tickers, {} rows",
            self.tickers_fetched,
            self.tickers_requested(),
            self.price_rows
        )?;
        if let Some(hash) = &self.dataset_hash {
            write!(f, ", dataset {}", &hash[..hash.len().min(12)])?;
        }
        Ok(())
    }
}

/// Deterministic BLAKE3 hash over annotated records.
///
/// Covers every field in record order. Records are produced sorted by
/// `(ticker, date)`, so identical inputs hash identically.
pub fn dataset_hash(records: &[PriceRecord]) -> String {
    let mut hasher = blake3::Hasher::new();
    for r in records {
        hasher.update(r.ticker.as_bytes());
        hasher.update(r.date.to_string().as_bytes());
        hasher.update(&r.open.to_le_bytes());
        hasher.update(&r.high.to_le_bytes());
        hasher.update(&r.low.to_le_bytes());
        hasher.update(&r.close.to_le_bytes());
        hasher.update(&r.volume.to_le_bytes());
        for ret in [r.daily_return, r.monthly_return] {
            match ret {
                Some(v) => hasher.update(&v.to_le_bytes()),
                None => hasher.update(&[0xff]),
            };
        }
        hasher.update(&[u8::from(r.is_index_member)]);
    }
    hasher.finalize().to_hex().to_string()
}
