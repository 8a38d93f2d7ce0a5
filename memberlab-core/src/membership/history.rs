//! Daily constituent lookup.
//!
//! A [`TickerHistory`] answers "which tickers were in the index on this
//! date?". The daily fetcher walks every calendar day of a range, keeps the
//! days that resolve and records the days that don't; one bad day never
//! aborts the walk.
//!
//! [`ChangeLogHistory`] is the bundled implementation: a handful of full
//! anchor snapshots plus the dated additions and removals between them,
//! stored as TOML.

use crate::domain::MembershipSnapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("no membership data for {date} (covered range {earliest}..={latest})")]
    OutOfRange {
        date: NaiveDate,
        earliest: NaiveDate,
        latest: NaiveDate,
    },

    #[error("membership lookup failed for {date}: {reason}")]
    Unavailable { date: NaiveDate, reason: String },

    #[error("read history file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse history TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("history has no anchor snapshots")]
    NoAnchors,
}

/// Point-in-time constituent lookup.
pub trait TickerHistory: Send + Sync {
    fn tickers_as_of(&self, date: NaiveDate) -> Result<BTreeSet<String>, HistoryError>;
}

impl<F> TickerHistory for F
where
    F: Fn(NaiveDate) -> Result<BTreeSet<String>, HistoryError> + Send + Sync,
{
    fn tickers_as_of(&self, date: NaiveDate) -> Result<BTreeSet<String>, HistoryError> {
        self(date)
    }
}

/// Full constituent list on a given date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anchor {
    pub date: NaiveDate,
    pub tickers: Vec<String>,
}

/// Additions and removals effective on `date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub date: NaiveDate,
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

/// Anchor snapshots plus a change log between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogHistory {
    /// Last date the log is known to be complete. Defaults to the last anchor/change date.
    #[serde(default)]
    pub valid_through: Option<NaiveDate>,
    #[serde(rename = "anchor", default)]
    anchors: Vec<Anchor>,
    #[serde(rename = "change", default)]
    changes: Vec<Change>,
}

impl ChangeLogHistory {
    pub fn new(
        anchors: Vec<Anchor>,
        changes: Vec<Change>,
        valid_through: Option<NaiveDate>,
    ) -> Result<Self, HistoryError> {
        let mut history = Self {
            valid_through,
            anchors,
            changes,
        };
        history.normalize()?;
        Ok(history)
    }

    pub fn from_file(path: &Path) -> Result<Self, HistoryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, HistoryError> {
        let mut history: Self = toml::from_str(content)?;
        history.normalize()?;
        Ok(history)
    }

    fn normalize(&mut self) -> Result<(), HistoryError> {
        if self.anchors.is_empty() {
            return Err(HistoryError::NoAnchors);
        }
        self.anchors.sort_by_key(|a| a.date);
        // stable: same-day changes apply in file order
        self.changes.sort_by_key(|c| c.date);
        Ok(())
    }

    /// First date with a defined membership.
    pub fn earliest(&self) -> NaiveDate {
        self.anchors.first().map(|a| a.date).unwrap_or(NaiveDate::MIN)
    }

    /// Last date with a defined membership.
    pub fn latest(&self) -> NaiveDate {
        self.valid_through.unwrap_or_else(|| {
            let last_anchor = self.anchors.last().map(|a| a.date).unwrap_or(NaiveDate::MIN);
            let last_change = self.changes.last().map(|c| c.date).unwrap_or(NaiveDate::MIN);
            last_anchor.max(last_change)
        })
    }
}

impl TickerHistory for ChangeLogHistory {
    fn tickers_as_of(&self, date: NaiveDate) -> Result<BTreeSet<String>, HistoryError> {
        let (earliest, latest) = (self.earliest(), self.latest());
        if date < earliest || date > latest {
            return Err(HistoryError::OutOfRange {
                date,
                earliest,
                latest,
            });
        }

        let anchor = self
            .anchors
            .iter()
            .rev()
            .find(|a| a.date <= date)
            .ok_or(HistoryError::OutOfRange {
                date,
                earliest,
                latest,
            })?;

        let mut tickers: BTreeSet<String> = anchor.tickers.iter().cloned().collect();
        for change in self
            .changes
            .iter()
            .filter(|c| c.date > anchor.date && c.date <= date)
        {
            for removed in &change.removed {
                tickers.remove(removed);
            }
            tickers.extend(change.added.iter().cloned());
        }
        Ok(tickers)
    }
}

/// A sampled date whose lookup failed.
#[derive(Debug)]
pub struct DateFailure {
    pub date: NaiveDate,
    pub error: HistoryError,
}

/// Outcome of a daily membership walk.
#[derive(Debug, Default)]
pub struct DailyFetch {
    pub snapshots: Vec<MembershipSnapshot>,
    pub failures: Vec<DateFailure>,
}

impl DailyFetch {
    pub fn sampled(&self) -> usize {
        self.snapshots.len() + self.failures.len()
    }
}

/// Query `history` for every calendar day in `[start, end]`.
pub fn fetch_daily(history: &dyn TickerHistory, start: NaiveDate, end: NaiveDate) -> DailyFetch {
    let mut fetch = DailyFetch::default();

    for date in start.iter_days().take_while(|d| *d <= end) {
        match history.tickers_as_of(date) {
            Ok(tickers) => fetch.snapshots.push(MembershipSnapshot { date, tickers }),
            Err(error) => {
                tracing::warn!(%date, %error, "membership lookup failed, skipping day");
                fetch.failures.push(DateFailure { date, error });
            }
        }
    }

    tracing::info!(
        collected = fetch.snapshots.len(),
        failed = fetch.failures.len(),
        "daily membership walk complete"
    );
    fetch
}
