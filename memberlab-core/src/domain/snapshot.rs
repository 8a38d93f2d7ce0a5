//! Membership snapshot and the derived per-ticker / per-month records.

use super::month::Month;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Index constituents on a single sampled date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    pub date: NaiveDate,
    pub tickers: BTreeSet<String>,
}

impl MembershipSnapshot {
    pub fn new<I, S>(date: NaiveDate, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            date,
            tickers: tickers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn month(&self) -> Month {
        Month::of(self.date)
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.contains(ticker)
    }
}

/// Active range of a ticker within a presence matrix.
///
/// Only exists for tickers with at least one active row, so
/// `first_active <= last_active` and `active_count >= 1` always hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerSpan {
    pub ticker: String,
    pub first_active: NaiveDate,
    pub last_active: NaiveDate,
    pub active_count: usize,
}

impl TickerSpan {
    /// First day of the first active month through the last day of the last active month.
    pub fn month_range(&self) -> (NaiveDate, NaiveDate) {
        (
            Month::of(self.first_active).first_day(),
            Month::of(self.last_active).last_day(),
        )
    }
}

/// How a monthly survivor record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordOrigin {
    /// Computed from `snapshots` snapshots dated inside the month.
    Observed { snapshots: usize },
    /// No snapshots in the month; values copied from `from`.
    ForwardFilled { from: Month },
    /// No snapshots in this month or any earlier month of the range.
    NoData,
}

/// Survivors and churn for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySurvivorRecord {
    pub month: Month,
    /// Date of the first snapshot of the month the values come from.
    pub period_start: Option<NaiveDate>,
    /// Present in every snapshot of the month.
    pub surviving: BTreeSet<String>,
    /// Present in some but not all snapshots of the month.
    pub churned: BTreeSet<String>,
    pub total_tickers_seen: usize,
    pub origin: RecordOrigin,
}

impl MonthlySurvivorRecord {
    pub fn empty(month: Month) -> Self {
        Self {
            month,
            period_start: None,
            surviving: BTreeSet::new(),
            churned: BTreeSet::new(),
            total_tickers_seen: 0,
            origin: RecordOrigin::NoData,
        }
    }

    pub fn num_survivors(&self) -> usize {
        self.surviving.len()
    }

    /// Union of survivors and churned tickers.
    pub fn seen(&self) -> BTreeSet<String> {
        self.surviving.union(&self.churned).cloned().collect()
    }

    pub fn is_forward_filled(&self) -> bool {
        matches!(self.origin, RecordOrigin::ForwardFilled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn snapshot_dedupes_and_sorts() {
        let snap = MembershipSnapshot::new(d(2020, 1, 2), ["MSFT", "AAPL", "MSFT"]);
        let tickers: Vec<&str> = snap.tickers.iter().map(|s| s.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "MSFT"]);
        assert!(snap.contains("AAPL"));
        assert_eq!(snap.month(), Month::new(2020, 1).unwrap());
    }

    #[test]
    fn span_month_range_expands_to_month_edges() {
        let span = TickerSpan {
            ticker: "AAPL".into(),
            first_active: d(2015, 3, 1),
            last_active: d(2016, 2, 1),
            active_count: 12,
        };
        assert_eq!(span.month_range(), (d(2015, 3, 1), d(2016, 2, 29)));
    }

    #[test]
    fn empty_record_has_no_data_origin() {
        let rec = MonthlySurvivorRecord::empty(Month::new(2013, 1).unwrap());
        assert_eq!(rec.origin, RecordOrigin::NoData);
        assert!(rec.seen().is_empty());
        assert!(!rec.is_forward_filled());
    }
}
