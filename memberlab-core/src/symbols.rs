//! Ticker rename normalization.
//!
//! Historical membership lists carry the symbol a company traded under at
//! the time (`FB`), while price providers only answer for the current one
//! (`META`). Every symbol is mapped to its canonical form before spans are
//! merged, survivor sets are computed or prices are requested.

use crate::domain::{MembershipSnapshot, TickerSpan};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Old symbol -> new symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolMap {
    renames: BTreeMap<String, String>,
}

impl Default for SymbolMap {
    fn default() -> Self {
        let mut renames = BTreeMap::new();
        renames.insert("FB".to_string(), "META".to_string());
        Self { renames }
    }
}

impl SymbolMap {
    /// A map with no renames.
    pub fn empty() -> Self {
        Self {
            renames: BTreeMap::new(),
        }
    }

    pub fn from_renames<I, K, V>(renames: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            renames: renames
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add or replace a rename.
    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.renames.insert(from.into(), to.into());
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// Follow renames to the current symbol. Chains (`A -> B -> C`) resolve to
    /// the last hop; a cycle stops at the first repeated symbol.
    pub fn canonical<'a>(&'a self, symbol: &'a str) -> &'a str {
        let mut current = symbol;
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        while let Some(next) = self.renames.get(current) {
            if !visited.insert(current) {
                break;
            }
            current = next.as_str();
        }
        current
    }

    pub fn is_renamed(&self, symbol: &str) -> bool {
        self.canonical(symbol) != symbol
    }
}

/// Rewrite each snapshot's tickers to canonical symbols.
pub fn normalize_snapshots(
    snapshots: &[MembershipSnapshot],
    map: &SymbolMap,
) -> Vec<MembershipSnapshot> {
    snapshots
        .iter()
        .map(|s| MembershipSnapshot {
            date: s.date,
            tickers: s
                .tickers
                .iter()
                .map(|t| map.canonical(t).to_string())
                .collect(),
        })
        .collect()
}

/// Rewrite span tickers to canonical symbols, merging spans that land on the same symbol.
///
/// A merged span covers the earliest first date and the latest last date; active
/// counts are summed, so a date on which both symbols were listed counts twice.
/// Use [`normalize_snapshots`] before building the matrix when exact counts
/// matter. Output is sorted by ticker.
pub fn normalize_spans(spans: &[TickerSpan], map: &SymbolMap) -> Vec<TickerSpan> {
    let mut merged: BTreeMap<String, TickerSpan> = BTreeMap::new();

    for span in spans {
        let canonical = map.canonical(&span.ticker);
        if canonical != span.ticker {
            tracing::debug!(from = %span.ticker, to = canonical, "renamed ticker");
        }
        merged
            .entry(canonical.to_string())
            .and_modify(|m| {
                m.first_active = m.first_active.min(span.first_active);
                m.last_active = m.last_active.max(span.last_active);
                m.active_count += span.active_count;
            })
            .or_insert_with(|| TickerSpan {
                ticker: canonical.to_string(),
                ..span.clone()
            });
    }

    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn span(t: &str, first: NaiveDate, last: NaiveDate, n: usize) -> TickerSpan {
        TickerSpan {
            ticker: t.into(),
            first_active: first,
            last_active: last,
            active_count: n,
        }
    }

    #[test]
    fn fb_becomes_meta_by_default() {
        let map = SymbolMap::default();
        assert_eq!(map.canonical("FB"), "META");
        assert_eq!(map.canonical("AAPL"), "AAPL");
        assert!(map.is_renamed("FB"));
    }

    #[test]
    fn chains_and_cycles() {
        let map = SymbolMap::from_renames([("A", "B"), ("B", "C"), ("X", "Y"), ("Y", "X")]);
        assert_eq!(map.canonical("A"), "C");
        // cycle terminates
        let c = map.canonical("X");
        assert!(c == "X" || c == "Y");
    }

    #[test]
    fn spans_merge_on_canonical_symbol() {
        let spans = vec![
            span("AAPL", d(2013, 1, 1), d(2020, 12, 1), 96),
            span("FB", d(2013, 12, 1), d(2020, 12, 1), 85),
            span("META", d(2022, 6, 1), d(2023, 1, 1), 8),
        ];
        let out = normalize_spans(&spans, &SymbolMap::default());
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.ticker != "FB"));

        let meta = out.iter().find(|s| s.ticker == "META").unwrap();
        assert_eq!(meta.first_active, d(2013, 12, 1));
        assert_eq!(meta.last_active, d(2023, 1, 1));
        assert_eq!(meta.active_count, 93);
    }

    #[test]
    fn snapshots_rewrite_and_dedupe() {
        let snaps = vec![MembershipSnapshot::new(d(2022, 6, 9), ["FB", "META", "AAPL"])];
        let out = normalize_snapshots(&snaps, &SymbolMap::default());
        let tickers: Vec<&str> = out[0].tickers.iter().map(|s| s.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "META"]);
    }

    #[test]
    fn empty_map_is_identity() {
        let map = SymbolMap::empty();
        assert!(map.is_empty());
        assert_eq!(map.canonical("FB"), "FB");
    }
}
