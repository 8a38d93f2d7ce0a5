//! Historical-components table for the monthly (S&P 500 style) pipeline.
//!
//! Input is a delimited file with a `date` column and a `tickers` column
//! holding a comma-separated, optionally double-quoted symbol list:
//!
//! ```text
//! date,tickers
//! 2013-01-02,"AAPL,ABT,ACN,..."
//! ```
//!
//! A row whose ticker list is missing, blank or undecodable parses to an
//! empty snapshot.
//! A row whose date cannot be parsed is rejected and reported, the rest of
//! the file still loads.

use crate::domain::{MembershipSnapshot, Month};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("read snapshot file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse snapshot CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("snapshot file is missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// A data row that could not be turned into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// 1-based line number in the source file (header is line 1).
    pub line: u64,
    pub reason: String,
}

/// Parsed components table, sorted by date.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTable {
    pub rows: Vec<MembershipSnapshot>,
    pub rejected: Vec<RowFailure>,
}

impl SnapshotTable {
    pub fn from_path(path: &Path) -> Result<Self, SnapshotError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SnapshotError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let date_idx = column_index(&headers, "date").ok_or(SnapshotError::MissingColumn("date"))?;
        let tickers_idx =
            column_index(&headers, "tickers").ok_or(SnapshotError::MissingColumn("tickers"))?;

        let mut table = Self::default();
        for record in rdr.byte_records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let raw_date = match std::str::from_utf8(record.get(date_idx).unwrap_or(b"")) {
                Ok(raw) => raw,
                Err(_) => {
                    tracing::warn!(line, "snapshot date is not valid UTF-8, skipping row");
                    table.rejected.push(RowFailure {
                        line,
                        reason: "date is not valid UTF-8".to_string(),
                    });
                    continue;
                }
            };
            let date = match parse_date(raw_date) {
                Some(date) => date,
                None => {
                    tracing::warn!(line, raw_date, "unparseable snapshot date, skipping row");
                    table.rejected.push(RowFailure {
                        line,
                        reason: format!("invalid date '{raw_date}'"),
                    });
                    continue;
                }
            };

            let raw_tickers = record
                .get(tickers_idx)
                .and_then(|field| match std::str::from_utf8(field) {
                    Ok(raw) => Some(raw),
                    Err(_) => {
                        tracing::warn!(line, %date, "ticker list is not valid UTF-8, using empty list");
                        None
                    }
                });
            let tickers = parse_ticker_list(raw_tickers);
            table.rows.push(MembershipSnapshot::new(date, tickers));
        }

        table.rows.sort_by_key(|s| s.date);
        tracing::debug!(
            rows = table.rows.len(),
            rejected = table.rejected.len(),
            "loaded snapshot table"
        );
        Ok(table)
    }

    /// Snapshots dated in `[start, end_exclusive)`.
    pub fn window(&self, start: NaiveDate, end_exclusive: NaiveDate) -> Vec<MembershipSnapshot> {
        self.rows
            .iter()
            .filter(|s| s.date >= start && s.date < end_exclusive)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

/// ISO date, optionally followed by a time component (`2013-01-02 00:00:00`).
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

/// Parse a comma-separated ticker list.
///
/// Strips one surrounding pair of double quotes, trims each item and drops
/// empty items. `None`, blank and `nan` fields yield an empty list.
pub fn parse_ticker_list(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let mut s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Vec::new();
    }
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s = &s[1..s.len() - 1];
    }
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Group snapshots by calendar month, each group sorted by date.
///
/// The first snapshot of a group is that month's period start.
pub fn group_by_month(
    snapshots: &[MembershipSnapshot],
) -> BTreeMap<Month, Vec<MembershipSnapshot>> {
    let mut groups: BTreeMap<Month, Vec<MembershipSnapshot>> = BTreeMap::new();
    for snap in snapshots {
        groups.entry(snap.month()).or_default().push(snap.clone());
    }
    for group in groups.values_mut() {
        group.sort_by_key(|s| s.date);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_quoted_and_plain_lists() {
        assert_eq!(parse_ticker_list(Some("AAPL, MSFT ,GOOG")), vec!["AAPL", "MSFT", "GOOG"]);
        assert_eq!(parse_ticker_list(Some("\"AAPL,MSFT\"")), vec!["AAPL", "MSFT"]);
        assert_eq!(parse_ticker_list(Some("AAPL,,MSFT,")), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn missing_lists_are_empty() {
        assert!(parse_ticker_list(None).is_empty());
        assert!(parse_ticker_list(Some("   ")).is_empty());
        assert!(parse_ticker_list(Some("nan")).is_empty());
        assert!(parse_ticker_list(Some("\"\"")).is_empty());
    }

    #[test]
    fn reads_table_and_sorts_by_date() {
        let csv = "date,tickers\n\
                   2013-02-01,\"AAPL,MSFT\"\n\
                   2013-01-02,\"AAPL,MSFT,DELL\"\n";
        let table = SnapshotTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].date, d(2013, 1, 2));
        assert!(table.rows[0].contains("DELL"));
        assert!(table.rejected.is_empty());
    }

    #[test]
    fn bad_dates_are_rejected_not_fatal() {
        let csv = "date,tickers\n\
                   not-a-date,\"AAPL\"\n\
                   2013-01-02,\"AAPL\"\n\
                   2013-01-03\n";
        let table = SnapshotTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rejected.len(), 1);
        assert_eq!(table.rejected[0].line, 2);
        // missing tickers field parses as an empty snapshot
        assert!(table.rows[1].tickers.is_empty());
    }

    #[test]
    fn undecodable_rows_do_not_abort_the_load() {
        let mut csv = b"date,tickers\n2013-01-02,\"AAPL,MSFT\"\n2013-01-03,\"AA".to_vec();
        csv.extend_from_slice(&[0xff, 0xfe]);
        csv.extend_from_slice(b"PL\"\n2013-01-\xff04,AAPL\n2013-01-07,\"AAPL\"\n");

        let table = SnapshotTable::from_reader(csv.as_slice()).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.rows[1].tickers.is_empty());
        assert_eq!(table.rows[1].date, d(2013, 1, 3));
        assert_eq!(table.rejected.len(), 1);
        assert_eq!(table.rejected[0].line, 4);
        assert!(table.rows[2].contains("AAPL"));
    }

    #[test]
    fn missing_column_is_an_error() {
        let csv = "day,symbols\n2013-01-02,AAPL\n";
        let err = SnapshotTable::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, SnapshotError::MissingColumn("date")));
    }

    #[test]
    fn datetime_dates_are_accepted() {
        let csv = "date,tickers\n2013-01-02 00:00:00,AAPL\n";
        let table = SnapshotTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.rows[0].date, d(2013, 1, 2));
    }

    #[test]
    fn window_is_half_open() {
        let csv = "date,tickers\n\
                   2012-12-31,A\n\
                   2013-01-01,A\n\
                   2021-01-07,A\n\
                   2021-01-08,A\n";
        let table = SnapshotTable::from_reader(csv.as_bytes()).unwrap();
        let window = table.window(d(2013, 1, 1), d(2021, 1, 8));
        let dates: Vec<NaiveDate> = window.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![d(2013, 1, 1), d(2021, 1, 7)]);
    }

    #[test]
    fn groups_by_calendar_month() {
        let snaps = vec![
            MembershipSnapshot::new(d(2020, 1, 15), ["A"]),
            MembershipSnapshot::new(d(2020, 1, 1), ["A", "B"]),
            MembershipSnapshot::new(d(2020, 2, 1), ["A", "C"]),
        ];
        let groups = group_by_month(&snaps);
        assert_eq!(groups.len(), 2);
        let jan = &groups[&Month::new(2020, 1).unwrap()];
        assert_eq!(jan[0].date, d(2020, 1, 1));
        assert_eq!(jan.len(), 2);
    }
}
