//! Presence matrix: dense date x ticker membership table.
//!
//! Rows are the distinct snapshot dates (ascending), columns the distinct
//! tickers seen anywhere in the input (lexicographic). A cell is 1 when the
//! ticker was listed on that date and 0 otherwise. The matrix is built in
//! one pass over the full input, so identical input always produces an
//! identical matrix.

use crate::domain::{MembershipSnapshot, MonthlySurvivorRecord};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceMatrix {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    /// Row-major, `dates.len() * tickers.len()` cells.
    cells: Vec<bool>,
}

impl PresenceMatrix {
    /// Pivot snapshots into a presence matrix. Snapshots sharing a date are unioned.
    pub fn build(snapshots: &[MembershipSnapshot]) -> Self {
        let mut by_date: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
        let mut all_tickers: BTreeSet<&str> = BTreeSet::new();

        for snap in snapshots {
            let row = by_date.entry(snap.date).or_default();
            for ticker in &snap.tickers {
                row.insert(ticker.as_str());
                all_tickers.insert(ticker.as_str());
            }
        }

        let tickers: Vec<String> = all_tickers.iter().map(|t| t.to_string()).collect();
        let col_of: BTreeMap<&str, usize> =
            all_tickers.iter().enumerate().map(|(i, t)| (*t, i)).collect();

        let width = tickers.len();
        let mut cells = vec![false; by_date.len() * width];
        for (row, listed) in by_date.values().enumerate() {
            for ticker in listed {
                cells[row * width + col_of[ticker]] = true;
            }
        }

        Self {
            dates: by_date.into_keys().collect(),
            tickers,
            cells,
        }
    }

    /// Pivot monthly survivor sets, one row per month keyed by its first day.
    pub fn from_survivors(records: &[MonthlySurvivorRecord]) -> Self {
        let snapshots: Vec<MembershipSnapshot> = records
            .iter()
            .map(|r| MembershipSnapshot {
                date: r.month.first_day(),
                tickers: r.surviving.clone(),
            })
            .collect();
        Self::build(&snapshots)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell value as 0/1.
    ///
    /// # Panics
    /// If `row` or `col` is out of bounds.
    pub fn value(&self, row: usize, col: usize) -> u8 {
        assert!(row < self.n_rows() && col < self.n_cols(), "cell out of bounds");
        u8::from(self.cells[row * self.n_cols() + col])
    }

    /// Presence of `ticker` on `date`. Unknown dates or tickers are absent.
    pub fn get(&self, date: NaiveDate, ticker: &str) -> bool {
        match (self.row_index(date), self.col_index(ticker)) {
            (Some(row), Some(col)) => self.cells[row * self.n_cols() + col],
            _ => false,
        }
    }

    pub fn row_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn col_index(&self, ticker: &str) -> Option<usize> {
        self.tickers
            .binary_search_by(|t| t.as_str().cmp(ticker))
            .ok()
    }

    /// `(date, present)` pairs for column `col`, in date order.
    pub fn column_at(&self, col: usize) -> impl Iterator<Item = (NaiveDate, bool)> + '_ {
        let width = self.n_cols();
        self.dates
            .iter()
            .enumerate()
            .map(move |(row, date)| (*date, self.cells[row * width + col]))
    }

    /// Column for `ticker`, if the ticker appears anywhere in the matrix.
    pub fn column(&self, ticker: &str) -> Option<Vec<(NaiveDate, bool)>> {
        self.col_index(ticker).map(|col| self.column_at(col).collect())
    }

    /// Number of listed tickers on each row.
    pub fn row_counts(&self) -> Vec<usize> {
        let width = self.n_cols();
        (0..self.n_rows())
            .map(|row| self.cells[row * width..(row + 1) * width].iter().filter(|c| **c).count())
            .collect()
    }

    /// Convert to a Polars DataFrame: a `date` column plus one `UInt32` 0/1 column per ticker.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        let days: Vec<i32> = self
            .dates
            .iter()
            .map(|d| (*d - epoch).num_days() as i32)
            .collect();

        let mut columns = Vec::with_capacity(self.n_cols() + 1);
        columns.push(Column::new("date".into(), days).cast(&DataType::Date)?);
        for (col, ticker) in self.tickers.iter().enumerate() {
            let values: Vec<u32> = (0..self.n_rows())
                .map(|row| u32::from(self.value(row, col)))
                .collect();
            columns.push(Column::new(ticker.as_str().into(), values));
        }
        DataFrame::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Month, RecordOrigin};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn snaps() -> Vec<MembershipSnapshot> {
        vec![
            MembershipSnapshot::new(d(2020, 1, 3), ["X", "B"]),
            MembershipSnapshot::new(d(2020, 1, 1), ["X", "A"]),
            MembershipSnapshot::new(d(2020, 1, 2), ["A"]),
        ]
    }

    #[test]
    fn rows_and_columns_are_sorted() {
        let m = PresenceMatrix::build(&snaps());
        assert_eq!(m.dates(), &[d(2020, 1, 1), d(2020, 1, 2), d(2020, 1, 3)]);
        assert_eq!(m.tickers(), &["A", "B", "X"]);
    }

    #[test]
    fn absence_is_zero() {
        let m = PresenceMatrix::build(&snaps());
        assert!(m.get(d(2020, 1, 1), "X"));
        assert!(!m.get(d(2020, 1, 2), "X"));
        assert!(m.get(d(2020, 1, 3), "X"));
        assert!(!m.get(d(2020, 1, 1), "B"));
        assert!(!m.get(d(2021, 1, 1), "A"));
        assert!(!m.get(d(2020, 1, 1), "ZZZ"));
    }

    #[test]
    fn same_date_snapshots_are_unioned() {
        let input = vec![
            MembershipSnapshot::new(d(2020, 1, 1), ["A"]),
            MembershipSnapshot::new(d(2020, 1, 1), ["B"]),
        ];
        let m = PresenceMatrix::build(&input);
        assert_eq!(m.n_rows(), 1);
        assert_eq!(m.row_counts(), vec![2]);
    }

    #[test]
    fn rebuild_is_identical() {
        let a = PresenceMatrix::build(&snaps());
        let mut reversed = snaps();
        reversed.reverse();
        let b = PresenceMatrix::build(&reversed);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_snapshot_keeps_its_row() {
        let input = vec![
            MembershipSnapshot::new(d(2020, 1, 1), ["A"]),
            MembershipSnapshot::new(d(2020, 1, 2), Vec::<String>::new()),
        ];
        let m = PresenceMatrix::build(&input);
        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.row_counts(), vec![1, 0]);
    }

    #[test]
    fn column_lookup() {
        let m = PresenceMatrix::build(&snaps());
        let x = m.column("X").unwrap();
        assert_eq!(
            x,
            vec![(d(2020, 1, 1), true), (d(2020, 1, 2), false), (d(2020, 1, 3), true)]
        );
        assert!(m.column("nope").is_none());
    }

    #[test]
    fn survivors_pivot_on_month_start() {
        let rec = MonthlySurvivorRecord {
            month: Month::new(2020, 1).unwrap(),
            period_start: Some(d(2020, 1, 2)),
            surviving: ["A".to_string()].into_iter().collect(),
            churned: ["B".to_string()].into_iter().collect(),
            total_tickers_seen: 2,
            origin: RecordOrigin::Observed { snapshots: 2 },
        };
        let m = PresenceMatrix::from_survivors(&[rec]);
        assert_eq!(m.dates(), &[d(2020, 1, 1)]);
        assert_eq!(m.tickers(), &["A"]);
    }

    #[test]
    fn dataframe_has_date_and_ticker_columns() {
        let m = PresenceMatrix::build(&snaps());
        let df = m.to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 4);
        let x = df.column("X").unwrap().u32().unwrap();
        assert_eq!(x.get(0), Some(1));
        assert_eq!(x.get(1), Some(0));
    }
}
