//! Membership fetching: daily lookups and monthly snapshot tables.

pub mod history;
pub mod snapshot_table;

pub use history::{
    fetch_daily, Anchor, Change, ChangeLogHistory, DailyFetch, DateFailure, HistoryError,
    TickerHistory,
};
pub use snapshot_table::{group_by_month, parse_ticker_list, RowFailure, SnapshotError, SnapshotTable};
