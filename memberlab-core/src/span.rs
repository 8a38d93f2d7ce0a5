//! Per-ticker active spans derived from a presence matrix.

use crate::domain::TickerSpan;
use crate::matrix::PresenceMatrix;

/// First/last active date and active-row count for every ticker with at least one active row.
///
/// Results are in ticker order (the matrix's column order).
pub fn compute_spans(matrix: &PresenceMatrix) -> Vec<TickerSpan> {
    let mut spans = Vec::with_capacity(matrix.n_cols());

    for (col, ticker) in matrix.tickers().iter().enumerate() {
        let mut active = matrix.column_at(col).filter(|(_, present)| *present);
        let Some((first, _)) = active.next() else {
            continue;
        };
        let (last, count) = active.fold((first, 1), |(_, n), (date, _)| (date, n + 1));

        spans.push(TickerSpan {
            ticker: ticker.clone(),
            first_active: first,
            last_active: last,
            active_count: count,
        });
    }

    spans
}
