//! Monthly survivor sets.
//!
//! For each calendar month the tickers seen in any snapshot of the month are
//! split into survivors (listed in every snapshot) and churned tickers
//! (listed in some but not all). Every month of the requested range gets a
//! record: a month without snapshots repeats the previous month's values,
//! and months before the first observed month are empty.

use crate::domain::{MembershipSnapshot, Month, MonthlySurvivorRecord, RecordOrigin};
use crate::membership::group_by_month;
use std::collections::BTreeSet;

/// One record per month in `[first, last]`.
///
/// Snapshots outside the range are ignored and never forward-fill into it.
pub fn compute_survivors(
    snapshots: &[MembershipSnapshot],
    first: Month,
    last: Month,
) -> Vec<MonthlySurvivorRecord> {
    if last < first {
        return Vec::new();
    }
    let groups = group_by_month(snapshots);
    let mut records: Vec<MonthlySurvivorRecord> = Vec::new();

    for month in Month::range_inclusive(first, last) {
        let record = match groups.get(&month) {
            Some(group) => observe_month(month, group),
            None => match records.last() {
                Some(prev) => forward_fill(month, prev),
                None => MonthlySurvivorRecord::empty(month),
            },
        };
        records.push(record);
    }

    let filled = records.iter().filter(|r| r.is_forward_filled()).count();
    tracing::info!(
        months = records.len(),
        observed = groups.range(first..=last).count(),
        forward_filled = filled,
        "monthly survivors computed"
    );
    records
}

/// Survivors of a month with at least one snapshot. `group` is sorted by date.
fn observe_month(month: Month, group: &[MembershipSnapshot]) -> MonthlySurvivorRecord {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut surviving: Option<BTreeSet<String>> = None;

    for snap in group {
        seen.extend(snap.tickers.iter().cloned());
        surviving = Some(match surviving {
            None => snap.tickers.clone(),
            Some(acc) => acc.intersection(&snap.tickers).cloned().collect(),
        });
    }

    let surviving = surviving.unwrap_or_default();
    let churned: BTreeSet<String> = seen.difference(&surviving).cloned().collect();

    MonthlySurvivorRecord {
        month,
        period_start: group.first().map(|s| s.date),
        total_tickers_seen: seen.len(),
        surviving,
        churned,
        origin: RecordOrigin::Observed {
            snapshots: group.len(),
        },
    }
}

fn forward_fill(month: Month, prev: &MonthlySurvivorRecord) -> MonthlySurvivorRecord {
    let origin = match prev.origin {
        RecordOrigin::Observed { .. } => RecordOrigin::ForwardFilled { from: prev.month },
        other => other,
    };
    MonthlySurvivorRecord {
        month,
        origin,
        ..prev.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn m(y: i32, mo: u32) -> Month {
        Month::new(y, mo).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn example() -> Vec<MembershipSnapshot> {
        vec![
            MembershipSnapshot::new(d(2020, 1, 1), ["A", "B"]),
            MembershipSnapshot::new(d(2020, 1, 15), ["A"]),
            MembershipSnapshot::new(d(2020, 2, 1), ["A", "C"]),
        ]
    }

    #[test]
    fn january_and_february_example() {
        let recs = compute_survivors(&example(), m(2020, 1), m(2020, 2));
        assert_eq!(recs.len(), 2);

        assert_eq!(recs[0].surviving, set(&["A"]));
        assert_eq!(recs[0].churned, set(&["B"]));
        assert_eq!(recs[0].total_tickers_seen, 2);
        assert_eq!(recs[0].period_start, Some(d(2020, 1, 1)));
        assert_eq!(recs[0].origin, RecordOrigin::Observed { snapshots: 2 });

        assert_eq!(recs[1].surviving, set(&["A", "C"]));
        assert!(recs[1].churned.is_empty());
    }

    #[test]
    fn empty_months_inherit_previous_values() {
        let recs = compute_survivors(&example(), m(2020, 1), m(2020, 5));
        assert_eq!(recs.len(), 5);

        for rec in &recs[2..] {
            assert_eq!(rec.surviving, recs[1].surviving);
            assert_eq!(rec.churned, recs[1].churned);
            assert_eq!(rec.period_start, Some(d(2020, 2, 1)));
            assert_eq!(rec.origin, RecordOrigin::ForwardFilled { from: m(2020, 2) });
        }
        assert_eq!(recs[4].month, m(2020, 5));
    }

    #[test]
    fn leading_months_without_data_are_empty() {
        let recs = compute_survivors(&example(), m(2019, 11), m(2020, 1));
        assert_eq!(recs[0].origin, RecordOrigin::NoData);
        assert_eq!(recs[1].origin, RecordOrigin::NoData);
        assert!(recs[1].surviving.is_empty());
        assert_eq!(recs[2].surviving, set(&["A"]));
    }

    #[test]
    fn snapshots_before_range_do_not_leak_in() {
        let recs = compute_survivors(&example(), m(2020, 3), m(2020, 4));
        assert!(recs.iter().all(|r| r.origin == RecordOrigin::NoData));
    }

    #[test]
    fn union_and_partition_hold() {
        let recs = compute_survivors(&example(), m(2020, 1), m(2020, 3));
        for rec in &recs {
            assert!(rec.surviving.is_disjoint(&rec.churned));
            assert_eq!(rec.seen().len(), rec.total_tickers_seen);
        }
    }

    #[test]
    fn single_snapshot_month_keeps_full_membership() {
        let snaps = vec![MembershipSnapshot::new(d(2013, 1, 2), ["A", "B", "C"])];
        let recs = compute_survivors(&snaps, m(2013, 1), m(2013, 1));
        assert_eq!(recs[0].surviving, set(&["A", "B", "C"]));
        assert!(recs[0].churned.is_empty());
    }

    #[test]
    fn empty_snapshot_zeroes_survivors() {
        let snaps = vec![
            MembershipSnapshot::new(d(2013, 1, 2), ["A", "B"]),
            MembershipSnapshot::new(d(2013, 1, 3), Vec::<String>::new()),
        ];
        let recs = compute_survivors(&snaps, m(2013, 1), m(2013, 1));
        assert!(recs[0].surviving.is_empty());
        assert_eq!(recs[0].churned, set(&["A", "B"]));
    }
}
