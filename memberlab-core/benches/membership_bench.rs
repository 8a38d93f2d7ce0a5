//! Criterion benchmarks for membership hot paths.
//!
//! Benchmarks:
//! 1. Presence matrix build from daily snapshots
//! 2. Span extraction from the matrix
//! 3. Monthly survivor computation
//! 4. Return annotation of a fetched batch

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::{Days, NaiveDate};
use memberlab_core::data::PriceBatch;
use memberlab_core::domain::{MembershipSnapshot, Month, PriceBar, TickerBars};
use memberlab_core::returns::{annotate, MonthlyMembership};
use memberlab_core::{compute_spans, compute_survivors, PresenceMatrix};

// ── Helpers ──────────────────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2013, 1, 1).unwrap()
}

/// `days` daily snapshots of a 500-name index with a few names rotating each day.
fn make_snapshots(days: u64) -> Vec<MembershipSnapshot> {
    (0..days)
        .map(|i| {
            let date = base_date() + Days::new(i);
            let rotating = (i % 20) as usize;
            let tickers = (0usize..500)
                .filter(|t| *t < 480 || t % 20 != rotating)
                .map(|t| format!("T{t:03}"));
            MembershipSnapshot::new(date, tickers)
        })
        .collect()
}

fn make_batch(tickers: usize, days: u64) -> PriceBatch {
    let fetched = (0..tickers)
        .map(|t| {
            let bars = (0..days)
                .map(|i| {
                    let close = 100.0 + ((i + t as u64) as f64 * 0.1).sin() * 10.0;
                    PriceBar {
                        date: base_date() + Days::new(i),
                        open: close - 0.3,
                        high: close + 1.5,
                        low: close - 1.5,
                        close,
                        volume: 1_000_000,
                        adj_close: close,
                    }
                })
                .collect();
            TickerBars::new(format!("T{t:03}"), bars)
        })
        .collect();
    PriceBatch {
        fetched,
        failures: Vec::new(),
    }
}

// ── 1. Matrix ────────────────────────────────────────────────────────

fn bench_matrix_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_build");
    for days in [30u64, 365, 1500] {
        let snaps = make_snapshots(days);
        group.bench_with_input(BenchmarkId::from_parameter(days), &snaps, |b, snaps| {
            b.iter(|| PresenceMatrix::build(black_box(snaps)));
        });
    }
    group.finish();
}

// ── 2. Spans ─────────────────────────────────────────────────────────

fn bench_spans(c: &mut Criterion) {
    let matrix = PresenceMatrix::build(&make_snapshots(1500));
    c.bench_function("compute_spans_1500d", |b| {
        b.iter(|| compute_spans(black_box(&matrix)));
    });
}

// ── 3. Survivors ─────────────────────────────────────────────────────

fn bench_survivors(c: &mut Criterion) {
    let snaps = make_snapshots(1500);
    let first = Month::new(2013, 1).unwrap();
    let last = Month::new(2017, 2).unwrap();
    c.bench_function("compute_survivors_1500d", |b| {
        b.iter(|| compute_survivors(black_box(&snaps), first, last));
    });
}

// ── 4. Annotation ────────────────────────────────────────────────────

fn bench_annotate(c: &mut Criterion) {
    let snaps = make_snapshots(365);
    let records = compute_survivors(
        &snaps,
        Month::new(2013, 1).unwrap(),
        Month::new(2013, 12).unwrap(),
    );
    let lookup = MonthlyMembership::from_records(&records);
    let batch = make_batch(100, 365);
    c.bench_function("annotate_100x365", |b| {
        b.iter(|| annotate(black_box(&batch), &lookup));
    });
}

criterion_group!(
    benches,
    bench_matrix_build,
    bench_spans,
    bench_survivors,
    bench_annotate
);
criterion_main!(benches);
