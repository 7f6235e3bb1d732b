//! Benchmarks for the claim ledger
//!
//! Measures performance of:
//! - Claim mutation (version bump + log append)
//! - Delta resolution at different distances behind the head
//! - Full snapshots of large maps

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use territory_ledger::{Cell, ClaimLedger, LedgerConfig};

fn filled_ledger(cells: i32) -> ClaimLedger {
    let ledger = ClaimLedger::new(LedgerConfig::default().with_log_capacity(cells as usize));
    for i in 0..cells {
        ledger
            .claim(Cell::new("world", i % 256, i / 256), format!("nation-{}", i % 16))
            .unwrap();
    }
    ledger
}

/// Benchmark a single claim against a warm ledger
fn bench_claim(c: &mut Criterion) {
    let ledger = filled_ledger(10_000);
    let mut x = 0;

    c.bench_function("claim", |b| {
        b.iter(|| {
            x = (x + 1) % 256;
            ledger.claim(black_box(Cell::new("world", x, 7)), "nation-0")
        })
    });
}

/// Benchmark delta resolution for callers lagging by different amounts
fn bench_changes_since(c: &mut Criterion) {
    let mut group = c.benchmark_group("changes_since");
    let ledger = filled_ledger(10_000);
    let head = ledger.current_version();

    for &lag in &[0u64, 1, 10, 100, 1_000] {
        group.throughput(Throughput::Elements(lag.max(1)));
        group.bench_with_input(BenchmarkId::from_parameter(lag), &lag, |b, &lag| {
            b.iter(|| ledger.changes_since(black_box(head - lag)))
        });
    }
    group.finish();
}

/// Benchmark full snapshots
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_snapshot");

    for &cells in &[100i32, 1_000, 10_000] {
        let ledger = filled_ledger(cells);
        group.throughput(Throughput::Elements(cells as u64));
        group.bench_with_input(BenchmarkId::from_parameter(cells), &ledger, |b, ledger| {
            b.iter(|| ledger.full_snapshot())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_claim, bench_changes_since, bench_snapshot);
criterion_main!(benches);
