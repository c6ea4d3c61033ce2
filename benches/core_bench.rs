use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mtsieve_core::baby_giant::{bsgs_search, StepPlan, DEFAULT_GIANT_STEP_FACTOR};
use mtsieve_core::bitmap::{PackedBitmap, TermBitmap};
use mtsieve_core::hashtable::HashTable;
use mtsieve_core::montgomery::ModArith;

fn bench_montgomery_pow(c: &mut Criterion) {
    let ctx = ModArith::new(1_000_000_007);
    let base = ctx.to_residue(123_456_789);
    c.bench_function("montgomery_pow(large)", |b| {
        b.iter(|| ctx.pow(black_box(base), black_box(987_654_321)));
    });
}

fn bench_montgomery_mul(c: &mut Criterion) {
    let ctx = ModArith::new(1_000_000_007);
    let a = ctx.to_residue(123_456_789);
    let bb = ctx.to_residue(987_654_321);
    c.bench_function("montgomery_mul", |b| {
        b.iter(|| ctx.mul(black_box(a), black_box(bb)));
    });
}

fn bench_bsgs_search(c: &mut Criterion) {
    let p = 1_000_003u64;
    let ctx = ModArith::new(p);
    let base = ctx.to_residue(2);
    let target = ctx.to_residue(500);
    let plan = StepPlan::choose(100_000, 1, DEFAULT_GIANT_STEP_FACTOR, 1 << 24);
    c.bench_function("bsgs_search(range=100_000)", |b| {
        b.iter(|| {
            let mut table = HashTable::for_elements(plan.m);
            black_box(bsgs_search(
                &ctx,
                black_box(base),
                black_box(target),
                1,
                plan,
                &mut table,
            ))
        });
    });
}

fn bench_bitmap_report_factor_uncontended(c: &mut Criterion) {
    c.bench_function("bitmap_report_factor(single_worker)", |b| {
        b.iter_batched(
            || PackedBitmap::new_all_set(1 << 16),
            |bitmap| {
                for i in 0..(1usize << 16) {
                    black_box(bitmap.report_factor(i, 7, 1_000_000));
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_bitmap_report_factor_contended(c: &mut Criterion) {
    c.bench_function("bitmap_report_factor(mutex_path)", |b| {
        b.iter_batched(
            || PackedBitmap::new_all_set(1 << 12),
            |bitmap| {
                for i in 0..(1usize << 12) {
                    black_box(bitmap.report_factor(i, 7, 0));
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_montgomery_pow,
    bench_montgomery_mul,
    bench_bsgs_search,
    bench_bitmap_report_factor_uncontended,
    bench_bitmap_report_factor_contended,
);
criterion_main!(benches);
