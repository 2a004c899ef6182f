use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use medusa::{Quadtree, XorShift64Star};

fn scattered(count: usize) -> Vec<(f64, f64, usize)> {
    let mut rng = XorShift64Star::new(42);
    (0..count)
        .map(|i| {
            (
                rng.next_f64_unit() * 1000.0,
                rng.next_f64_unit() * 1000.0,
                i,
            )
        })
        .collect()
}

fn bench_insert_all(c: &mut Criterion) {
    let points = scattered(2000);
    c.bench_function("quadtree_insert_all_2000", |b| {
        b.iter(|| {
            let mut tree = Quadtree::new();
            tree.insert_all(black_box(points.iter().copied()));
            black_box(tree.size())
        })
    });
}

fn bench_nearest(c: &mut Criterion) {
    let points = scattered(2000);
    let mut tree = Quadtree::new();
    tree.insert_all(points);
    c.bench_function("quadtree_nearest_2000", |b| {
        b.iter(|| black_box(tree.nearest(black_box(312.5), black_box(77.0), None)))
    });
}

criterion_group!(benches, bench_insert_all, bench_nearest);
criterion_main!(benches);
