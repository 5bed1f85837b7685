use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ctmt_statstable::{calculate_network_measures, CovarianceGraph, NullModel, PermutationTest};
use ndarray::Array1;

fn subjects(n: usize) -> (Array1<f64>, Array1<f64>) {
    let age = Array1::from_iter((0..n).map(|i| 14.0 + 11.0 * i as f64 / n as f64));
    let ct = age.mapv(|a| 3.0 - 0.015 * a + 0.05 * (a * 7.3).sin());
    (age, ct)
}

fn ring_with_chords(n: usize) -> CovarianceGraph {
    let names: Vec<String> = (0..n).map(|i| format!("lh_region{}_part1", i)).collect();
    let edges = (0..n).flat_map(|i| vec![(i, (i + 1) % n), (i, (i + 7) % n)]);
    let edges: Vec<(&str, &str)> = edges.map(|(a, b)| (names[a].as_str(), names[b].as_str())).collect();
    CovarianceGraph::from_edges(&names, edges).unwrap()
}

fn bench_stats(c: &mut Criterion) {
    let (age, ct) = subjects(300);
    let test = PermutationTest::default();
    c.bench_function("permutation_correlation", |b| {
        b.iter(|| test.permutation_correlation(black_box(age.view()), black_box(ct.view())).unwrap())
    });

    let graph = ring_with_chords(308);
    let null = NullModel {
        n_random: 3,
        swaps_per_edge: 10,
        seed: 2718,
    };
    c.bench_function("network_measures", |b| {
        b.iter(|| calculate_network_measures(black_box(&graph.graph), &null))
    });
}

criterion_group!(benches, bench_stats);
criterion_main!(benches);
