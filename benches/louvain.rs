use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::ThreadPoolBuilder;

use louvain_community::{Graph, Louvain, LouvainConfig, SubGraphGenerator};

/// Dense clusters of `cluster_size` nodes with a few random edges between them.
fn clustered_graph(clusters: usize, cluster_size: usize, seed: u64) -> Graph {
    let mut rng = StdRng::seed_from_u64(seed);
    let node_count = clusters * cluster_size;
    let mut edges = vec![];
    for cluster in 0..clusters {
        let base = cluster * cluster_size;
        for _ in 0..cluster_size * 4 {
            let a = base + rng.gen_range(0..cluster_size);
            let b = base + rng.gen_range(0..cluster_size);
            edges.push((a, b, 1.0));
        }
    }
    for _ in 0..node_count / 4 {
        edges.push((rng.gen_range(0..node_count), rng.gen_range(0..node_count), 1.0));
    }
    Graph::from_edges(node_count, edges)
}

fn bench_louvain(c: &mut Criterion) {
    let mut group = c.benchmark_group("louvain");
    group.sample_size(10);
    for concurrency in [1, 4] {
        let louvain = Louvain::new(clustered_graph(200, 50, 7), LouvainConfig {
            concurrency,
            ..LouvainConfig::default()
        })
        .unwrap();
        group.bench_with_input(BenchmarkId::new("threads", concurrency), &concurrency, |b, _| {
            b.iter(|| black_box(louvain.compute().unwrap()))
        });
    }
    group.finish();
}

fn bench_coarsening(c: &mut Criterion) {
    let graph = clustered_graph(200, 50, 11);
    let communities: Vec<usize> = (0..10_000).map(|node| node / 50).collect();
    let pool = ThreadPoolBuilder::new().num_threads(4).build().unwrap();
    c.bench_function("coarsen", |b| {
        b.iter(|| {
            SubGraphGenerator::new(&pool, 4)
                .generate(black_box(&graph), &communities)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_louvain, bench_coarsening);
criterion_main!(benches);
