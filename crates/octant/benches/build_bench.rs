use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use octant::{DVec3, NodeData, Octree, OctreeConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn sphere_cloud(n: usize) -> NodeData {
    // Points on the unit sphere scaled into the unit box, like a surface mesh
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let normals: Vec<DVec3> = (0..n)
        .map(|_| {
            DVec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
            .normalize_or_zero()
        })
        .collect();
    let pts = normals.iter().map(|n| *n * 0.9).collect();
    NodeData::new(pts, normals).unwrap()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("octree_build");
    for n in [10_000, 100_000] {
        let data = sphere_cloud(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &data, |b, data| {
            b.iter(|| Octree::build(OctreeConfig::with_capacity(32), black_box(data.clone())).unwrap())
        });
    }
    group.finish();
}

fn bench_total_points(c: &mut Criterion) {
    let tree = Octree::build(OctreeConfig::with_capacity(32), sphere_cloud(100_000)).unwrap();

    c.bench_function("total_points", |b| b.iter(|| black_box(&tree).total_points()));
}

criterion_group!(benches, bench_build, bench_total_points);
criterion_main!(benches);
