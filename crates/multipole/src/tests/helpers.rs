//! Point cloud factories and comparison utilities.

use octant::{DVec3, NodeData, Octree, OctreeConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Centers of the two test clusters, far apart inside the unit box.
pub const CLUSTER_A: DVec3 = DVec3::splat(-0.8);
pub const CLUSTER_B: DVec3 = DVec3::splat(0.8);

/// `n` points uniformly inside the ball of radius `radius` around `center`,
/// with random unit normals.
pub fn ball(center: DVec3, radius: f64, n: usize, seed: u64) -> NodeData {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut pts = Vec::with_capacity(n);
    while pts.len() < n {
        let p = DVec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if p.length_squared() <= 1.0 {
            pts.push(center + p * radius);
        }
    }
    let normals = (0..n)
        .map(|_| {
            DVec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
            .normalize_or_zero()
        })
        .collect();
    NodeData::new(pts, normals).unwrap()
}

/// Two balls of `n_per` points each, concatenated (A first).
pub fn two_clusters(n_per: usize, seed: u64) -> NodeData {
    let a = ball(CLUSTER_A, 0.15, n_per, seed);
    let b = ball(CLUSTER_B, 0.15, n_per, seed + 1);
    let mut pts = a.pts;
    pts.extend(b.pts);
    let mut normals = a.normals;
    normals.extend(b.normals);
    NodeData::new(pts, normals).unwrap()
}

/// Build a tree with the given leaf capacity.
pub fn build(data: &NodeData, max_pts_per_cell: usize) -> Octree {
    Octree::build(OctreeConfig::with_capacity(max_pts_per_cell), data.clone()).unwrap()
}

/// Positive source strengths, so that sums do not cancel.
pub fn strengths(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0.5..1.5)).collect()
}

/// `||a - b|| / ||b||` in the 2-norm.
pub fn relative_error(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    let diff: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    let norm: f64 = b.iter().map(|y| y * y).sum();
    (diff / norm).sqrt()
}
