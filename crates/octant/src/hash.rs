//! Structural hashing for determinism checks.
//!
//! Two trees built from the same input must hash identically, no matter how
//! many workers took part in the build.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use glam::DVec3;

use crate::data::NodeData;
use crate::geometry::Bounds;
use crate::node::{NodeState, OctreeNode};
use crate::Octree;

/// Compute a deterministic hash of a finished tree.
///
/// Covers node depths, bounds, the leaf/internal shape, and every point,
/// normal and original index in leaf order.
#[must_use]
pub fn hash_octree(tree: &Octree) -> u64 {
    let mut hasher = DefaultHasher::new();
    tree.config().max_pts_per_cell.hash(&mut hasher);
    tree.config().max_depth.hash(&mut hasher);
    hash_node(tree.root(), &mut hasher);
    hasher.finish()
}

fn hash_node<H: Hasher>(node: &OctreeNode, hasher: &mut H) {
    node.depth.hash(hasher);
    hash_bounds(&node.bounds, hasher);

    match &node.state {
        NodeState::Leaf { data } => {
            0u8.hash(hasher);
            hash_data(data, hasher);
        }
        NodeState::Internal {
            children,
            original_indices,
        } => {
            1u8.hash(hasher);
            original_indices.hash(hasher);
            for child in children.iter() {
                hash_node(child, hasher);
            }
        }
    }
}

fn hash_bounds<H: Hasher>(bounds: &Bounds, hasher: &mut H) {
    hash_vec(bounds.center, hasher);
    hash_vec(bounds.half_width, hasher);
}

fn hash_data<H: Hasher>(data: &NodeData, hasher: &mut H) {
    data.len().hash(hasher);
    for (p, n) in data.pts.iter().zip(&data.normals) {
        hash_vec(*p, hasher);
        hash_vec(*n, hasher);
    }
    data.original_indices.hash(hasher);
}

/// Floats are hashed by bit pattern.
fn hash_vec<H: Hasher>(v: DVec3, hasher: &mut H) {
    v.x.to_bits().hash(hasher);
    v.y.to_bits().hash(hasher);
    v.z.to_bits().hash(hasher);
}
