//! Concurrent octree construction.
//!
//! The tree is built top-down: each node sizes itself from its points,
//! then either keeps them as a leaf or moves them into eight buckets and
//! builds one child per bucket as an independent rayon task. A node is
//! finished once all eight children are. The finished tree is immutable.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::NodeData;
use crate::error::OctreeError;
use crate::forest::{self, Unfold};
use crate::geometry::{bounding_cube, Bounds};
use crate::node::OctreeNode;

/// Configuration for the octree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OctreeConfig {
    /// Largest number of points a leaf may hold
    pub max_pts_per_cell: usize,
    /// Depth at which a node becomes a leaf regardless of its point count
    pub max_depth: u8,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_pts_per_cell: 32,
            max_depth: 32,
        }
    }
}

impl OctreeConfig {
    /// Config with the given leaf capacity and the default depth guard.
    #[must_use]
    pub fn with_capacity(max_pts_per_cell: usize) -> Self {
        Self {
            max_pts_per_cell,
            ..Default::default()
        }
    }

    /// Reject configurations that cannot build a tree.
    ///
    /// # Errors
    ///
    /// [`OctreeError::InvalidLeafCapacity`] if `max_pts_per_cell < 1`,
    /// [`OctreeError::InvalidMaxDepth`] if `max_depth < 1`.
    pub fn validate(&self) -> Result<(), OctreeError> {
        if self.max_pts_per_cell < 1 {
            return Err(OctreeError::InvalidLeafCapacity(self.max_pts_per_cell));
        }
        if self.max_depth < 1 {
            return Err(OctreeError::InvalidMaxDepth(self.max_depth));
        }
        Ok(())
    }
}

/// Statistics about the octree structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OctreeStats {
    /// Total number of nodes
    pub node_count: usize,
    /// Number of leaf nodes
    pub leaf_count: usize,
    /// Deepest leaf depth
    pub max_depth: u8,
}

/// Octree over a point cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Octree {
    /// Root node
    root: OctreeNode,
    /// Configuration used to build the tree
    config: OctreeConfig,
}

/// Input to one node's construction.
struct Seed {
    parent_bounds: Bounds,
    depth: u8,
    data: NodeData,
}

/// What an internal node keeps while its children are being built.
struct Pending {
    bounds: Bounds,
    depth: u8,
    original_indices: Vec<usize>,
}

impl Octree {
    /// Build a tree over `data`.
    ///
    /// The root is sized against the unit box centered at the origin;
    /// inputs are expected to be normalized into it. Data is moved, never
    /// copied, into the nodes. Building the same input twice gives equal
    /// trees regardless of how many rayon workers are available.
    ///
    /// A node holding zero, one, or only coincident points gets a small box
    /// at its point (parent half-width / 100) instead of a zero-extent cube.
    ///
    /// # Errors
    ///
    /// Fails before any construction starts if the config is invalid or the
    /// point, normal and index sequences differ in length.
    #[tracing::instrument(skip_all, fields(n_points = data.len(), max_pts_per_cell = config.max_pts_per_cell))]
    pub fn build(config: OctreeConfig, data: NodeData) -> Result<Self, OctreeError> {
        config.validate()?;
        data.validate()?;

        let seed = Seed {
            parent_bounds: Bounds::UNIT,
            depth: 0,
            data,
        };
        let root = forest::unfold_fold(
            seed,
            &|seed| Ok::<_, OctreeError>(Self::unfold_node(&config, seed)),
            &|pending: Pending, children| {
                Ok(OctreeNode::internal(
                    pending.bounds,
                    pending.depth,
                    pending.original_indices,
                    children,
                ))
            },
        )?;

        let tree = Self { root, config };
        let stats = tree.stats();
        info!(
            nodes = stats.node_count,
            leaves = stats.leaf_count,
            depth = stats.max_depth,
            "octree built"
        );
        Ok(tree)
    }

    fn unfold_node(config: &OctreeConfig, seed: Seed) -> Unfold<Seed, Pending, OctreeNode> {
        let Seed {
            parent_bounds,
            depth,
            data,
        } = seed;

        // Zero or one point, or only coincident points: no extent to measure.
        let cube = if data.len() <= 1 {
            None
        } else {
            Some(bounding_cube(&data.pts)).filter(|cube| !cube.is_degenerate())
        };
        let bounds = cube.unwrap_or_else(|| Bounds::degenerate_child(&parent_bounds, data.pts.first().copied()));

        if data.len() <= config.max_pts_per_cell {
            return Unfold::Done(OctreeNode::leaf(bounds, depth, data));
        }
        if cube.is_none() {
            warn!(depth, n_points = data.len(), "coincident points, forcing an oversized leaf");
            return Unfold::Done(OctreeNode::leaf(bounds, depth, data));
        }
        if depth >= config.max_depth {
            warn!(depth, n_points = data.len(), "depth limit reached, forcing an oversized leaf");
            return Unfold::Done(OctreeNode::leaf(bounds, depth, data));
        }

        debug!(depth, n_points = data.len(), "splitting node");
        let original_indices = data.original_indices.clone();
        let seeds = data.partition(&bounds).map(|data| Seed {
            parent_bounds: bounds,
            depth: depth + 1,
            data,
        });
        Unfold::Split(
            Pending {
                bounds,
                depth,
                original_indices,
            },
            seeds,
        )
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &OctreeConfig {
        &self.config
    }

    /// Get the root node.
    #[must_use]
    pub fn root(&self) -> &OctreeNode {
        &self.root
    }

    /// Sum of leaf point counts, gathered with the same fan-out/fan-in as
    /// construction. Always equals the number of input points.
    #[must_use]
    pub fn total_points(&self) -> usize {
        match forest::unfold_fold(&self.root, &count_unfold, &count_fold) {
            Ok(total) => total,
            Err(never) => match never {},
        }
    }

    /// Get statistics.
    #[must_use]
    pub fn stats(&self) -> OctreeStats {
        let mut stats = OctreeStats::default();
        Self::stats_recursive(&self.root, &mut stats);
        stats
    }

    fn stats_recursive(node: &OctreeNode, stats: &mut OctreeStats) {
        stats.node_count += 1;
        match node.children() {
            Some(children) => {
                for child in children.iter() {
                    Self::stats_recursive(child, stats);
                }
            }
            None => {
                stats.leaf_count += 1;
                stats.max_depth = stats.max_depth.max(node.depth);
            }
        }
    }

    /// All leaves in depth-first octant order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&OctreeNode> {
        let mut leaves = Vec::new();
        self.root.for_each_leaf(&mut |leaf| leaves.push(leaf));
        leaves
    }
}

fn count_unfold(node: &OctreeNode) -> Result<Unfold<&OctreeNode, (), usize>, Infallible> {
    Ok(match node.children() {
        Some(children) => Unfold::Split((), std::array::from_fn(|i| &children[i])),
        None => Unfold::Done(node.n_points()),
    })
}

fn count_fold((): (), counts: [usize; 8]) -> Result<usize, Infallible> {
    Ok(counts.iter().sum())
}
