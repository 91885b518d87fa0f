//! # Octant
//!
//! Octree over point clouds that carry one normal per point, built for
//! hierarchical interaction methods such as the fast multipole method.
//!
//! Every node is either a leaf holding at most `max_pts_per_cell` points or
//! an internal node with exactly eight children, some of which may be
//! empty. Points keep their index in the caller's input, so results computed
//! on the tree can be mapped back to the original ordering.
//!
//! - **Concurrent build**: each split hands its eight children to rayon
//!   as independent tasks; the result does not depend on the worker count
//! - **Move-only data**: point storage is partitioned into children, never
//!   duplicated
//! - **Tight boxes**: every node's box is the bounding cube of its own
//!   points, not a subdivision of its parent's box
//!
//! ## Quick Start
//!
//! ```rust
//! use octant::{DVec3, NodeData, Octree, OctreeConfig};
//!
//! let pts = vec![
//!     DVec3::new(-0.5, -0.5, -0.5),
//!     DVec3::new(0.5, 0.5, 0.5),
//!     DVec3::new(0.4, 0.5, 0.5),
//! ];
//! let normals = vec![DVec3::Z; pts.len()];
//! let data = NodeData::new(pts, normals).unwrap();
//!
//! let tree = Octree::build(OctreeConfig::with_capacity(1), data).unwrap();
//! assert!(!tree.root().is_leaf());
//! assert_eq!(tree.total_points(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod data;
pub mod error;
pub mod forest;
pub mod geometry;
pub mod hash;
pub mod node;
pub mod octree;

// Re-exports for convenience
pub use data::NodeData;
pub use error::OctreeError;
pub use geometry::{bounding_box, bounding_cube, find_containing_subcell, get_subcell, in_box, Bounds};
pub use glam::DVec3;
pub use hash::hash_octree;
pub use node::{NodeState, OctreeNode};
pub use octree::{Octree, OctreeConfig, OctreeStats};
