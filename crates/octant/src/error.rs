//! Errors raised while building an octree.

use thiserror::Error;

/// Failure to build an [`Octree`](crate::Octree).
///
/// Every variant is detected before any node is constructed, so a failed
/// build never leaves a partial tree behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OctreeError {
    /// Leaves must be allowed to hold at least one point.
    #[error("need at least one point per cell, got max_pts_per_cell = {0}")]
    InvalidLeafCapacity(usize),
    /// The depth guard must allow at least the root.
    #[error("max_depth must be at least 1, got {0}")]
    InvalidMaxDepth(u8),
    /// Points, normals and indices must line up one to one.
    #[error("node data length mismatch: {pts} points, {normals} normals, {indices} indices")]
    LengthMismatch {
        /// Number of points
        pts: usize,
        /// Number of normals
        normals: usize,
        /// Number of original indices
        indices: usize,
    },
}
