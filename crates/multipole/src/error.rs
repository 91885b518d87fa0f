//! Errors raised by the upward pass, assembly and operator application.

use octant::OctreeError;
use thiserror::Error;

/// Failure anywhere in the multipole pipeline.
///
/// Passes are all-or-nothing: the first failing task's error is what the
/// caller sees, and nothing partially computed is returned alongside it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FmmError {
    /// Tree construction failed.
    #[error(transparent)]
    Octree(#[from] OctreeError),

    /// An [`FmmConfig`](crate::FmmConfig) or expansion surface that cannot be used.
    #[error("invalid FMM configuration: {0}")]
    InvalidConfig(String),

    /// The kernel reported a failure while evaluating a block.
    #[error("kernel evaluation failed: {0}")]
    Kernel(String),

    /// The kernel returned a block of the wrong shape.
    #[error("kernel returned a {got_rows}x{got_cols} block, expected {rows}x{cols}")]
    BlockShape {
        /// Expected rows (observation points)
        rows: usize,
        /// Expected columns (source points)
        cols: usize,
        /// Rows actually returned
        got_rows: usize,
        /// Columns actually returned
        got_cols: usize,
    },

    /// The check-to-equivalent pseudo-inverse could not be computed.
    #[error("pseudo-inverse failed: {0}")]
    Svd(String),

    /// The upward pass was computed for a different source tree.
    #[error("upward pass covers {upward} nodes but the source tree has {tree}")]
    TreeMismatch {
        /// Nodes covered by the upward pass
        upward: usize,
        /// Nodes in the source tree
        tree: usize,
    },

    /// The upward pass has as many nodes as the source tree but a
    /// different shape.
    #[error("upward pass does not match the source tree at node {node}")]
    UpwardShape {
        /// Pre-order index of the first node found to differ
        node: usize,
    },

    /// A vector or index does not fit the operator it is applied to.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Required length or bound
        expected: usize,
        /// Length or index actually seen
        got: usize,
    },
}
