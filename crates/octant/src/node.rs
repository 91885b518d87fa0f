//! Octree node structure.
//!
//! A node is either a leaf owning its points or an internal node owning
//! exactly eight children.

use serde::{Deserialize, Serialize};

use crate::data::NodeData;
use crate::geometry::Bounds;

/// State of an octree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeState {
    /// Leaf node holding its points
    Leaf {
        /// Points, normals and original indices of this leaf
        data: NodeData,
    },
    /// Internal node with all eight children present
    Internal {
        /// Children in octant order; some may be empty leaves
        children: Box<[OctreeNode; 8]>,
        /// Original indices of every point below this node, in the order they reached it
        original_indices: Vec<usize>,
    },
}

/// A node in the octree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OctreeNode {
    /// Spatial bounds of this node
    pub bounds: Bounds,
    /// Depth in the tree (0 = root)
    pub depth: u8,
    /// Node state (leaf or internal)
    pub state: NodeState,
}

impl OctreeNode {
    /// Create a leaf node.
    #[must_use]
    pub fn leaf(bounds: Bounds, depth: u8, data: NodeData) -> Self {
        Self {
            bounds,
            depth,
            state: NodeState::Leaf { data },
        }
    }

    /// Create an internal node from its eight finished children.
    #[must_use]
    pub fn internal(
        bounds: Bounds,
        depth: u8,
        original_indices: Vec<usize>,
        children: [OctreeNode; 8],
    ) -> Self {
        Self {
            bounds,
            depth,
            state: NodeState::Internal {
                children: Box::new(children),
                original_indices,
            },
        }
    }

    /// Check if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self.state, NodeState::Leaf { .. })
    }

    /// Leaf payload, if this is a leaf.
    #[must_use]
    pub fn data(&self) -> Option<&NodeData> {
        match &self.state {
            NodeState::Leaf { data } => Some(data),
            NodeState::Internal { .. } => None,
        }
    }

    /// Children if this is an internal node.
    #[must_use]
    pub fn children(&self) -> Option<&[OctreeNode; 8]> {
        match &self.state {
            NodeState::Internal { children, .. } => Some(children),
            NodeState::Leaf { .. } => None,
        }
    }

    /// Child in octant `index`, if this is an internal node and `index < 8`.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<&OctreeNode> {
        self.children().and_then(|children| children.get(index))
    }

    /// Original indices of every point at or below this node.
    #[must_use]
    pub fn original_indices(&self) -> &[usize] {
        match &self.state {
            NodeState::Leaf { data } => &data.original_indices,
            NodeState::Internal {
                original_indices, ..
            } => original_indices,
        }
    }

    /// Number of points at or below this node.
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.original_indices().len()
    }

    /// Copy of every point below this node, concatenated in leaf order.
    ///
    /// For a leaf this is its own data. Internal nodes do not store points,
    /// so the leaves are gathered.
    #[must_use]
    pub fn collect_data(&self) -> NodeData {
        let mut out = NodeData::default();
        self.for_each_leaf(&mut |leaf| {
            if let Some(data) = leaf.data() {
                out.pts.extend_from_slice(&data.pts);
                out.normals.extend_from_slice(&data.normals);
                out.original_indices.extend_from_slice(&data.original_indices);
            }
        });
        out
    }

    /// Visit every leaf below this node in depth-first octant order.
    pub fn for_each_leaf<'a>(&'a self, f: &mut impl FnMut(&'a OctreeNode)) {
        match &self.state {
            NodeState::Leaf { .. } => f(self),
            NodeState::Internal { children, .. } => {
                for child in children.iter() {
                    child.for_each_leaf(f);
                }
            }
        }
    }
}
