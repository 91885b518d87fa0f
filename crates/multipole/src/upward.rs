//! Upward pass.
//!
//! One [`Upward`] per octree node, computed leaf first: a leaf's operator
//! maps its source densities to its equivalent density (p2m), and an
//! internal node's eight operators map each child's equivalent density to
//! its own (m2m). Both are `c2e * K(check <- sources)`, where `c2e` is the
//! regularized pseudo-inverse of the check-to-equivalent kernel block.
//!
//! The pass runs on the same fan-out/fan-in primitive as tree construction.
//! An internal node's operators are formed only after all eight children
//! have produced theirs.

use faer::Mat;
use octant::forest::{self, Unfold};
use octant::{Bounds, Octree, OctreeNode};
use tracing::info;

use crate::config::FmmConfig;
use crate::dense::pinv;
use crate::error::FmmError;
use crate::kernel::{checked_block, Kernel, PointSet};
use crate::surface::ExpansionSurface;

/// Aggregation operators for one node and, recursively, its subtree.
///
/// Created once by [`Upward::compute`] and never modified.
#[derive(Debug, Clone)]
pub struct Upward {
    bounds: Bounds,
    c2e: Mat<f64>,
    op: UpwardOp,
    n_nodes: usize,
}

/// Node-kind specific part of an [`Upward`].
#[derive(Debug, Clone)]
pub enum UpwardOp {
    /// Leaf: maps the leaf's points to its equivalent density
    Leaf {
        /// `n_surf x n_pts` block, columns in leaf point order
        p2m: Mat<f64>,
    },
    /// Internal node: maps each child's equivalent density to this node's
    Internal {
        /// `n_surf x n_surf` block per child, in octant order
        m2m: Box<[Mat<f64>; 8]>,
        /// Children's own operators
        children: Box<[Upward; 8]>,
    },
}

/// Geometry shared by every task of the pass.
struct UpwardContext<'a, K: ?Sized> {
    surface: &'a ExpansionSurface,
    kernel: &'a K,
    config: &'a FmmConfig,
}

impl<K: Kernel + ?Sized> UpwardContext<'_, K> {
    fn c2e(&self, bounds: &Bounds) -> Result<Mat<f64>, FmmError> {
        let equiv = self.surface.place(bounds, self.config.inner_r);
        let check = self.surface.place(bounds, self.config.outer_r);
        let block = checked_block(self.kernel, check.as_set(), equiv.as_set())?;
        pinv(&block, self.config.pinv_tolerance)
    }

    fn leaf(&self, node: &OctreeNode) -> Result<Upward, FmmError> {
        let c2e = self.c2e(&node.bounds)?;
        let p2m = match node.data() {
            Some(data) if !data.is_empty() => {
                let check = self.surface.place(&node.bounds, self.config.outer_r);
                let sources = PointSet::new(&data.pts, &data.normals);
                &c2e * checked_block(self.kernel, check.as_set(), sources)?
            }
            _ => Mat::zeros(self.surface.len(), 0),
        };
        Ok(Upward {
            bounds: node.bounds,
            c2e,
            op: UpwardOp::Leaf { p2m },
            n_nodes: 1,
        })
    }

    fn internal(&self, bounds: Bounds, children: [Upward; 8]) -> Result<Upward, FmmError> {
        let c2e = self.c2e(&bounds)?;
        let check = self.surface.place(&bounds, self.config.outer_r);
        let mut m2m: Box<[Mat<f64>; 8]> = Box::new(std::array::from_fn(|_| Mat::new()));
        for (block, child) in m2m.iter_mut().zip(&children) {
            let child_equiv = self.surface.place(&child.bounds, self.config.inner_r);
            *block = &c2e * checked_block(self.kernel, check.as_set(), child_equiv.as_set())?;
        }
        let n_nodes = 1 + children.iter().map(Upward::n_nodes).sum::<usize>();
        Ok(Upward {
            bounds,
            c2e,
            op: UpwardOp::Internal {
                m2m,
                children: Box::new(children),
            },
            n_nodes,
        })
    }
}

impl Upward {
    /// Run the upward pass over a finished tree.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config, or with the first kernel or SVD error
    /// raised by any node; no partial result is returned.
    #[tracing::instrument(skip_all, fields(n_surf = surface.len(), order = config.order))]
    pub fn compute<K: Kernel + ?Sized>(
        tree: &Octree,
        surface: &ExpansionSurface,
        kernel: &K,
        config: &FmmConfig,
    ) -> Result<Self, FmmError> {
        config.validate()?;
        let ctx = UpwardContext {
            surface,
            kernel,
            config,
        };
        let upward = forest::unfold_fold(
            tree.root(),
            &|node| match node.children() {
                Some(children) => Ok(Unfold::Split(node.bounds, std::array::from_fn(|i| &children[i]))),
                None => ctx.leaf(node).map(Unfold::Done),
            },
            &|bounds, children| ctx.internal(bounds, children),
        )?;
        info!(nodes = upward.n_nodes, "upward pass complete");
        Ok(upward)
    }

    /// Bounds of the node this artifact belongs to.
    #[must_use]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Pseudo-inverse of this node's check-to-equivalent block.
    #[must_use]
    pub fn c2e(&self) -> &Mat<f64> {
        &self.c2e
    }

    /// Leaf or internal operators.
    #[must_use]
    pub fn op(&self) -> &UpwardOp {
        &self.op
    }

    /// The p2m block if this is a leaf.
    #[must_use]
    pub fn p2m(&self) -> Option<&Mat<f64>> {
        match &self.op {
            UpwardOp::Leaf { p2m } => Some(p2m),
            UpwardOp::Internal { .. } => None,
        }
    }

    /// Children if this is an internal node.
    #[must_use]
    pub fn children(&self) -> Option<&[Upward; 8]> {
        match &self.op {
            UpwardOp::Internal { children, .. } => Some(children),
            UpwardOp::Leaf { .. } => None,
        }
    }

    /// Number of nodes in this subtree, itself included.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Pre-order indices of the children, given this node's own index.
    ///
    /// Child `k` follows the node itself and every node in children `0..k`.
    #[must_use]
    pub fn child_indices(&self, index: usize) -> Option<[usize; 8]> {
        let children = self.children()?;
        let mut next = index + 1;
        Some(std::array::from_fn(|k| {
            let start = next;
            next += children[k].n_nodes;
            start
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::laplace_single_layer;
    use octant::{DVec3, NodeData, OctreeConfig};

    fn cluster_tree(n: usize, cap: usize) -> Octree {
        let pts: Vec<DVec3> = (0..n)
            .map(|i| {
                let t = i as f64 * 0.61;
                DVec3::new(t.sin(), (1.3 * t).cos(), (0.7 * t).sin()) * 0.8
            })
            .collect();
        let normals = pts.iter().map(|p| p.normalize_or_zero()).collect();
        Octree::build(OctreeConfig::with_capacity(cap), NodeData::new(pts, normals).unwrap()).unwrap()
    }

    #[test]
    fn test_one_upward_per_node() {
        let tree = cluster_tree(300, 20);
        let config = FmmConfig::with_order(3);
        let surface = ExpansionSurface::grid(config.order).unwrap();
        let upward = Upward::compute(&tree, &surface, &laplace_single_layer, &config).unwrap();
        assert_eq!(upward.n_nodes(), tree.stats().node_count);
        assert_eq!(upward.bounds(), &tree.root().bounds);
    }

    #[test]
    fn test_shapes_follow_tree() {
        let tree = cluster_tree(120, 10);
        let config = FmmConfig::with_order(3);
        let surface = ExpansionSurface::grid(config.order).unwrap();
        let upward = Upward::compute(&tree, &surface, &laplace_single_layer, &config).unwrap();

        fn walk(node: &OctreeNode, up: &Upward, n_surf: usize) {
            assert_eq!((up.c2e().nrows(), up.c2e().ncols()), (n_surf, n_surf));
            match (node.children(), up.op()) {
                (None, UpwardOp::Leaf { p2m }) => {
                    assert_eq!((p2m.nrows(), p2m.ncols()), (n_surf, node.n_points()));
                }
                (Some(children), UpwardOp::Internal { m2m, children: ups }) => {
                    for k in 0..8 {
                        assert_eq!((m2m[k].nrows(), m2m[k].ncols()), (n_surf, n_surf));
                        walk(&children[k], &ups[k], n_surf);
                    }
                }
                _ => panic!("upward shape differs from tree shape"),
            }
        }
        walk(tree.root(), &upward, surface.len());
    }

    #[test]
    fn test_child_indices_are_preorder() {
        let tree = cluster_tree(200, 8);
        let config = FmmConfig::with_order(2);
        let surface = ExpansionSurface::grid(config.order).unwrap();
        let upward = Upward::compute(&tree, &surface, &laplace_single_layer, &config).unwrap();

        // Collect indices by walking; they must be 0..n_nodes with no gaps.
        fn walk(up: &Upward, index: usize, seen: &mut Vec<usize>) {
            seen.push(index);
            if let (Some(children), Some(indices)) = (up.children(), up.child_indices(index)) {
                for (child, child_index) in children.iter().zip(indices) {
                    walk(child, child_index, seen);
                }
            }
        }
        let mut seen = Vec::new();
        walk(&upward, 0, &mut seen);
        assert_eq!(seen, (0..upward.n_nodes()).collect::<Vec<_>>());
    }

    #[test]
    fn test_kernel_error_aborts_pass() {
        struct Failing;
        impl Kernel for Failing {
            fn block(&self, _: PointSet<'_>, _: PointSet<'_>) -> Result<Mat<f64>, FmmError> {
                Err(FmmError::Kernel("boom".into()))
            }
        }
        let tree = cluster_tree(100, 10);
        let config = FmmConfig::with_order(2);
        let surface = ExpansionSurface::grid(config.order).unwrap();
        let err = Upward::compute(&tree, &surface, &Failing, &config).unwrap_err();
        assert_eq!(err, FmmError::Kernel("boom".into()));
    }

    #[test]
    fn test_p2m_reproduces_far_field() {
        // A single leaf: the equivalent density must reproduce the sources'
        // potential at a distant point.
        let tree = cluster_tree(30, 64);
        assert!(tree.root().is_leaf());
        let config = FmmConfig::with_order(5);
        let surface = ExpansionSurface::grid(config.order).unwrap();
        let upward = Upward::compute(&tree, &surface, &laplace_single_layer, &config).unwrap();

        let data = tree.root().data().unwrap();
        let p2m = upward.p2m().unwrap();
        let strengths: Vec<f64> = (0..data.len()).map(|i| 1.0 + (i % 3) as f64).collect();
        let equiv = surface.place(upward.bounds(), config.inner_r);
        let target = DVec3::new(6.0, -5.0, 4.0);

        let direct: f64 = data
            .pts
            .iter()
            .zip(&strengths)
            .map(|(p, q)| q * laplace_single_layer(target, DVec3::Z, *p, DVec3::Z))
            .sum();
        let approx: f64 = (0..surface.len())
            .map(|i| {
                let density: f64 = (0..data.len()).map(|j| p2m[(i, j)] * strengths[j]).sum();
                density * laplace_single_layer(target, DVec3::Z, equiv.pts[i], DVec3::Z)
            })
            .sum();
        assert!(((approx - direct) / direct).abs() < 1e-3);
    }
}
