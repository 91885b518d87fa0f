//! Operator assembly.
//!
//! p2m and m2m are read off the upward pass. p2p and m2p come from a dual
//! traversal of the observation and source trees: a pair of nodes that
//! passes the multipole acceptance test interacts through the source
//! node's equivalent density, a pair of leaves that does not interacts
//! directly, and any other pair is refined by splitting the larger node.

use octant::forest::{self, Unfold};
use octant::{Octree, OctreeNode};
use rayon::prelude::*;
use tracing::info;

use crate::config::FmmConfig;
use crate::error::FmmError;
use crate::kernel::{checked_block, Kernel, PointSet};
use crate::sparse::{FmmMat, SparseMat};
use crate::surface::ExpansionSurface;
use crate::upward::{Upward, UpwardOp};

/// A source node together with its upward artifact and pre-order index.
#[derive(Clone, Copy)]
struct Source<'a> {
    node: &'a OctreeNode,
    upward: &'a Upward,
    index: usize,
}

impl<'a> Source<'a> {
    fn children(self) -> Result<Option<[Source<'a>; 8]>, FmmError> {
        match (self.node.children(), self.upward.op()) {
            (None, UpwardOp::Leaf { .. }) => Ok(None),
            (Some(nodes), UpwardOp::Internal { children, .. }) => {
                let indices = self
                    .upward
                    .child_indices(self.index)
                    .ok_or(FmmError::UpwardShape { node: self.index })?;
                Ok(Some(std::array::from_fn(|k| Source {
                    node: &nodes[k],
                    upward: &children[k],
                    index: indices[k],
                })))
            }
            _ => Err(FmmError::UpwardShape { node: self.index }),
        }
    }
}

/// Near and far interactions found by the dual traversal.
#[derive(Default)]
struct Interactions {
    p2p: SparseMat,
    m2p: SparseMat,
}

impl Interactions {
    fn merge(parts: Vec<Interactions>) -> Self {
        let mut out = Self::default();
        for part in parts {
            out.p2p.extend(part.p2p);
            out.m2p.extend(part.m2p);
        }
        out
    }
}

struct Assembler<'a, K: ?Sized> {
    surface: &'a ExpansionSurface,
    kernel: &'a K,
    config: &'a FmmConfig,
}

impl<K: Kernel + ?Sized> Assembler<'_, K> {
    fn n_surf(&self) -> usize {
        self.surface.len()
    }

    fn well_separated(&self, obs: &OctreeNode, src: &OctreeNode) -> bool {
        let distance = obs.bounds.center.distance(src.bounds.center);
        distance > self.config.mac * (obs.bounds.radius() + src.bounds.radius())
    }

    fn interact(&self, obs: &OctreeNode, src: Source<'_>) -> Result<Interactions, FmmError> {
        if obs.n_points() == 0 || src.node.n_points() == 0 {
            return Ok(Interactions::default());
        }
        if self.well_separated(obs, src.node) {
            return self.m2p(obs, src);
        }

        match (obs.children(), src.children()?) {
            (None, None) => self.p2p(obs, src),
            (Some(obs_children), None) => self.split_obs(obs_children, src),
            (None, Some(src_children)) => self.split_src(obs, src_children),
            (Some(obs_children), Some(src_children)) => {
                if obs.bounds.radius() >= src.node.bounds.radius() {
                    self.split_obs(obs_children, src)
                } else {
                    self.split_src(obs, src_children)
                }
            }
        }
    }

    fn split_obs(&self, children: &[OctreeNode; 8], src: Source<'_>) -> Result<Interactions, FmmError> {
        let parts = children
            .par_iter()
            .map(|child| self.interact(child, src))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Interactions::merge(parts))
    }

    fn split_src(&self, obs: &OctreeNode, children: [Source<'_>; 8]) -> Result<Interactions, FmmError> {
        let parts = children
            .par_iter()
            .map(|&child| self.interact(obs, child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Interactions::merge(parts))
    }

    fn m2p(&self, obs: &OctreeNode, src: Source<'_>) -> Result<Interactions, FmmError> {
        let targets = obs.collect_data();
        let equiv = self.surface.place(&src.node.bounds, self.config.inner_r);
        let block = checked_block(
            self.kernel,
            PointSet::new(&targets.pts, &targets.normals),
            equiv.as_set(),
        )?;
        let first_dof = src.index * self.n_surf();
        let mut out = Interactions::default();
        out.m2p
            .push_block(&block, |i| targets.original_indices[i], |j| first_dof + j);
        Ok(out)
    }

    fn p2p(&self, obs: &OctreeNode, src: Source<'_>) -> Result<Interactions, FmmError> {
        let (Some(obs_data), Some(src_data)) = (obs.data(), src.node.data()) else {
            return Err(FmmError::UpwardShape { node: src.index });
        };
        let block = checked_block(
            self.kernel,
            PointSet::new(&obs_data.pts, &obs_data.normals),
            PointSet::new(&src_data.pts, &src_data.normals),
        )?;
        let mut out = Interactions::default();
        out.p2p.push_block(
            &block,
            |i| obs_data.original_indices[i],
            |j| src_data.original_indices[j],
        );
        Ok(out)
    }

    /// p2m and m2m triplets for the subtree under `root`, gathered with the
    /// same fan-out/fan-in as the upward pass.
    fn upward_operators(&self, root: Source<'_>) -> Result<(SparseMat, SparseMat), FmmError> {
        let n_surf = self.n_surf();
        forest::unfold_fold(
            root,
            &|src| {
                let first_dof = src.index * n_surf;
                match src.upward.op() {
                    UpwardOp::Leaf { p2m } => {
                        let data = src.node.data().ok_or(FmmError::UpwardShape { node: src.index })?;
                        let mut ops = (SparseMat::default(), SparseMat::default());
                        ops.0
                            .push_block(p2m, |i| first_dof + i, |j| data.original_indices[j]);
                        Ok::<_, FmmError>(Unfold::Done(ops))
                    }
                    UpwardOp::Internal { m2m, .. } => {
                        let children = src.children()?.ok_or(FmmError::UpwardShape { node: src.index })?;
                        let mut own = SparseMat::default();
                        for (block, child) in m2m.iter().zip(&children) {
                            let child_dof = child.index * n_surf;
                            own.push_block(block, |i| first_dof + i, |j| child_dof + j);
                        }
                        Ok::<_, FmmError>(Unfold::Split(own, children))
                    }
                }
            },
            &|own, children: [(SparseMat, SparseMat); 8]| {
                let mut p2m = SparseMat::default();
                let mut m2m = own;
                for (child_p2m, child_m2m) in children {
                    p2m.extend(child_p2m);
                    m2m.extend(child_m2m);
                }
                Ok((p2m, m2m))
            },
        )
    }
}

/// Assemble the FMM operators for observation points in `obs_tree` and
/// source points in `src_tree`.
///
/// `upward` must be the upward pass of `src_tree` computed with the same
/// `surface` and `config`. Observation and source trees may be the same.
///
/// # Errors
///
/// Fails on an invalid config, an upward pass that does not belong to
/// `src_tree`, or the first kernel error; no partial [`FmmMat`] is returned.
#[tracing::instrument(skip_all, fields(
    n_obs = obs_tree.root().n_points(),
    n_src = src_tree.root().n_points(),
    n_surf = surface.len(),
))]
pub fn assemble<K: Kernel + ?Sized>(
    obs_tree: &Octree,
    src_tree: &Octree,
    upward: &Upward,
    surface: &ExpansionSurface,
    kernel: &K,
    config: &FmmConfig,
) -> Result<FmmMat, FmmError> {
    config.validate()?;
    let node_count = src_tree.stats().node_count;
    if upward.n_nodes() != node_count {
        return Err(FmmError::TreeMismatch {
            upward: upward.n_nodes(),
            tree: node_count,
        });
    }

    let assembler = Assembler {
        surface,
        kernel,
        config,
    };
    let root = Source {
        node: src_tree.root(),
        upward,
        index: 0,
    };

    let (upward_ops, interactions) = rayon::join(
        || assembler.upward_operators(root),
        || assembler.interact(obs_tree.root(), root),
    );
    let (p2m, m2m) = upward_ops?;
    let Interactions { p2p, m2p } = interactions?;

    let fmm = FmmMat {
        p2p,
        p2m,
        m2p,
        m2m,
        n_m_dofs: surface.len() * node_count,
        n_obs: obs_tree.root().n_points(),
        n_src: src_tree.root().n_points(),
    };
    info!(
        p2p = fmm.p2p.len(),
        p2m = fmm.p2m.len(),
        m2p = fmm.m2p.len(),
        m2m = fmm.m2m.len(),
        n_m_dofs = fmm.n_m_dofs,
        "fmm operators assembled"
    );
    Ok(fmm)
}

/// Upward pass and assembly for a tree acting on itself, using the grid
/// surface of `config.order`.
///
/// # Errors
///
/// Any error from [`Upward::compute`] or [`assemble`].
pub fn self_interaction<K: Kernel + ?Sized>(
    tree: &Octree,
    kernel: &K,
    config: &FmmConfig,
) -> Result<FmmMat, FmmError> {
    let surface = ExpansionSurface::grid(config.order)?;
    let upward = Upward::compute(tree, &surface, kernel, config)?;
    assemble(tree, tree, &upward, &surface, kernel, config)
}
