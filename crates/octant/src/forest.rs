//! Fan-out/fan-in over 8-ary trees.
//!
//! Tree construction, point counting and the multipole upward pass all have
//! the same shape: a node either finishes on its own or splits into eight
//! independent subproblems and finishes once all eight are done. This
//! module is that shape, once, on top of rayon.
//!
//! Children are handed to rayon as separate tasks and may run in any
//! order on any worker. Results are gathered in child-index order, so the
//! value produced for a node never depends on scheduling. The parent waits
//! through rayon's work-stealing join; there is no polling.

use rayon::prelude::*;

/// Outcome of expanding one seed.
#[derive(Debug)]
pub enum Unfold<S, P, N> {
    /// The node is complete without children.
    Done(N),
    /// The node needs its eight children first. `P` is whatever the node
    /// keeps for itself until the children are folded in.
    Split(P, [S; 8]),
}

/// Expand `seed` recursively with `unfold` and combine results with `fold`.
///
/// `fold` runs strictly after all eight children of a node have produced
/// their values. The first error from any task aborts the whole traversal
/// and is returned; no partial result escapes.
///
/// # Errors
///
/// Propagates the first error returned by `unfold` or `fold`.
pub fn unfold_fold<S, P, N, E, U, F>(seed: S, unfold: &U, fold: &F) -> Result<N, E>
where
    S: Send,
    P: Send,
    N: Send,
    E: Send,
    U: Fn(S) -> Result<Unfold<S, P, N>, E> + Sync,
    F: Fn(P, [N; 8]) -> Result<N, E> + Sync,
{
    match unfold(seed)? {
        Unfold::Done(node) => Ok(node),
        Unfold::Split(parent, seeds) => {
            let children = Vec::from(seeds)
                .into_par_iter()
                .map(|child| unfold_fold(child, unfold, fold))
                .collect::<Result<Vec<N>, E>>()?;
            fold(parent, into_array(children))
        }
    }
}

fn into_array<N>(children: Vec<N>) -> [N; 8] {
    match children.try_into() {
        Ok(array) => array,
        Err(children) => unreachable!("eight seeds produced {} results", children.len()),
    }
}
