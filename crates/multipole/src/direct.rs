//! Dense all-pairs evaluation, the reference the FMM operators approximate.

use faer::Mat;

use crate::error::FmmError;
use crate::kernel::{checked_block, Kernel, PointSet};

/// Full `obs.len() x src.len()` interaction matrix in input order.
///
/// # Errors
///
/// Propagates kernel failures.
pub fn dense_operator<K: Kernel + ?Sized>(
    kernel: &K,
    obs: PointSet<'_>,
    src: PointSet<'_>,
) -> Result<Mat<f64>, FmmError> {
    checked_block(kernel, obs, src)
}

/// Apply the dense interaction matrix to source strengths `x`.
///
/// # Errors
///
/// [`FmmError::DimensionMismatch`] if `x` does not match `src`, or a
/// kernel failure.
pub fn apply<K: Kernel + ?Sized>(
    kernel: &K,
    obs: PointSet<'_>,
    src: PointSet<'_>,
    x: &[f64],
) -> Result<Vec<f64>, FmmError> {
    if x.len() != src.len() {
        return Err(FmmError::DimensionMismatch {
            expected: src.len(),
            got: x.len(),
        });
    }
    let matrix = dense_operator(kernel, obs, src)?;
    Ok((0..matrix.nrows())
        .map(|i| (0..matrix.ncols()).map(|j| matrix[(i, j)] * x[j]).sum())
        .collect())
}
