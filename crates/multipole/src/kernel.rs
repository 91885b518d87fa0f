//! The kernel seam.
//!
//! The FMM machinery never knows which physics it is approximating. All it
//! asks of a kernel is a dense block of interactions between a set of
//! observation points and a set of source points, each with normals.

use faer::Mat;
use glam::DVec3;

use crate::error::FmmError;

/// Points with one normal each, borrowed from a node or a surface.
#[derive(Debug, Clone, Copy)]
pub struct PointSet<'a> {
    /// Positions
    pub pts: &'a [DVec3],
    /// Normal at each position
    pub normals: &'a [DVec3],
}

impl<'a> PointSet<'a> {
    /// Pair positions with normals.
    #[must_use]
    pub fn new(pts: &'a [DVec3], normals: &'a [DVec3]) -> Self {
        debug_assert_eq!(pts.len(), normals.len());
        Self { pts, normals }
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pts.len()
    }

    /// True if there are no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pts.is_empty()
    }
}

/// Dense block service used by every FMM operator.
///
/// Implementations must be shareable across rayon workers. Any plain
/// closure `Fn(obs, obs_normal, src, src_normal) -> f64` is a kernel.
pub trait Kernel: Sync {
    /// Evaluate the `obs.len() x src.len()` interaction block.
    ///
    /// # Errors
    ///
    /// Implementations backed by fallible evaluators report failures as
    /// [`FmmError::Kernel`].
    fn block(&self, obs: PointSet<'_>, src: PointSet<'_>) -> Result<Mat<f64>, FmmError>;
}

impl<F> Kernel for F
where
    F: Fn(DVec3, DVec3, DVec3, DVec3) -> f64 + Sync,
{
    fn block(&self, obs: PointSet<'_>, src: PointSet<'_>) -> Result<Mat<f64>, FmmError> {
        Ok(Mat::from_fn(obs.len(), src.len(), |i, j| {
            self(obs.pts[i], obs.normals[i], src.pts[j], src.normals[j])
        }))
    }
}

/// Evaluate a block and check that the kernel honoured the requested shape.
///
/// # Errors
///
/// Propagates kernel failures, and returns [`FmmError::BlockShape`] if the
/// block does not have one row per observation point and one column per
/// source point.
pub fn checked_block<K: Kernel + ?Sized>(
    kernel: &K,
    obs: PointSet<'_>,
    src: PointSet<'_>,
) -> Result<Mat<f64>, FmmError> {
    let block = kernel.block(obs, src)?;
    if block.nrows() != obs.len() || block.ncols() != src.len() {
        return Err(FmmError::BlockShape {
            rows: obs.len(),
            cols: src.len(),
            got_rows: block.nrows(),
            got_cols: block.ncols(),
        });
    }
    Ok(block)
}

/// Single-layer Laplace kernel `1 / (4 pi r)`, zero at coincident points.
///
/// Smooth away from the origin, which makes it a convenient reference for
/// checking FMM accuracy. Normals are ignored.
#[must_use]
pub fn laplace_single_layer(obs: DVec3, _obs_normal: DVec3, src: DVec3, _src_normal: DVec3) -> f64 {
    let r = obs.distance(src);
    if r == 0.0 {
        0.0
    } else {
        1.0 / (4.0 * std::f64::consts::PI * r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Truncating;

    impl Kernel for Truncating {
        fn block(&self, obs: PointSet<'_>, src: PointSet<'_>) -> Result<Mat<f64>, FmmError> {
            Ok(Mat::zeros(obs.len(), src.len().saturating_sub(1)))
        }
    }

    #[test]
    fn test_closure_kernel_block() {
        let obs = [DVec3::ZERO, DVec3::X];
        let src = [DVec3::Y, DVec3::Z, DVec3::ONE];
        let normals = [DVec3::Z; 3];
        let kernel = |o: DVec3, _: DVec3, s: DVec3, _: DVec3| o.distance_squared(s);

        let block = checked_block(&kernel, PointSet::new(&obs, &normals[..2]), PointSet::new(&src, &normals)).unwrap();
        assert_eq!((block.nrows(), block.ncols()), (2, 3));
        assert_eq!(block[(1, 0)], 2.0);
        assert_eq!(block[(0, 2)], 3.0);
    }

    #[test]
    fn test_checked_block_rejects_wrong_shape() {
        let pts = [DVec3::ZERO; 2];
        let set = PointSet::new(&pts, &pts);
        let err = checked_block(&Truncating, set, set).unwrap_err();
        assert_eq!(
            err,
            FmmError::BlockShape {
                rows: 2,
                cols: 2,
                got_rows: 2,
                got_cols: 1
            }
        );
    }

    #[test]
    fn test_laplace_is_zero_on_diagonal() {
        assert_eq!(laplace_single_layer(DVec3::X, DVec3::Z, DVec3::X, DVec3::Z), 0.0);
        let v = laplace_single_layer(DVec3::ZERO, DVec3::Z, DVec3::new(2.0, 0.0, 0.0), DVec3::Z);
        assert!((v - 1.0 / (8.0 * std::f64::consts::PI)).abs() < 1e-15);
    }
}
