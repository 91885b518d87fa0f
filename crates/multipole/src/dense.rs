//! Dense linear algebra on kernel blocks.

use faer::Mat;

use crate::error::FmmError;

/// Truncated pseudo-inverse via thin SVD.
///
/// Singular values at or below `rel_tol * sigma_max` are treated as zero.
/// The result has the transposed shape of `a`.
///
/// # Errors
///
/// [`FmmError::Svd`] if the decomposition does not converge.
pub fn pinv(a: &Mat<f64>, rel_tol: f64) -> Result<Mat<f64>, FmmError> {
    if a.nrows() == 0 || a.ncols() == 0 {
        return Ok(Mat::zeros(a.ncols(), a.nrows()));
    }
    let svd = a.thin_svd().map_err(|err| FmmError::Svd(format!("{err:?}")))?;
    let u = svd.U();
    let v = svd.V();
    let sigma: Vec<f64> = svd.S().column_vector().iter().copied().collect();

    let cutoff = sigma.iter().copied().fold(0.0, f64::max) * rel_tol;
    let inv_sigma: Vec<f64> = sigma
        .iter()
        .map(|&s| if s > cutoff && s > 0.0 { 1.0 / s } else { 0.0 })
        .collect();

    // V * diag(1/s) * U^T
    let v_scaled = Mat::from_fn(v.nrows(), inv_sigma.len(), |i, k| v[(i, k)] * inv_sigma[k]);
    Ok(&v_scaled * u.transpose())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_abs_diff(a: &Mat<f64>, b: &Mat<f64>) -> f64 {
        assert_eq!((a.nrows(), a.ncols()), (b.nrows(), b.ncols()));
        let mut worst = 0.0f64;
        for i in 0..a.nrows() {
            for j in 0..a.ncols() {
                worst = worst.max((a[(i, j)] - b[(i, j)]).abs());
            }
        }
        worst
    }

    #[test]
    fn test_pinv_of_invertible_is_inverse() {
        let a = Mat::from_fn(3, 3, |i, j| if i == j { 2.0 + i as f64 } else { 0.5 });
        let inv = pinv(&a, 1e-14).unwrap();
        let identity = Mat::from_fn(3, 3, |i, j| if i == j { 1.0 } else { 0.0 });
        assert!(max_abs_diff(&(&a * &inv), &identity) < 1e-12);
    }

    #[test]
    fn test_pinv_of_rank_deficient() {
        // Rank one: every row is a multiple of (1, 2)
        let a = Mat::from_fn(3, 2, |i, j| (i + 1) as f64 * (j + 1) as f64);
        let inv = pinv(&a, 1e-12).unwrap();
        assert_eq!((inv.nrows(), inv.ncols()), (2, 3));
        // Moore-Penrose: A A+ A = A
        let back = &(&a * &inv) * &a;
        assert!(max_abs_diff(&back, &a) < 1e-12);
    }

    #[test]
    fn test_pinv_of_empty() {
        let a = Mat::<f64>::zeros(0, 4);
        let inv = pinv(&a, 1e-12).unwrap();
        assert_eq!((inv.nrows(), inv.ncols()), (4, 0));
    }
}
