//! Coordinate-format operators.

use faer::Mat;
use serde::{Deserialize, Serialize};

use crate::error::FmmError;

/// Sparse matrix as parallel (row, col, value) triplets.
///
/// Entries are neither sorted nor unique; repeated coordinates sum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseMat {
    /// Row of each entry
    pub rows: Vec<usize>,
    /// Column of each entry
    pub cols: Vec<usize>,
    /// Value of each entry
    pub vals: Vec<f64>,
}

impl SparseMat {
    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vals.len()
    }

    /// True if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }

    /// Append one entry.
    pub fn push(&mut self, row: usize, col: usize, val: f64) {
        self.rows.push(row);
        self.cols.push(col);
        self.vals.push(val);
    }

    /// Append every entry of `other`.
    pub fn extend(&mut self, other: SparseMat) {
        self.rows.extend(other.rows);
        self.cols.extend(other.cols);
        self.vals.extend(other.vals);
    }

    /// Scatter a dense block: entry `(i, j)` lands at `(row_ids[i], col_ids[j])`.
    pub fn push_block(&mut self, block: &Mat<f64>, row_ids: impl Fn(usize) -> usize, col_ids: impl Fn(usize) -> usize) {
        let n = block.nrows() * block.ncols();
        self.rows.reserve(n);
        self.cols.reserve(n);
        self.vals.reserve(n);
        for i in 0..block.nrows() {
            for j in 0..block.ncols() {
                self.push(row_ids(i), col_ids(j), block[(i, j)]);
            }
        }
    }

    /// Smallest `(rows, cols)` that holds every stored coordinate.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        let extent = |ids: &[usize]| ids.iter().max().map_or(0, |&m| m + 1);
        (extent(&self.rows), extent(&self.cols))
    }

    /// Matrix-vector product into a vector of length `n_rows`.
    ///
    /// # Errors
    ///
    /// [`FmmError::DimensionMismatch`] if an entry's column is outside `x`
    /// or its row is outside `0..n_rows`.
    pub fn dot(&self, x: &[f64], n_rows: usize) -> Result<Vec<f64>, FmmError> {
        let mut y = vec![0.0; n_rows];
        for ((&row, &col), &val) in self.rows.iter().zip(&self.cols).zip(&self.vals) {
            let xj = x.get(col).ok_or(FmmError::DimensionMismatch {
                expected: x.len(),
                got: col,
            })?;
            let yi = y.get_mut(row).ok_or(FmmError::DimensionMismatch {
                expected: n_rows,
                got: row,
            })?;
            *yi += val * xj;
        }
        Ok(y)
    }
}

/// The four FMM operators and the multipole degree-of-freedom count.
///
/// Multipole dofs are numbered in pre-order over the source tree, one
/// block of surface-size per node, so a child's dofs always come after its
/// parent's.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FmmMat {
    /// Near field: observation point <- source point
    pub p2p: SparseMat,
    /// Source point -> leaf multipole dof
    pub p2m: SparseMat,
    /// Multipole dof -> observation point
    pub m2p: SparseMat,
    /// Child multipole dof -> parent multipole dof
    pub m2m: SparseMat,
    /// Total multipole degrees of freedom
    pub n_m_dofs: usize,
    /// Number of observation points
    pub n_obs: usize,
    /// Number of source points
    pub n_src: usize,
}

impl FmmMat {
    /// Apply the operator set to source strengths `x`, in the source's
    /// original point order; the result is in observation order.
    ///
    /// Multipoles are formed by p2m, accumulated up the tree by m2m
    /// (deepest dofs first), then evaluated by m2p and added to p2p.
    ///
    /// # Errors
    ///
    /// [`FmmError::DimensionMismatch`] if `x` does not have one entry per
    /// source point.
    pub fn apply(&self, x: &[f64]) -> Result<Vec<f64>, FmmError> {
        if x.len() != self.n_src {
            return Err(FmmError::DimensionMismatch {
                expected: self.n_src,
                got: x.len(),
            });
        }
        let mut multipoles = self.p2m.dot(x, self.n_m_dofs)?;

        let mut order: Vec<usize> = (0..self.m2m.len()).collect();
        order.sort_by(|&a, &b| self.m2m.rows[b].cmp(&self.m2m.rows[a]));
        for entry in order {
            let (row, col) = (self.m2m.rows[entry], self.m2m.cols[entry]);
            if row >= self.n_m_dofs || col >= self.n_m_dofs {
                return Err(FmmError::DimensionMismatch {
                    expected: self.n_m_dofs,
                    got: row.max(col),
                });
            }
            multipoles[row] += self.m2m.vals[entry] * multipoles[col];
        }

        let mut y = self.p2p.dot(x, self.n_obs)?;
        let far = self.m2p.dot(&multipoles, self.n_obs)?;
        for (yi, fi) in y.iter_mut().zip(far) {
            *yi += fi;
        }
        Ok(y)
    }
}
