//! Point payload carried by octree nodes.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::OctreeError;
use crate::geometry::Bounds;

/// Points, their normals, and the input row each point came from.
///
/// The three sequences always have equal length. Partitioning moves
/// entries into children; storage is never shared between siblings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Point positions
    pub pts: Vec<DVec3>,
    /// Normal at each point
    pub normals: Vec<DVec3>,
    /// Index of each point in the caller's original point array
    pub original_indices: Vec<usize>,
}

impl NodeData {
    /// Wrap caller arrays, numbering points `0..n` in input order.
    ///
    /// # Errors
    ///
    /// Returns [`OctreeError::LengthMismatch`] if `pts` and `normals`
    /// differ in length.
    pub fn new(pts: Vec<DVec3>, normals: Vec<DVec3>) -> Result<Self, OctreeError> {
        let original_indices = (0..pts.len()).collect();
        Self::with_indices(pts, normals, original_indices)
    }

    /// Wrap caller arrays with explicit original indices.
    ///
    /// # Errors
    ///
    /// Returns [`OctreeError::LengthMismatch`] if the sequences differ in length.
    pub fn with_indices(
        pts: Vec<DVec3>,
        normals: Vec<DVec3>,
        original_indices: Vec<usize>,
    ) -> Result<Self, OctreeError> {
        let data = Self {
            pts,
            normals,
            original_indices,
        };
        data.validate()?;
        Ok(data)
    }

    /// Check the equal-length invariant.
    ///
    /// # Errors
    ///
    /// Returns [`OctreeError::LengthMismatch`] naming the three lengths.
    pub fn validate(&self) -> Result<(), OctreeError> {
        if self.pts.len() == self.normals.len() && self.pts.len() == self.original_indices.len() {
            Ok(())
        } else {
            Err(OctreeError::LengthMismatch {
                pts: self.pts.len(),
                normals: self.normals.len(),
                indices: self.original_indices.len(),
            })
        }
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

    /// Move every entry into the bucket of the subcell of `bounds` holding it.
    ///
    /// Buckets may be empty. Relative order within a bucket follows input order.
    #[must_use]
    pub fn partition(self, bounds: &Bounds) -> [NodeData; 8] {
        let mut buckets: [NodeData; 8] = Default::default();
        let entries = self
            .pts
            .into_iter()
            .zip(self.normals)
            .zip(self.original_indices);
        for ((pt, normal), index) in entries {
            let bucket = &mut buckets[bounds.find_containing_subcell(pt)];
            bucket.pts.push(pt);
            bucket.normals.push(normal);
            bucket.original_indices.push(index);
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_numbers_points() {
        let data = NodeData::new(vec![DVec3::ZERO; 3], vec![DVec3::Z; 3]).unwrap();
        assert_eq!(data.original_indices, vec![0, 1, 2]);
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_new_rejects_mismatched_normals() {
        let err = NodeData::new(vec![DVec3::ZERO; 3], vec![DVec3::Z; 2]).unwrap_err();
        assert_eq!(
            err,
            OctreeError::LengthMismatch {
                pts: 3,
                normals: 2,
                indices: 3
            }
        );
    }

    #[test]
    fn test_partition_keeps_triples_together() {
        let pts = vec![
            DVec3::new(0.5, 0.5, 0.5),
            DVec3::new(-0.5, -0.5, -0.5),
            DVec3::new(0.5, 0.5, -0.5),
            DVec3::new(0.6, 0.6, 0.6),
        ];
        let normals = pts.iter().map(|p| p.normalize()).collect();
        let data = NodeData::new(pts.clone(), normals).unwrap();

        let buckets = data.partition(&Bounds::UNIT);
        assert_eq!(buckets[7].original_indices, vec![0, 3]);
        assert_eq!(buckets[0].original_indices, vec![1]);
        assert_eq!(buckets[6].original_indices, vec![2]);
        assert_eq!(buckets.iter().map(NodeData::len).sum::<usize>(), 4);

        for bucket in &buckets {
            for ((p, n), &i) in bucket.pts.iter().zip(&bucket.normals).zip(&bucket.original_indices) {
                assert_eq!(*p, pts[i]);
                assert_eq!(*n, pts[i].normalize());
            }
        }
    }
}
