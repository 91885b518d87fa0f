//! Expansion surfaces.
//!
//! A node's multipole expansion is a density on a set of points surrounding
//! it (the equivalent surface), fitted so that it reproduces the node's
//! field on a larger set of points (the check surface). Both are the same
//! unit surface, scaled onto the node's box.

use glam::DVec3;
use octant::Bounds;

use crate::error::FmmError;
use crate::kernel::PointSet;

/// Surface points on the scale of the unit box, with outward normals.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionSurface {
    pts: Vec<DVec3>,
    normals: Vec<DVec3>,
}

/// A surface placed around one node.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSurface {
    /// Positions
    pub pts: Vec<DVec3>,
    /// Normal at each position
    pub normals: Vec<DVec3>,
}

impl ExpansionSurface {
    /// Grid points on the faces of `[-1, 1]^3`, `order` per edge.
    ///
    /// Yields `6 * (order - 1)^2 + 2` points.
    ///
    /// # Errors
    ///
    /// [`FmmError::InvalidConfig`] if `order < 2`.
    pub fn grid(order: usize) -> Result<Self, FmmError> {
        if order < 2 {
            return Err(FmmError::InvalidConfig(format!(
                "surface order must be at least 2, got {order}"
            )));
        }
        let last = order - 1;
        let coord = |i: usize| -1.0 + 2.0 * i as f64 / last as f64;
        let mut pts = Vec::with_capacity(6 * last * last + 2);
        for i in 0..order {
            for j in 0..order {
                for k in 0..order {
                    let on_face = [i, j, k].iter().any(|&n| n == 0 || n == last);
                    if on_face {
                        pts.push(DVec3::new(coord(i), coord(j), coord(k)));
                    }
                }
            }
        }
        Ok(Self::with_radial_normals(pts))
    }

    /// Use caller-supplied unit-scale points.
    ///
    /// # Errors
    ///
    /// [`FmmError::InvalidConfig`] for an empty set or a point at the origin,
    /// which has no outward direction.
    pub fn from_points(pts: Vec<DVec3>) -> Result<Self, FmmError> {
        if pts.is_empty() {
            return Err(FmmError::InvalidConfig("expansion surface has no points".into()));
        }
        if let Some(i) = pts.iter().position(|p| *p == DVec3::ZERO) {
            return Err(FmmError::InvalidConfig(format!(
                "expansion surface point {i} is at the origin"
            )));
        }
        Ok(Self::with_radial_normals(pts))
    }

    fn with_radial_normals(pts: Vec<DVec3>) -> Self {
        let normals = pts.iter().map(|p| p.normalize_or_zero()).collect();
        Self { pts, normals }
    }

    /// Number of surface points, which is also the number of multipole
    /// degrees of freedom per node.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pts.len()
    }

    /// True if the surface has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pts.is_empty()
    }

    /// Unit-scale points.
    #[must_use]
    pub fn pts(&self) -> &[DVec3] {
        &self.pts
    }

    /// Place the surface around `bounds`, scaled by `r` times its half-width.
    #[must_use]
    pub fn place(&self, bounds: &Bounds, r: f64) -> PlacedSurface {
        let scale = bounds.half_width * r;
        PlacedSurface {
            pts: self.pts.iter().map(|p| bounds.center + *p * scale).collect(),
            normals: self.normals.clone(),
        }
    }
}

impl PlacedSurface {
    /// Borrow as a kernel point set.
    #[must_use]
    pub fn as_set(&self) -> PointSet<'_> {
        PointSet::new(&self.pts, &self.normals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_point_count() {
        for order in 2..8 {
            let surface = ExpansionSurface::grid(order).unwrap();
            assert_eq!(surface.len(), 6 * (order - 1) * (order - 1) + 2);
        }
        assert_eq!(ExpansionSurface::grid(2).unwrap().len(), 8);
    }

    #[test]
    fn test_grid_points_lie_on_faces() {
        let surface = ExpansionSurface::grid(5).unwrap();
        for p in surface.pts() {
            assert_eq!(p.abs().max_element(), 1.0);
            assert!(Bounds::UNIT.in_box(*p));
        }
    }

    #[test]
    fn test_rejects_bad_surfaces() {
        assert!(ExpansionSurface::grid(1).is_err());
        assert!(ExpansionSurface::from_points(vec![]).is_err());
        assert!(ExpansionSurface::from_points(vec![DVec3::X, DVec3::ZERO]).is_err());
    }

    #[test]
    fn test_place_scales_around_center() {
        let surface = ExpansionSurface::from_points(vec![DVec3::new(1.0, -1.0, 0.5)]).unwrap();
        let bounds = Bounds::new(DVec3::new(1.0, 2.0, 3.0), DVec3::splat(0.5));
        let placed = surface.place(&bounds, 2.0);
        assert_eq!(placed.pts, vec![DVec3::new(2.0, 1.0, 3.5)]);
        assert!((placed.normals[0].length() - 1.0).abs() < 1e-15);
    }
}
