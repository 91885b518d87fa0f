//! Axis-aligned boxes and the octant arithmetic the tree is built on.
//!
//! Everything here is a pure function of its arguments. The subcell
//! numbering is shared by [`Bounds::find_containing_subcell`] and
//! [`Bounds::get_subcell`]: the x bit is the most significant, z the least.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned box stored as center and per-axis half-width.
///
/// Boxes are not required to be cubes. All half-width components are
/// non-negative; a zero half-width on every axis is the "no extent" box
/// returned by [`bounding_box`] for empty input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Box center
    pub center: DVec3,
    /// Half the side length along each axis
    pub half_width: DVec3,
}

impl Bounds {
    /// The box every tree is rooted in: centered at the origin, half-width 1.
    pub const UNIT: Self = Self {
        center: DVec3::ZERO,
        half_width: DVec3::ONE,
    };

    /// Create bounds from center and half-width.
    #[must_use]
    pub fn new(center: DVec3, half_width: DVec3) -> Self {
        Self { center, half_width }
    }

    /// Create bounds from min/max corners.
    #[must_use]
    pub fn from_min_max(min: DVec3, max: DVec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            half_width: (max - min) * 0.5,
        }
    }

    /// Minimum corner.
    #[must_use]
    pub fn min(&self) -> DVec3 {
        self.center - self.half_width
    }

    /// Maximum corner.
    #[must_use]
    pub fn max(&self) -> DVec3 {
        self.center + self.half_width
    }

    /// Radius of the sphere through the corners.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.half_width.length()
    }

    /// True if every half-width component is zero.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.half_width == DVec3::ZERO
    }

    /// Octant index in `[0, 8)` of the subcell holding `point`.
    ///
    /// Per axis, a coordinate strictly greater than the center sets that
    /// axis's bit. A coordinate equal to the center falls on the low side.
    #[must_use]
    pub fn find_containing_subcell(&self, point: DVec3) -> usize {
        let mut index = 0;
        for d in 0..3 {
            if point[d] > self.center[d] {
                index += 1;
            }
            if d < 2 {
                index <<= 1;
            }
        }
        index
    }

    /// Bounds of the subcell with the given octant index.
    ///
    /// Inverse of [`Self::find_containing_subcell`]: bits are consumed from
    /// the lowest (z) to the highest (x).
    #[must_use]
    pub fn get_subcell(&self, index: usize) -> Self {
        let mut half_width = self.half_width;
        let mut center = self.center;
        let mut bits = index;
        for d in (0..3).rev() {
            half_width[d] /= 2.0;
            let side = if bits & 1 == 1 { 1.0 } else { -1.0 };
            bits >>= 1;
            center[d] += side * half_width[d];
        }
        Self { center, half_width }
    }

    /// Closed containment test: points on a face are inside.
    #[must_use]
    pub fn in_box(&self, point: DVec3) -> bool {
        let separation = (point - self.center).abs();
        separation.cmple(self.half_width).all()
    }

    /// Small box used for nodes holding zero or one point.
    ///
    /// Centered on the point (or on the parent center when empty) with one
    /// hundredth of the parent's half-width.
    #[must_use]
    pub fn degenerate_child(parent: &Self, point: Option<DVec3>) -> Self {
        Self {
            center: point.unwrap_or(parent.center),
            half_width: parent.half_width / 100.0,
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Smallest axis-aligned box holding every point.
///
/// Empty input yields center and half-width zero, a defined result that
/// callers must read as "no extent".
#[must_use]
pub fn bounding_box(points: &[DVec3]) -> Bounds {
    let Some((first, rest)) = points.split_first() else {
        return Bounds::new(DVec3::ZERO, DVec3::ZERO);
    };
    let (min, max) = rest
        .iter()
        .fold((*first, *first), |(min, max), p| (min.min(*p), max.max(*p)));
    Bounds::from_min_max(min, max)
}

/// [`bounding_box`] widened to a cube of the largest half-width.
#[must_use]
pub fn bounding_cube(points: &[DVec3]) -> Bounds {
    let bounds = bounding_box(points);
    let r = bounds.half_width.max_element();
    Bounds::new(bounds.center, DVec3::splat(r))
}

/// Free-function form of [`Bounds::find_containing_subcell`].
#[must_use]
pub fn find_containing_subcell(bounds: &Bounds, point: DVec3) -> usize {
    bounds.find_containing_subcell(point)
}

/// Free-function form of [`Bounds::get_subcell`].
#[must_use]
pub fn get_subcell(parent: &Bounds, index: usize) -> Bounds {
    parent.get_subcell(index)
}

/// Free-function form of [`Bounds::in_box`].
#[must_use]
pub fn in_box(bounds: &Bounds, point: DVec3) -> bool {
    bounds.in_box(point)
}
