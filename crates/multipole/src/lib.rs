//! # Multipole
//!
//! Kernel-independent fast multipole operators over [`octant`] trees.
//!
//! Given a source tree, an observation tree and any kernel that can fill a
//! dense block, this crate produces the four FMM operators in coordinate
//! form:
//!
//! - **p2p**: near-field point-to-point interactions between leaves
//! - **p2m**: source points to their leaf's equivalent density
//! - **m2m**: child equivalent densities to their parent's
//! - **m2p**: equivalent densities of far nodes to observation points
//!
//! Each node's multipole expansion is a density on an equivalent surface
//! around the node, fitted to reproduce the node's field on a larger check
//! surface. Nothing here assumes a particular kernel.
//!
//! ## Quick Start
//!
//! ```rust
//! use multipole::{kernel::laplace_single_layer, self_interaction, FmmConfig};
//! use octant::{DVec3, NodeData, Octree, OctreeConfig};
//!
//! let pts: Vec<DVec3> = (0..64)
//!     .map(|i| DVec3::new((i % 4) as f64, ((i / 4) % 4) as f64, (i / 16) as f64) * 0.5 - 0.75)
//!     .collect();
//! let normals = vec![DVec3::Z; pts.len()];
//! let tree = Octree::build(OctreeConfig::with_capacity(8), NodeData::new(pts, normals).unwrap()).unwrap();
//!
//! let fmm = self_interaction(&tree, &laplace_single_layer, &FmmConfig::with_order(3)).unwrap();
//! let potential = fmm.apply(&vec![1.0; 64]).unwrap();
//! assert_eq!(potential.len(), 64);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assembly;
pub mod config;
pub mod dense;
pub mod direct;
pub mod error;
pub mod kernel;
pub mod sparse;
pub mod surface;
pub mod upward;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use assembly::{assemble, self_interaction};
pub use config::FmmConfig;
pub use error::FmmError;
pub use kernel::{Kernel, PointSet};
pub use octant;
pub use sparse::{FmmMat, SparseMat};
pub use surface::ExpansionSurface;
pub use upward::{Upward, UpwardOp};
