//! Pipeline tests: tree, upward pass, assembly and application together.
//!
//! - `accuracy.rs`: FMM results against dense all-pairs evaluation
//! - `structure.rs`: operator shapes, index ranges and error paths
//! - `determinism.rs`: identical operators regardless of worker count
//! - `helpers.rs`: point cloud factories and comparison utilities

mod accuracy;
mod helpers;
