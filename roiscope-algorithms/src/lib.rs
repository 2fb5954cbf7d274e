//! roiscope-algorithms: Spatial algorithms over region sets.
//!
//! This crate provides:
//! - **SpatialGrid** - uniform grid bucketing for 2D neighbor queries
//! - **NeighborSearch** - radius search producing per-region `SpatialMetrics`
//!
#![warn(missing_docs)]

mod neighbors;
pub mod spatial;

pub use neighbors::{compute_neighbor_metrics, NeighborConfig, NeighborSearch};
pub use spatial::SpatialGrid;

// Re-export the metrics record
pub use roiscope_core::SpatialMetrics;
