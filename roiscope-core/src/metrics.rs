//! Spatial neighbor statistics.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::region::RegionId;

/// Neighbor count at which the clustering coefficient saturates
/// (hexagonal close packing).
pub const CLOSE_PACKING_NEIGHBORS: f64 = 6.0;

/// Neighbor statistics for one region, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpatialMetrics {
    region: RegionId,
    neighbors: Vec<RegionId>,
    nearest_distance: Option<f64>,
    mean_distance: Option<f64>,
    local_density: f64,
    clustering_coefficient: f64,
}

impl SpatialMetrics {
    /// Builds the record from a neighbor list and the matching distances.
    ///
    /// `distances[i]` is the distance to `neighbors[i]`; extra entries on
    /// either side are ignored.
    pub fn new(
        region: RegionId,
        neighbors: Vec<RegionId>,
        distances: &[f64],
        local_density: f64,
    ) -> Self {
        let used = &distances[..distances.len().min(neighbors.len())];
        let nearest_distance = used.iter().copied().reduce(f64::min);
        #[allow(clippy::cast_precision_loss)]
        let mean_distance = (!used.is_empty()).then(|| used.iter().sum::<f64>() / used.len() as f64);
        let clustering_coefficient = clustering_for(neighbors.len());
        Self {
            region,
            neighbors,
            nearest_distance,
            mean_distance,
            local_density,
            clustering_coefficient,
        }
    }

    /// Record for a region with no neighbors.
    pub fn isolated(region: RegionId) -> Self {
        Self::new(region, Vec::new(), &[], 0.0)
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn neighbors(&self) -> &[RegionId] {
        &self.neighbors
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Distance to the closest neighbor, `None` when isolated.
    pub fn nearest_distance(&self) -> Option<f64> {
        self.nearest_distance
    }

    pub fn mean_distance(&self) -> Option<f64> {
        self.mean_distance
    }

    /// Neighbors per square pixel of search area.
    pub fn local_density(&self) -> f64 {
        self.local_density
    }

    /// `min(1, neighbors / 6)`.
    ///
    /// Not a graph clustering coefficient: a packing-based approximation
    /// that treats six neighbors as fully surrounded.
    pub fn clustering_coefficient(&self) -> f64 {
        self.clustering_coefficient
    }

    pub fn has_neighbor(&self, id: RegionId) -> bool {
        self.neighbors.contains(&id)
    }

    pub fn is_isolated(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn is_highly_connected(&self, threshold: usize) -> bool {
        self.neighbors.len() >= threshold
    }
}

#[allow(clippy::cast_precision_loss)]
fn clustering_for(neighbor_count: usize) -> f64 {
    (neighbor_count as f64 / CLOSE_PACKING_NEIGHBORS).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_isolated_region() {
        let metrics = SpatialMetrics::isolated(RegionId::new());
        assert!(metrics.is_isolated());
        assert_relative_eq!(metrics.clustering_coefficient(), 0.0);
        assert_eq!(metrics.nearest_distance(), None);
        assert!(!metrics.is_highly_connected(1));
    }

    #[test]
    fn test_clustering_caps_at_one() {
        let neighbors: Vec<_> = (0..12).map(|_| RegionId::new()).collect();
        let distances: Vec<f64> = (1..=12).map(f64::from).collect();
        let metrics = SpatialMetrics::new(RegionId::new(), neighbors, &distances, 0.01);
        assert_relative_eq!(metrics.clustering_coefficient(), 1.0);
        assert_relative_eq!(metrics.nearest_distance().unwrap(), 1.0);
        assert_relative_eq!(metrics.mean_distance().unwrap(), 6.5);
        assert!(metrics.is_highly_connected(12));
        assert!(!metrics.is_highly_connected(13));
    }

    #[test]
    fn test_partial_clustering() {
        let a = RegionId::new();
        let metrics = SpatialMetrics::new(RegionId::new(), vec![a, RegionId::new(), RegionId::new()], &[3.0, 4.0, 5.0], 0.0);
        assert_relative_eq!(metrics.clustering_coefficient(), 0.5);
        assert!(metrics.has_neighbor(a));
    }
}
