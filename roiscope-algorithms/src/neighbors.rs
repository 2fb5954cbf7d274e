//! Radius-based neighbor search producing [`SpatialMetrics`].
//!
//! Regions are reduced to their bounding-box centers, bucketed into a
//! [`SpatialGrid`] whose cells are at least one radius wide, and every
//! center then scans its 3x3 cell block.

use std::collections::HashMap;
use std::f64::consts::PI;

use rayon::prelude::*;
use roiscope_core::{Error, Point, Region, RegionId, Result, SpatialMetrics};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::SpatialGrid;

/// Neighbor search configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeighborConfig {
    /// Search radius between region centers (pixels).
    pub radius: f64,
    /// Grid cell size (pixels); raised to the radius when smaller.
    pub cell_size: Option<f64>,
    /// Skip regions flagged as ignored, both as queries and as neighbors.
    pub skip_ignored: bool,
    /// Whether to use parallel processing.
    pub parallel: bool,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            radius: 50.0,
            cell_size: None,
            skip_ignored: false,
            parallel: true,
        }
    }
}

impl NeighborConfig {
    /// Set the search radius.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Set an explicit grid cell size.
    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = Some(cell_size);
        self
    }

    /// Set whether ignored regions take part.
    pub fn with_skip_ignored(mut self, skip_ignored: bool) -> Self {
        self.skip_ignored = skip_ignored;
        self
    }

    /// Set whether to use parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check the radius is usable.
    ///
    /// # Errors
    /// [`Error::InvalidSettings`] for a non-finite or non-positive radius.
    pub fn validate(&self) -> Result<()> {
        if self.radius.is_finite() && self.radius > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidSettings(format!(
                "neighbor radius must be positive, got {}",
                self.radius
            )))
        }
    }

    /// Grid cell size actually used.
    pub fn effective_cell_size(&self) -> f64 {
        self.cell_size.map_or(self.radius, |c| c.max(self.radius))
    }

    /// Area of the search disc.
    pub fn search_area(&self) -> f64 {
        PI * self.radius * self.radius
    }
}

/// Neighbor search over the regions of one image.
#[derive(Clone, Debug)]
pub struct NeighborSearch {
    config: NeighborConfig,
}

impl NeighborSearch {
    /// Create with a validated configuration.
    ///
    /// # Errors
    /// See [`NeighborConfig::validate`].
    pub fn new(config: NeighborConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Current configuration.
    pub fn config(&self) -> &NeighborConfig {
        &self.config
    }

    /// Metrics for every participating region, in input order.
    pub fn compute<'a, I>(&self, regions: I) -> Vec<SpatialMetrics>
    where
        I: IntoIterator<Item = &'a Region>,
    {
        let points: Vec<(RegionId, Point)> = regions
            .into_iter()
            .filter(|r| !(self.config.skip_ignored && r.is_ignored()))
            .map(|r| (r.id(), r.bounds().center_point()))
            .collect();

        let mut grid = SpatialGrid::new(self.config.effective_cell_size());
        for (idx, (_, p)) in points.iter().enumerate() {
            grid.insert(p.x, p.y, idx);
        }

        let density_area = self.config.search_area();
        let metrics_for = |idx: usize| {
            let (id, center) = points[idx];
            let mut found: Vec<(f64, RegionId)> = grid
                .query_neighborhood(center.x, center.y)
                .filter(|&&other| other != idx)
                .filter_map(|&other| {
                    let (other_id, other_center) = points[other];
                    let d = center.distance(&other_center);
                    (d <= self.config.radius).then_some((d, other_id))
                })
                .collect();
            found.sort_by(|a, b| a.0.total_cmp(&b.0));
            let distances: Vec<f64> = found.iter().map(|(d, _)| *d).collect();
            let neighbors: Vec<RegionId> = found.into_iter().map(|(_, n)| n).collect();
            #[allow(clippy::cast_precision_loss)]
            let density = neighbors.len() as f64 / density_area;
            SpatialMetrics::new(id, neighbors, &distances, density)
        };

        let metrics: Vec<SpatialMetrics> = if self.config.parallel {
            (0..points.len()).into_par_iter().map(metrics_for).collect()
        } else {
            (0..points.len()).map(metrics_for).collect()
        };
        log::debug!(
            "Neighbor search over {} regions (radius {}px, {} grid cells)",
            points.len(),
            self.config.radius,
            grid.occupied_cells()
        );
        metrics
    }

    /// Same as [`compute`](Self::compute), keyed by region id.
    pub fn compute_map<'a, I>(&self, regions: I) -> HashMap<RegionId, SpatialMetrics>
    where
        I: IntoIterator<Item = &'a Region>,
    {
        self.compute(regions)
            .into_iter()
            .map(|m| (m.region(), m))
            .collect()
    }
}

/// One-shot helper: metrics for `regions` with `config`.
///
/// # Errors
/// See [`NeighborConfig::validate`].
pub fn compute_neighbor_metrics<'a, I>(
    regions: I,
    config: NeighborConfig,
) -> Result<HashMap<RegionId, SpatialMetrics>>
where
    I: IntoIterator<Item = &'a Region>,
{
    Ok(NeighborSearch::new(config)?.compute_map(regions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use roiscope_core::{Rect, RegionKind};

    fn at(x: i32, y: i32) -> Region {
        Region::new(RegionKind::Nucleus, Rect::new(x, y, 10, 10), "slide.tif", "n").unwrap()
    }

    #[test]
    fn test_finds_neighbors_within_radius() {
        let regions = vec![at(0, 0), at(30, 0), at(0, 40), at(500, 500)];
        let search = NeighborSearch::new(NeighborConfig::default().with_radius(45.0)).unwrap();
        let metrics = search.compute(&regions);
        assert_eq!(metrics.len(), 4);

        let first = &metrics[0];
        assert_eq!(first.neighbor_count(), 2);
        assert_eq!(first.neighbors()[0], regions[1].id());
        assert_relative_eq!(first.nearest_distance().unwrap(), 30.0);
        assert_relative_eq!(first.mean_distance().unwrap(), 35.0);
        assert_relative_eq!(first.local_density(), 2.0 / (PI * 45.0 * 45.0));

        assert!(metrics[3].is_isolated());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let regions: Vec<Region> = (0..40).map(|i| at((i % 8) * 17, (i / 8) * 23)).collect();
        let config = NeighborConfig::default().with_radius(30.0);
        let serial = NeighborSearch::new(config.clone().with_parallel(false))
            .unwrap()
            .compute(&regions);
        let parallel = NeighborSearch::new(config).unwrap().compute(&regions);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_skip_ignored() {
        let mut regions = vec![at(0, 0), at(10, 0)];
        regions[1].set_ignored(true);
        let map = compute_neighbor_metrics(
            &regions,
            NeighborConfig::default().with_skip_ignored(true),
        )
        .unwrap();
        assert_eq!(map.len(), 1);
        assert!(map[&regions[0].id()].is_isolated());
    }

    #[test]
    fn test_rejects_bad_radius() {
        assert!(NeighborSearch::new(NeighborConfig::default().with_radius(0.0)).is_err());
        assert!(NeighborSearch::new(NeighborConfig::default().with_radius(f64::NAN)).is_err());
    }
}
