//! Spatial indexing for efficient neighbor lookup.

use std::collections::HashMap;

/// Uniform grid over image space for 2D neighbor queries.
///
/// With a cell size at least as large as the search radius, every point
/// within the radius of a query lies in the 3x3 block of cells around it.
#[derive(Debug, Default)]
pub struct SpatialGrid<T> {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<T>>,
}

impl<T> SpatialGrid<T> {
    /// Create a new spatial grid. Non-positive sizes fall back to 1 pixel.
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    /// Edge length of one cell.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Clear all data.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    /// Insert a value at the given coordinates.
    pub fn insert(&mut self, x: f64, y: f64, value: T) {
        let cell = self.cell_of(x, y);
        self.cells.entry(cell).or_default().push(value);
    }

    /// Query the 3x3 neighborhood around a point.
    ///
    /// Cells past the `i64` range are skipped, never wrapped.
    pub fn query_neighborhood(&self, x: f64, y: f64) -> impl Iterator<Item = &T> + '_ {
        let (cx, cy) = self.cell_of(x, y);
        (-1..=1)
            .flat_map(move |dx| (-1..=1).map(move |dy| cx.checked_add(dx).zip(cy.checked_add(dy))))
            .flatten()
            .filter_map(|cell| self.cells.get(&cell))
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(grid: &SpatialGrid<usize>, x: f64, y: f64) -> Vec<usize> {
        let mut found: Vec<usize> = grid.query_neighborhood(x, y).copied().collect();
        found.sort_unstable();
        found
    }

    #[test]
    fn test_cell_boundaries_follow_floor() {
        let mut grid: SpatialGrid<usize> = SpatialGrid::new(10.0);
        grid.insert(9.99, 0.0, 0);
        grid.insert(10.0, 0.0, 1);
        grid.insert(29.99, 0.0, 2);
        grid.insert(30.0, 0.0, 3);
        assert_eq!(grid.occupied_cells(), 4);

        // cell 0 sees cells -1..=1
        assert_eq!(collect(&grid, 0.0, 0.0), vec![0, 1]);
        // cell 2 sees cells 1..=3
        assert_eq!(collect(&grid, 20.0, 9.99), vec![1, 2, 3]);
        // one row further down is out of reach
        assert!(collect(&grid, 20.0, 20.0).is_empty());
    }

    #[test]
    fn test_fractional_cell_size() {
        let mut grid: SpatialGrid<usize> = SpatialGrid::new(0.5);
        grid.insert(0.75, -0.25, 7);
        assert_eq!(collect(&grid, 1.49, 0.0), vec![7]);
        assert!(collect(&grid, 1.5, 0.0).is_empty());
        assert!(collect(&grid, 0.0, 0.5).is_empty());
    }

    #[test]
    fn test_invalid_cell_size_falls_back() {
        assert_eq!(SpatialGrid::<usize>::new(0.0).cell_size(), 1.0);
        assert_eq!(SpatialGrid::<usize>::new(-4.0).cell_size(), 1.0);
        assert_eq!(SpatialGrid::<usize>::new(f64::NAN).cell_size(), 1.0);
        assert_eq!(SpatialGrid::<usize>::new(f64::INFINITY).cell_size(), 1.0);
    }

    #[test]
    fn test_extreme_coordinates_saturate() {
        let mut grid: SpatialGrid<usize> = SpatialGrid::new(1.0);
        grid.insert(f64::MAX, -f64::MAX, 0);
        grid.insert(0.0, 0.0, 1);
        assert_eq!(collect(&grid, f64::MAX, -f64::MAX), vec![0]);
        assert_eq!(collect(&grid, 1e300, -1e300), vec![0]);
        assert_eq!(collect(&grid, 0.5, 0.5), vec![1]);
        grid.clear();
        assert_eq!(grid.occupied_cells(), 0);
    }

    #[test]
    fn test_negative_coordinates_use_floor() {
        let mut grid: SpatialGrid<usize> = SpatialGrid::new(10.0);
        grid.insert(-1.0, -1.0, 0);
        grid.insert(25.0, 0.0, 1);
        grid.insert(-10.0, 0.0, 2);
        grid.insert(-10.01, 0.0, 3);
        // -1.0 lands in cell -1, not cell 0
        assert_eq!(collect(&grid, 5.0, 5.0), vec![0, 2]);
        assert_eq!(collect(&grid, -15.0, 0.0), vec![0, 2, 3]);
        assert_eq!(collect(&grid, -30.0, 0.0), vec![3]);
    }
}
