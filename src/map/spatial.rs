use std::collections::HashMap;

/// Spatial hash grid over geographic points.
/// Divides the world into square cells for cheap radius queries.
#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    /// Grid cells indexed by (cell_x, cell_y)
    cells: HashMap<(i32, i32), Vec<usize>>,
    /// All items (indices into this vec stored in cells)
    items: Vec<T>,
    /// Cell size in degrees
    cell_size: f64,
}

impl<T> SpatialGrid<T> {
    /// Create a new spatial grid with given cell size in degrees
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            items: Vec::new(),
            cell_size,
        }
    }

    #[inline(always)]
    fn to_cell(&self, lon: f64, lat: f64) -> (i32, i32) {
        let x = (lon / self.cell_size).floor() as i32;
        let y = (lat / self.cell_size).floor() as i32;
        (x, y)
    }

    /// Insert an item at a geographic position
    pub fn insert(&mut self, lon: f64, lat: f64, item: T) {
        let idx = self.items.len();
        self.items.push(item);

        let cell = self.to_cell(lon, lat);
        self.cells.entry(cell).or_default().push(idx);
    }

    /// Items in the cells overlapping a radius around a point.
    /// Conservative: callers confirm the exact distance.
    pub fn query_radius(&self, lon: f64, lat: f64, radius_degrees: f64) -> impl Iterator<Item = &T> + '_ {
        let (cx, cy) = self.to_cell(lon, lat);
        let r = (radius_degrees / self.cell_size).ceil() as i32;

        (-r..=r)
            .flat_map(move |dy| (-r..=r).map(move |dx| (cx + dx, cy + dy)))
            .filter_map(move |cell| self.cells.get(&cell))
            .flatten()
            .filter_map(move |&idx| self.items.get(idx))
    }

    /// Drop every item
    pub fn clear(&mut self) {
        self.cells.clear();
        self.items.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_query_finds_neighbours_only() {
        let mut grid = SpatialGrid::new(1.0);
        grid.insert(116.4, 39.9, "beijing");
        grid.insert(121.5, 31.2, "shanghai");

        let near: Vec<_> = grid.query_radius(116.0, 40.0, 0.5).copied().collect();
        assert_eq!(near, vec!["beijing"]);

        let none: Vec<_> = grid.query_radius(90.0, 30.0, 0.5).collect();
        assert!(none.is_empty());
    }

    #[test]
    fn clear_empties_grid() {
        let mut grid = SpatialGrid::new(2.0);
        grid.insert(0.0, 0.0, 1u32);
        assert_eq!(grid.len(), 1);
        grid.clear();
        assert!(grid.is_empty());
        assert_eq!(grid.query_radius(0.0, 0.0, 5.0).count(), 0);
    }
}
