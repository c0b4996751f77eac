use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, trace};
use wayfinder_common::{GridCoordinate, Vector3, WorldPointExt};

use super::cell::{Cell, CellState};
use super::terrain::GroundProbe;
use crate::config::GridConfig;
use crate::error::NavigationError;

/// Offsets of the 8 surrounding cells, axis neighbors first.
const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, 1),
    (0, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
    (-1, -1),
];

/// A sparse grid of cells, created on demand by probing the terrain.
///
/// The grid covers `[-half_extent, half_extent]` cells on each axis around its
/// origin. Most of that extent is never materialized: a cell only exists once
/// [`get_or_create`](Self::get_or_create), [`materialize_range`](Self::materialize_range)
/// or [`bake`](Self::bake) touched it. Cells are never removed.
pub struct SpatialGrid {
    config: GridConfig,
    probe: Box<dyn GroundProbe>,
    cells: HashMap<GridCoordinate, Cell>,
}

impl SpatialGrid {
    /// Creates a new grid.
    ///
    /// # Arguments
    /// * `config` - Grid layout and probe parameters
    /// * `probe` - Terrain collaborator used to classify new cells
    ///
    /// # Returns
    /// * `Result<Self, NavigationError>` - The grid, baked when `bake_on_start` is set
    pub fn new(config: GridConfig, probe: impl GroundProbe + 'static) -> Result<Self, NavigationError> {
        config.validate()?;
        let mut grid = SpatialGrid {
            config,
            probe: Box::new(probe),
            cells: HashMap::new(),
        };
        if grid.config.bake_on_start {
            grid.bake();
        }
        info!(
            half_extent = grid.config.half_extent,
            node_radius = grid.config.node_radius,
            cells = grid.cells.len(),
            "Spatial grid created"
        );
        Ok(grid)
    }

    /// Returns the grid configuration.
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// World size of one cell.
    pub fn node_radius(&self) -> f32 {
        self.config.node_radius
    }

    /// Number of materialized cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true when no cell has been materialized yet.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterates over the materialized cells, in no particular order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Returns true when `coord` lies within the grid extent.
    pub fn contains_coordinate(&self, coord: GridCoordinate) -> bool {
        let h = self.config.half_extent;
        (-h..=h).contains(&coord.x) && (-h..=h).contains(&coord.z)
    }

    /// Returns true when `position` snaps to a coordinate inside the extent,
    /// before any clamping.
    pub fn contains_position(&self, position: &Vector3) -> bool {
        let h = self.config.half_extent as f32;
        let x = ((position.x - self.config.origin_x) / self.config.node_radius).round();
        let z = ((position.z - self.config.origin_z) / self.config.node_radius).round();
        (-h..=h).contains(&x) && (-h..=h).contains(&z)
    }

    fn clamp(&self, coord: GridCoordinate) -> GridCoordinate {
        let h = self.config.half_extent;
        GridCoordinate::new(coord.x.clamp(-h, h), coord.z.clamp(-h, h))
    }

    /// Snaps a world position to the nearest grid coordinate.
    ///
    /// Positions outside the extent snap to the closest border cell.
    pub fn world_to_grid(&self, position: &Vector3) -> GridCoordinate {
        let h = self.config.half_extent as f32;
        let x = ((position.x - self.config.origin_x) / self.config.node_radius).round();
        let z = ((position.z - self.config.origin_z) / self.config.node_radius).round();
        // Clamp before the cast, NaN maps to 0
        GridCoordinate::new(x.clamp(-h, h) as i32, z.clamp(-h, h) as i32)
    }

    /// Canonical world position of a coordinate, on the `y = 0` plane.
    ///
    /// This is not an exact inverse of [`world_to_grid`](Self::world_to_grid): it
    /// returns the cell center, not whatever position snapped to it.
    pub fn grid_to_world(&self, coord: GridCoordinate) -> Vector3 {
        Vector3::new(
            self.config.origin_x + coord.x as f32 * self.config.node_radius,
            0.0,
            self.config.origin_z + coord.z as f32 * self.config.node_radius,
        )
    }

    /// Returns the cell at `coord` if it has been materialized.
    pub fn get(&self, coord: GridCoordinate) -> Option<&Cell> {
        self.cells.get(&coord)
    }

    /// Returns the materialized cell under a world position, if any.
    pub fn cell_at(&self, position: &Vector3) -> Option<&Cell> {
        self.get(self.world_to_grid(position))
    }

    fn probe_cell(config: &GridConfig, probe: &dyn GroundProbe, coord: GridCoordinate) -> Cell {
        let x = config.origin_x + coord.x as f32 * config.node_radius;
        let z = config.origin_z + coord.z as f32 * config.node_radius;
        let origin = Vector3::new(x, config.probe_height, z);
        match probe.probe(&origin, config.probe_radius) {
            Some(hit) => {
                let state = if config.walkable_layers.contains(hit.layer) {
                    CellState::Walkable
                } else {
                    CellState::Unwalkable
                };
                Cell::new(coord, Vector3::new(x, hit.height, z), state)
            }
            // No ground: the cell still exists, but nothing can stand on it
            None => Cell::new(coord, Vector3::new(x, 0.0, z), CellState::Unwalkable),
        }
    }

    /// Returns the cell at `coord`, probing the terrain to create it if needed.
    ///
    /// Coordinates outside the extent are clamped onto its border. Creation never
    /// fails: a cell without ground under it is created unwalkable.
    pub fn get_or_create(&mut self, coord: GridCoordinate) -> &Cell {
        let coord = self.clamp(coord);
        let SpatialGrid { config, probe, cells } = self;
        cells.entry(coord).or_insert_with(|| {
            let cell = Self::probe_cell(config, &**probe, coord);
            trace!(%coord, state = ?cell.state(), "Cell materialized");
            cell
        })
    }

    /// Enumerates every in-extent coordinate whose canonical position lies within
    /// `radius` world units of `position` (horizontal distance).
    ///
    /// Coordinates are returned once each, ordered by `x` then `z`.
    pub fn find_coordinates_in_range(&self, position: &Vector3, radius: f32) -> Vec<GridCoordinate> {
        let mut coordinates = Vec::new();
        if !(radius >= 0.0) {
            return coordinates;
        }

        let center = self.world_to_grid(position);
        let span = 2 * self.config.half_extent;
        let window = ((radius / self.config.node_radius).ceil() as i32).min(span);
        let radius_sq = radius * radius;

        for dx in -window..=window {
            for dz in -window..=window {
                let coord = center.offset(dx, dz);
                if !self.contains_coordinate(coord) {
                    continue;
                }
                if self.grid_to_world(coord).horizontal_distance_squared(position) <= radius_sq {
                    coordinates.push(coord);
                }
            }
        }
        coordinates
    }

    /// Materializes every cell [`find_coordinates_in_range`](Self::find_coordinates_in_range)
    /// would return.
    ///
    /// # Returns
    /// * `usize` - The number of cells created by this call
    pub fn materialize_range(&mut self, position: &Vector3, radius: f32) -> usize {
        let mut created = 0;
        for coord in self.find_coordinates_in_range(position, radius) {
            if !self.cells.contains_key(&coord) {
                self.get_or_create(coord);
                created += 1;
            }
        }
        debug!(
            x = position.x,
            z = position.z,
            radius,
            created,
            total = self.cells.len(),
            "Grid range materialized"
        );
        created
    }

    /// Materializes the whole extent.
    ///
    /// # Returns
    /// * `usize` - The number of cells created by this call
    pub fn bake(&mut self) -> usize {
        let h = self.config.half_extent;
        let before = self.cells.len();
        for x in -h..=h {
            for z in -h..=h {
                self.get_or_create(GridCoordinate::new(x, z));
            }
        }
        let created = self.cells.len() - before;
        info!(created, total = self.cells.len(), "Grid baked");
        created
    }

    /// The existing cells among the 8 surrounding `coord`.
    ///
    /// Unmaterialized neighbors are skipped: for searching, a cell that has not
    /// been explored yet does not exist.
    pub fn neighbors(&self, coord: GridCoordinate) -> Vec<Cell> {
        NEIGHBOR_OFFSETS
            .iter()
            .filter_map(|&(dx, dz)| self.cells.get(&coord.offset(dx, dz)).copied())
            .collect()
    }

    /// Overwrites the classification of an existing cell.
    ///
    /// # Returns
    /// * `bool` - `false` when the cell does not exist; it is not created
    pub fn repaint(&mut self, coord: GridCoordinate, state: CellState) -> bool {
        match self.cells.get_mut(&coord) {
            Some(cell) => {
                if cell.state != state {
                    debug!(%coord, ?state, "Cell repainted");
                }
                cell.state = state;
                true
            }
            None => false,
        }
    }

    /// [`repaint`](Self::repaint) for the cell under a world position.
    pub fn repaint_at(&mut self, position: &Vector3, state: CellState) -> bool {
        let coord = self.world_to_grid(position);
        self.repaint(coord, state)
    }
}

impl fmt::Debug for SpatialGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialGrid")
            .field("config", &self.config)
            .field("cells", &self.cells.len())
            .finish()
    }
}

impl fmt::Display for SpatialGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "SpatialGrid ({} cells, extent: ±{}, node radius: {:.2})",
            self.cells.len(),
            self.config.half_extent,
            self.config.node_radius
        )?;
        let Some(min_x) = self.cells.keys().map(|c| c.x).min() else {
            return Ok(());
        };
        let max_x = self.cells.keys().map(|c| c.x).max().unwrap_or(min_x);
        let min_z = self.cells.keys().map(|c| c.z).min().unwrap_or(0);
        let max_z = self.cells.keys().map(|c| c.z).max().unwrap_or(min_z);

        // Rows from +z down so the printout reads like a map
        for z in (min_z..=max_z).rev() {
            for x in min_x..=max_x {
                let glyph = match self.cells.get(&GridCoordinate::new(x, z)) {
                    Some(cell) if cell.is_walkable() => '.',
                    Some(_) => '#',
                    None => ' ',
                };
                write!(f, "{} ", glyph)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{FlatGround, GroundHit, Region, TerrainLayout};

    fn flat_grid(half_extent: i32) -> SpatialGrid {
        let config = GridConfig {
            half_extent,
            ..GridConfig::default()
        };
        SpatialGrid::new(config, FlatGround::default()).unwrap()
    }

    #[test]
    fn test_grid_creation() {
        let grid = flat_grid(10);
        assert!(grid.is_empty());
        assert_eq!(grid.node_radius(), 1.0);

        let config = GridConfig {
            half_extent: 2,
            bake_on_start: true,
            ..GridConfig::default()
        };
        let baked = SpatialGrid::new(config, FlatGround::default()).unwrap();
        assert_eq!(baked.len(), 25);
    }

    #[test]
    fn test_invalid_creation() {
        let config = GridConfig {
            node_radius: -1.0,
            ..GridConfig::default()
        };
        assert!(matches!(
            SpatialGrid::new(config, FlatGround::default()),
            Err(NavigationError::InvalidNodeRadius(_))
        ));
    }

    #[test]
    fn test_coordinate_conversion() {
        let config = GridConfig {
            origin_x: 10.0,
            origin_z: -4.0,
            node_radius: 0.5,
            half_extent: 20,
            ..GridConfig::default()
        };
        let grid = SpatialGrid::new(config, FlatGround::default()).unwrap();

        assert_eq!(grid.world_to_grid(&Vector3::new(10.0, 3.0, -4.0)), GridCoordinate::new(0, 0));
        assert_eq!(grid.world_to_grid(&Vector3::new(11.1, 0.0, -4.6)), GridCoordinate::new(2, -1));

        let world = grid.grid_to_world(GridCoordinate::new(2, -1));
        assert!((world.x - 11.0).abs() < 1e-6);
        assert!((world.z - -4.5).abs() < 1e-6);
        assert_eq!(world.y, 0.0);

        // Outside the extent snaps to the border
        assert_eq!(
            grid.world_to_grid(&Vector3::new(1000.0, 0.0, -1000.0)),
            GridCoordinate::new(20, -20)
        );
        assert!(grid.contains_position(&Vector3::new(20.2, 0.0, -14.0)));
        assert!(!grid.contains_position(&Vector3::new(20.3, 0.0, -4.0)));
        assert!(!grid.contains_position(&Vector3::new(1000.0, 0.0, -1000.0)));
        assert!(!grid.contains_position(&Vector3::new(f32::NAN, 0.0, 0.0)));
    }

    #[test]
    fn test_round_trip_is_identity() {
        let mut grid = flat_grid(5);
        grid.bake();
        let coords: Vec<GridCoordinate> = grid.cells().map(|c| c.coordinate()).collect();
        for coord in coords {
            let cell = *grid.get(coord).unwrap();
            assert_eq!(grid.world_to_grid(&grid.grid_to_world(coord)), coord);
            assert_eq!(grid.world_to_grid(&cell.world_position()), coord);
        }
    }

    #[test]
    fn test_get_or_create() {
        let terrain = TerrainLayout::default().with_obstacle(Region::new(2.0, 0.0, 2.0, 0.0));
        let config = GridConfig {
            half_extent: 5,
            probe_radius: 0.0,
            ..GridConfig::default()
        };
        let mut grid = SpatialGrid::new(config, terrain).unwrap();

        let cell = *grid.get_or_create(GridCoordinate::new(1, 0));
        assert!(cell.is_walkable());
        assert_eq!(cell.world_position(), Vector3::new(1.0, 0.0, 0.0));

        let wall = *grid.get_or_create(GridCoordinate::new(2, 0));
        assert_eq!(wall.state(), CellState::Unwalkable);
        assert_eq!(wall.world_position().y, 2.0);
        assert_eq!(grid.len(), 2);

        // Second lookup does not probe again
        grid.get_or_create(GridCoordinate::new(1, 0));
        assert_eq!(grid.len(), 2);

        // Clamped onto the border
        let border = grid.get_or_create(GridCoordinate::new(9, -9)).coordinate();
        assert_eq!(border, GridCoordinate::new(5, -5));
    }

    #[test]
    fn test_cell_without_ground() {
        let config = GridConfig {
            half_extent: 5,
            ..GridConfig::default()
        };
        let mut grid = SpatialGrid::new(config, |_: &Vector3, _: f32| None::<GroundHit>).unwrap();
        let cell = grid.get_or_create(GridCoordinate::new(3, 3));
        assert_eq!(cell.state(), CellState::Unwalkable);
        assert_eq!(cell.world_position().y, 0.0);
    }

    #[test]
    fn test_range_queries() {
        let mut grid = flat_grid(10);
        let coords = grid.find_coordinates_in_range(&Vector3::zeros(), 1.0);
        assert_eq!(coords.len(), 5);
        assert!(grid.is_empty());

        let coords = grid.find_coordinates_in_range(&Vector3::zeros(), 1.5);
        assert_eq!(coords.len(), 9);

        let created = grid.materialize_range(&Vector3::zeros(), 2.0);
        // 13 cells within distance 2 of the origin
        assert_eq!(created, 13);
        assert_eq!(grid.materialize_range(&Vector3::zeros(), 2.0), 0);
        assert_eq!(grid.materialize_range(&Vector3::zeros(), 3.0), 29 - 13);

        // Range is clipped at the extent
        let corner = grid.find_coordinates_in_range(&Vector3::new(10.0, 0.0, 10.0), 1.0);
        assert_eq!(corner.len(), 3);
    }

    #[test]
    fn test_neighbors_only_existing() {
        let mut grid = flat_grid(10);
        let center = GridCoordinate::new(0, 0);
        assert!(grid.neighbors(center).is_empty());

        grid.get_or_create(GridCoordinate::new(1, 0));
        grid.get_or_create(GridCoordinate::new(-1, -1));
        grid.get_or_create(GridCoordinate::new(2, 0));
        let neighbors: Vec<GridCoordinate> = grid.neighbors(center).iter().map(|c| c.coordinate()).collect();
        assert_eq!(neighbors, vec![GridCoordinate::new(1, 0), GridCoordinate::new(-1, -1)]);

        grid.materialize_range(&Vector3::zeros(), 2.0);
        assert_eq!(grid.neighbors(center).len(), 8);
    }

    #[test]
    fn test_repaint() {
        let mut grid = flat_grid(10);
        let coord = GridCoordinate::new(3, 4);
        assert!(!grid.repaint(coord, CellState::Unwalkable));
        assert!(grid.get(coord).is_none());

        grid.get_or_create(coord);
        assert!(grid.repaint_at(&Vector3::new(3.2, 0.0, 3.9), CellState::Unwalkable));
        assert_eq!(grid.get(coord).unwrap().state(), CellState::Unwalkable);
        assert!(grid.cell_at(&Vector3::new(3.0, 0.0, 4.0)).is_some());
    }

    #[test]
    fn test_display() {
        let mut grid = flat_grid(3);
        grid.materialize_range(&Vector3::zeros(), 1.0);
        grid.repaint(GridCoordinate::new(0, 0), CellState::Unwalkable);
        let display = format!("{}", grid);
        assert!(display.contains("SpatialGrid (5 cells"));
        assert!(display.contains('#'));
    }
}
