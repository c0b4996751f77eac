//! Sparse, lazily-materialized navigation grid.

/// Grid cells and their walkability.
pub mod cell;
/// The sparse grid itself.
pub mod spatial_grid;
pub mod terrain;

pub use cell::{Cell, CellState};
pub use spatial_grid::SpatialGrid;
pub use terrain::{FlatGround, GroundHit, GroundProbe, LayerMask, Region, TerrainLayout};
