use std::fmt;

use wayfinder_common::{GridCoordinate, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Walkability classification of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CellState {
    /// Agents may stand on and path through the cell.
    Walkable,
    /// The cell is blocked, or has no ground under it.
    Unwalkable,
}

/// A materialized grid cell.
///
/// The coordinate and world position are fixed at creation; only the state can
/// change afterwards, through [`SpatialGrid::repaint`](super::SpatialGrid::repaint).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cell {
    coordinate: GridCoordinate,
    world_position: Vector3,
    pub(crate) state: CellState,
}

impl Cell {
    pub(crate) fn new(coordinate: GridCoordinate, world_position: Vector3, state: CellState) -> Self {
        Cell {
            coordinate,
            world_position,
            state,
        }
    }

    /// Grid address of the cell.
    pub fn coordinate(&self) -> GridCoordinate {
        self.coordinate
    }

    /// Grid-aligned world position, with `y` at the probed ground height.
    pub fn world_position(&self) -> Vector3 {
        self.world_position
    }

    /// Current walkability classification.
    pub fn state(&self) -> CellState {
        self.state
    }

    /// Shorthand for `state() == CellState::Walkable`.
    pub fn is_walkable(&self) -> bool {
        self.state == CellState::Walkable
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cell {} at ({:.2}, {:.2}, {:.2}) {:?}",
            self.coordinate,
            self.world_position.x,
            self.world_position.y,
            self.world_position.z,
            self.state
        )
    }
}
