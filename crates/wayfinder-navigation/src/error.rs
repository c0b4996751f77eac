//! This module defines the error types used by the `wayfinder-navigation` crate.

use thiserror::Error;
use wayfinder_kinematics::KinematicsError;

/// Error type for construction and configuration of navigation components.
///
/// These errors are returned when a grid, pathfinder or agent is built from
/// parameters that cannot work. Runtime navigation problems are not errors; they
/// are reported as a [`NavigationFailure`] through the arrival callback.
#[derive(Debug, Error, PartialEq)]
pub enum NavigationError {
    /// Returned when the node radius (cell size) is not positive.
    #[error("Invalid node radius: {0}")]
    InvalidNodeRadius(&'static str),
    /// Returned when the grid half extent is zero or too large.
    #[error("Invalid grid extent: {0}")]
    InvalidExtent(&'static str),
    /// Returned when the ground probe parameters are unusable.
    #[error("Invalid ground probe: {0}")]
    InvalidProbe(&'static str),
    /// Returned when an agent tunable is out of range.
    #[error("Invalid agent configuration: {0}")]
    InvalidAgentConfig(&'static str),
    /// Returned when a motion primitive rejects its parameters.
    #[error("Invalid motion parameters: {0}")]
    Kinematics(#[from] KinematicsError),
}

/// Why a navigation request ended without reaching its destination.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum NavigationFailure {
    /// The destination cell is known and classified unwalkable.
    #[error("destination is not walkable")]
    DestinationUnwalkable,
    /// The destination lies outside the grid extent.
    #[error("destination lies outside the grid")]
    DestinationOutOfBounds,
    /// The planner hit the absolute cap on search attempts.
    #[error("search iteration limit of {0} reached")]
    IterationLimit(u32),
    /// Too many consecutive searches returned an empty path.
    #[error("no path found after {0} consecutive attempts")]
    NoPathFound(u32),
    /// Consecutive partial paths stopped getting closer to the destination.
    #[error("stuck on path, no progress towards destination")]
    StuckOnPath,
    /// The agent did not move for longer than the stuck timeout.
    #[error("agent stuck for {0:.2} s")]
    Stuck(f32),
    /// The steering direction collapsed to zero.
    #[error("steering overshoot")]
    Overshoot,
}
