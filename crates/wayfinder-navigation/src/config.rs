//! Tunables for the grid, the pathfinder and navigation agents.
//!
//! Every section implements [`Default`] with values suited to a grid of one
//! world unit per cell, and `validate()` to reject values that cannot work.

use crate::error::NavigationError;
use crate::grid::LayerMask;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Layout of the spatial grid and the parameters of its ground probe.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GridConfig {
    /// World x of grid coordinate `(0, 0)`.
    pub origin_x: f32,
    /// World z of grid coordinate `(0, 0)`.
    pub origin_z: f32,
    /// Number of cells on each side of the origin, per axis.
    pub half_extent: i32,
    /// World size of one cell.
    pub node_radius: f32,
    /// Height above the cell the downward probe starts from.
    pub probe_height: f32,
    /// Thickness of the downward probe.
    pub probe_radius: f32,
    /// Terrain layers a cell may stand on to be walkable.
    pub walkable_layers: LayerMask,
    /// Materialize the whole extent when the grid is built.
    pub bake_on_start: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            origin_x: 0.0,
            origin_z: 0.0,
            half_extent: 100,
            node_radius: 1.0,
            probe_height: 1000.0,
            probe_radius: 1.0,
            walkable_layers: LayerMask::GROUND,
            bake_on_start: false,
        }
    }
}

impl GridConfig {
    /// Largest accepted half extent; keeps `(2 * half_extent + 1)²` well inside `i32`.
    pub const MAX_HALF_EXTENT: i32 = 16_384;

    /// Checks that the grid can be built from this configuration.
    pub fn validate(&self) -> Result<(), NavigationError> {
        if !(self.node_radius > 0.0) || !self.node_radius.is_finite() {
            return Err(NavigationError::InvalidNodeRadius("Node radius must be positive"));
        }
        if self.half_extent <= 0 {
            return Err(NavigationError::InvalidExtent("Half extent must be positive"));
        }
        if self.half_extent > Self::MAX_HALF_EXTENT {
            return Err(NavigationError::InvalidExtent("Half extent too large"));
        }
        if !(self.probe_height > 0.0) {
            return Err(NavigationError::InvalidProbe("Probe height must be positive"));
        }
        if self.probe_radius < 0.0 {
            return Err(NavigationError::InvalidProbe("Probe radius must be non-negative"));
        }
        Ok(())
    }
}

/// Per-agent steering, planning and failure-detection tunables.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AgentConfig {
    /// Distance at which a waypoint near the destination counts as reached.
    pub waypoint_threshold: f32,
    /// Looser waypoint threshold used while far from the destination.
    pub pass_through_threshold: f32,
    /// Distance to the final waypoint that starts approach mode.
    pub destination_threshold: f32,
    /// Destination distance under which no search is run at all.
    pub detection_thickness: f32,
    /// Base radius of grid growth after a failed search (world units).
    pub detection_radius: f32,
    /// Extra growth radius per unit of search-area multiplier.
    pub detection_area_bonus: f32,
    /// Absolute cap on searches per navigation request.
    pub total_search_iterations: u32,
    /// Cap on consecutive searches that return an empty path.
    pub max_consecutive_empty_paths: u32,
    /// Lookahead distance along the path for the steering point.
    pub steering_distance: f32,
    /// Cruise speed (world units per second).
    pub max_speed: f32,
    /// Heading smoothing time constant (s).
    pub turn_smooth_time: f32,
    /// Radius in which other agents push this one away.
    pub avoidance_radius: f32,
    /// Strength of the avoidance push.
    pub avoidance_force: f32,
    /// Rate at which the search-area multiplier decays while moving (1/s).
    pub search_area_decay: f32,
    /// Time without progress after which the agent gives up (s).
    pub max_stuck_time: f32,
    /// Displacement that counts as progress for stuck detection.
    pub stuck_distance: f32,
    /// Time spent in approach mode before the final waypoint completes (s).
    pub approach_duration: f32,
    /// Speed decay factor `K` of approach mode.
    pub approach_deceleration: f32,
    /// Minimum change in destination distance between partial paths.
    pub stuck_on_path_epsilon: f32,
    /// Horizontal length under which the steering direction is degenerate.
    pub overshoot_epsilon: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            waypoint_threshold: 0.4,
            pass_through_threshold: 1.0,
            destination_threshold: 0.75,
            detection_thickness: 0.5,
            detection_radius: 10.0,
            detection_area_bonus: 1.0,
            total_search_iterations: 50,
            max_consecutive_empty_paths: 10,
            steering_distance: 0.4,
            max_speed: 3.0,
            turn_smooth_time: 0.3,
            avoidance_radius: 5.0,
            avoidance_force: 1.0,
            search_area_decay: 5.0,
            max_stuck_time: 0.75,
            stuck_distance: 0.5,
            approach_duration: 0.5,
            approach_deceleration: 6.0,
            stuck_on_path_epsilon: 0.1,
            overshoot_epsilon: 0.05,
        }
    }
}

impl AgentConfig {
    /// Checks that an agent can run with this configuration.
    pub fn validate(&self) -> Result<(), NavigationError> {
        let non_negative = [
            self.waypoint_threshold,
            self.pass_through_threshold,
            self.destination_threshold,
            self.detection_thickness,
            self.detection_radius,
            self.detection_area_bonus,
            self.steering_distance,
            self.avoidance_radius,
            self.avoidance_force,
            self.search_area_decay,
            self.stuck_distance,
            self.approach_duration,
            self.approach_deceleration,
            self.stuck_on_path_epsilon,
            self.overshoot_epsilon,
        ];
        if non_negative.iter().any(|v| !(*v >= 0.0)) {
            return Err(NavigationError::InvalidAgentConfig(
                "Distances, forces and rates must be non-negative",
            ));
        }
        if !(self.max_speed > 0.0) {
            return Err(NavigationError::InvalidAgentConfig("Max speed must be positive"));
        }
        if !(self.turn_smooth_time > 0.0) {
            return Err(NavigationError::InvalidAgentConfig("Turn smooth time must be positive"));
        }
        if !(self.max_stuck_time > 0.0) {
            return Err(NavigationError::InvalidAgentConfig("Max stuck time must be positive"));
        }
        if self.total_search_iterations == 0 {
            return Err(NavigationError::InvalidAgentConfig(
                "Total search iterations must be at least 1",
            ));
        }
        if self.pass_through_threshold < self.waypoint_threshold {
            return Err(NavigationError::InvalidAgentConfig(
                "Pass-through threshold must not be tighter than the waypoint threshold",
            ));
        }
        Ok(())
    }
}

/// Pathfinder scheduling options.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PathfinderConfig {
    /// Run searches on a background worker instead of inline.
    pub run_async: bool,
}

/// All navigation tunables.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NavigationConfig {
    /// Grid layout.
    pub grid: GridConfig,
    /// Agent tunables.
    pub agent: AgentConfig,
    /// Pathfinder options.
    pub pathfinder: PathfinderConfig,
}

impl NavigationConfig {
    /// Validates every section.
    pub fn validate(&self) -> Result<(), NavigationError> {
        self.grid.validate()?;
        self.agent.validate()
    }
}
