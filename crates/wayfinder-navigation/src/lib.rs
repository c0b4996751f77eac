//! Grid navigation for steering agents.
//!
//! - [`grid::SpatialGrid`]: a lazily materialized 2D grid of walkable cells,
//!   classified by probing the terrain below each cell.
//! - [`astar`]: A* over the grid, falling back to a partial path towards the
//!   closest explored cell when the target cannot be reached.
//! - [`pathfinder::Pathfinder`]: runs one search at a time and queues the rest.
//! - [`agent::NavigationAgent`]: follows paths with lookahead steering, local
//!   avoidance and smoothed turning, and reports how each request ended.

#![warn(missing_docs)]

pub mod agent;
/// A* search over the spatial grid.
pub mod astar;
pub mod config;
pub mod error;
pub mod grid;
pub mod heap;
pub mod pathfinder;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};
use wayfinder_common::Vector3;

pub use agent::{AgentPose, AgentState, NavigationAgent, NavigationOutcome};
pub use astar::PathResult;
pub use config::{AgentConfig, GridConfig, NavigationConfig, PathfinderConfig};
pub use error::{NavigationError, NavigationFailure};
pub use grid::SpatialGrid;
pub use pathfinder::{Pathfinder, RequestMode, SharedGrid};

/// Drives `agent` to `destination` at a fixed tick `period`, publishing its
/// pose on `pose_tx` after every tick.
///
/// # Arguments
///
/// * `agent` - The agent to move. Any request it was running is replaced.
/// * `destination` - World position to reach.
/// * `period` - Tick period; also used as the simulation time step.
/// * `pose_tx` - Pose topic. Nothing is sent while it has no subscribers.
///
/// # Returns
///
/// The outcome reported by the agent once the request ends.
pub async fn run_agent_task(
    agent: &mut NavigationAgent,
    destination: Vector3,
    period: Duration,
    pose_tx: broadcast::Sender<Arc<AgentPose>>,
) -> anyhow::Result<NavigationOutcome> {
    info!(id = agent.id(), x = destination.x, z = destination.z, "Agent task started");
    let (outcome_tx, mut outcome_rx) = oneshot::channel();
    agent.navigate_to(destination, move |outcome| {
        let _ = outcome_tx.send(outcome);
    });

    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let dt = period.as_secs_f32();

    loop {
        tokio::select! {
            biased;
            result = &mut outcome_rx => {
                return match result {
                    Ok(outcome) => {
                        info!(id = agent.id(), %outcome, "Agent task finished");
                        Ok(outcome)
                    }
                    Err(_) => Err(anyhow::anyhow!("Navigation request of agent {} was dropped", agent.id())),
                };
            }
            _ = ticker.tick() => {
                agent.tick(dt);
                let pose = agent.pose();
                debug!(id = pose.id, x = pose.position.x, z = pose.position.z, state = ?pose.state, "Agent ticked");
                if pose_tx.receiver_count() > 0 {
                    if let Err(e) = pose_tx.send(Arc::new(pose)) {
                        warn!("Failed to publish agent pose: {}", e);
                    }
                }
            }
        }
    }
}
