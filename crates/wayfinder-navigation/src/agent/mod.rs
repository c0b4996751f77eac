//! Per-agent navigation controller.
//!
//! A [`NavigationAgent`] turns a destination into motion. It plans with the
//! shared [`Pathfinder`], walks the returned waypoints with lookahead steering,
//! local avoidance and smoothed heading, and grows the grid and plans again
//! whenever it only got a partial path. Every request ends with exactly one
//! call to its arrival callback, unless it is stopped first.
//!
//! The agent is driven by [`NavigationAgent::tick`], once per simulation frame.

/// Neighbor lookup for local avoidance.
pub mod registry;
pub mod steering;

use std::fmt;
use std::mem;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wayfinder_common::{UnitQuaternion, Vector3, WorldPointExt};
use wayfinder_kinematics::{ApproachProfile, TurnSmoother, horizontal_magnitude, yaw_towards};

use crate::astar::PathResult;
use crate::config::AgentConfig;
use crate::error::{NavigationError, NavigationFailure};
use crate::pathfinder::{Pathfinder, SharedGrid};

pub use registry::{AgentId, AgentRegistry, NeighborIndex};

/// How a navigation request ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavigationOutcome {
    /// The agent reached its destination.
    Arrived,
    /// The request was abandoned.
    Failed(NavigationFailure),
}

impl NavigationOutcome {
    /// Returns true for [`NavigationOutcome::Arrived`].
    pub fn arrived(&self) -> bool {
        matches!(self, NavigationOutcome::Arrived)
    }
}

impl fmt::Display for NavigationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationOutcome::Arrived => write!(f, "arrived"),
            NavigationOutcome::Failed(failure) => write!(f, "failed: {}", failure),
        }
    }
}

/// Callback receiving the outcome of a navigation request.
pub type ArrivalCallback = Box<dyn FnOnce(NavigationOutcome) + Send + 'static>;

/// Coarse state of an agent, for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Not navigating.
    Idle,
    /// Waiting for a path.
    Planning,
    /// Walking a path.
    Following,
}

/// Snapshot of an agent published to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentPose {
    /// Agent identifier.
    pub id: AgentId,
    /// World position.
    pub position: Vector3,
    /// Facing.
    pub rotation: UnitQuaternion<f32>,
    /// Heading in radians, from +z towards +x.
    pub yaw: f32,
    /// Navigation state.
    pub state: AgentState,
}

/// Navigation state owned by one `navigate_to` call.
struct NavigationRequest {
    destination: Vector3,
    callback: Option<ArrivalCallback>,
    search_multiplier: f32,
    total_iterations: u32,
    consecutive_empty: u32,
    last_partial_distance: Option<f32>,
}

struct FollowState {
    waypoints: Vec<Vector3>,
    index: usize,
    complete: bool,
    direction: Vector3,
    steering_point: Vector3,
    approach_timer: Option<f32>,
    stuck_timer: f32,
    last_check: Vector3,
}

enum Phase {
    Idle,
    Planning,
    Following(FollowState),
}

enum PlanStep {
    /// Plan again right away.
    Retry,
    /// A result is pending, or the request moved on to following or ended.
    Settled,
}

enum FollowStep {
    Moving,
    EndOfPath,
    Abort(NavigationFailure),
}

/// A steering agent navigating the shared grid.
pub struct NavigationAgent {
    id: AgentId,
    config: AgentConfig,
    grid: SharedGrid,
    pathfinder: Pathfinder,
    neighbors: Arc<dyn NeighborIndex>,
    position: Vector3,
    rotation: UnitQuaternion<f32>,
    smoother: TurnSmoother,
    approach: ApproachProfile,
    generation: u64,
    path_tx: mpsc::UnboundedSender<(u64, PathResult)>,
    path_rx: mpsc::UnboundedReceiver<(u64, PathResult)>,
    phase: Phase,
    request: Option<NavigationRequest>,
    last_outcome: Option<NavigationOutcome>,
}

impl NavigationAgent {
    /// Creates an agent standing at `position` and registers it with `neighbors`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(
        config: AgentConfig,
        position: Vector3,
        pathfinder: Pathfinder,
        neighbors: Arc<dyn NeighborIndex>,
    ) -> Result<Self, NavigationError> {
        config.validate()?;
        let smoother = TurnSmoother::new(config.turn_smooth_time)?;
        let approach = ApproachProfile::new(config.max_speed, config.approach_deceleration)?;
        let id = neighbors.register(position);
        let (path_tx, path_rx) = mpsc::unbounded_channel();
        debug!(id, x = position.x, z = position.z, "Agent created");
        Ok(NavigationAgent {
            id,
            config,
            grid: Arc::clone(pathfinder.grid()),
            pathfinder,
            neighbors,
            position,
            rotation: UnitQuaternion::identity(),
            smoother,
            approach,
            generation: 0,
            path_tx,
            path_rx,
            phase: Phase::Idle,
            request: None,
            last_outcome: None,
        })
    }

    /// Identifier within the neighbor index.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Agent tunables.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Current world position.
    pub fn position(&self) -> Vector3 {
        self.position
    }

    /// Moves the agent without navigating, e.g. to respawn it.
    pub fn set_position(&mut self, position: Vector3) {
        self.position = position;
        self.neighbors.update(self.id, position);
    }

    /// Current facing.
    pub fn rotation(&self) -> UnitQuaternion<f32> {
        self.rotation
    }

    /// Destination of the active request.
    pub fn destination(&self) -> Option<Vector3> {
        self.request.as_ref().map(|r| r.destination)
    }

    /// Current search-area multiplier of the active request.
    pub fn search_multiplier(&self) -> Option<f32> {
        self.request.as_ref().map(|r| r.search_multiplier)
    }

    /// Number of searches issued for the active request.
    pub fn search_iterations(&self) -> Option<u32> {
        self.request.as_ref().map(|r| r.total_iterations)
    }

    /// Outcome of the last request that ran to completion.
    pub fn last_outcome(&self) -> Option<NavigationOutcome> {
        self.last_outcome
    }

    /// Current waypoint list, while following.
    pub fn waypoints(&self) -> Option<&[Vector3]> {
        match &self.phase {
            Phase::Following(follow) => Some(&follow.waypoints),
            _ => None,
        }
    }

    /// Returns true while decelerating towards the final waypoint.
    pub fn is_approaching(&self) -> bool {
        matches!(&self.phase, Phase::Following(follow) if follow.approach_timer.is_some())
    }

    /// Smoothed movement direction, while following.
    pub fn direction(&self) -> Option<Vector3> {
        match &self.phase {
            Phase::Following(follow) => Some(follow.direction),
            _ => None,
        }
    }

    /// Coarse navigation state.
    pub fn state(&self) -> AgentState {
        match self.phase {
            Phase::Idle => AgentState::Idle,
            Phase::Planning => AgentState::Planning,
            Phase::Following(_) => AgentState::Following,
        }
    }

    /// Returns true while a request is active.
    pub fn is_navigating(&self) -> bool {
        self.request.is_some()
    }

    /// Snapshot for observers.
    pub fn pose(&self) -> AgentPose {
        let forward = self.rotation * Vector3::z();
        AgentPose {
            id: self.id,
            position: self.position,
            rotation: self.rotation,
            yaw: yaw_towards(forward.x, forward.z).unwrap_or(0.0),
            state: self.state(),
        }
    }

    /// Starts navigating to `destination`.
    ///
    /// Any active request is stopped first, without calling its callback. If
    /// the destination lies outside the grid, or its cell is known to be
    /// unwalkable, `on_arrived` is called right away with
    /// [`NavigationFailure::DestinationOutOfBounds`] or
    /// [`NavigationFailure::DestinationUnwalkable`] and nothing is searched.
    pub fn navigate_to<F>(&mut self, destination: Vector3, on_arrived: F)
    where
        F: FnOnce(NavigationOutcome) + Send + 'static,
    {
        self.stop_navigation();

        let rejected = {
            let grid = self.grid.lock();
            if !grid.contains_position(&destination) {
                Some(NavigationFailure::DestinationOutOfBounds)
            } else if grid.cell_at(&destination).is_some_and(|cell| !cell.is_walkable()) {
                Some(NavigationFailure::DestinationUnwalkable)
            } else {
                None
            }
        };

        self.request = Some(NavigationRequest {
            destination,
            callback: Some(Box::new(on_arrived)),
            search_multiplier: 0.0,
            total_iterations: 0,
            consecutive_empty: 0,
            last_partial_distance: None,
        });

        if let Some(failure) = rejected {
            self.finish(NavigationOutcome::Failed(failure));
            return;
        }

        info!(
            id = self.id,
            x = destination.x,
            z = destination.z,
            generation = self.generation,
            "Navigation started"
        );
        self.plan();
    }

    /// Cancels the active request.
    ///
    /// The arrival callback is dropped without being called, and any path
    /// result still in flight for the request will be ignored. Calling this
    /// while idle does nothing.
    pub fn stop_navigation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.request.take().is_some() {
            debug!(id = self.id, "Navigation stopped");
        }
        self.phase = Phase::Idle;
    }

    /// Advances the agent by `dt` seconds: collects path results, then moves
    /// one step along the current path.
    pub fn tick(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        if let Phase::Planning = self.phase {
            if let Some(result) = self.take_path_result() {
                if let PlanStep::Retry = self.handle_path(result) {
                    self.plan();
                }
            }
        }
        if let Phase::Following(_) = self.phase {
            self.follow(dt);
        }
        self.neighbors.update(self.id, self.position);
    }

    fn plan(&mut self) {
        while let PlanStep::Retry = self.plan_step() {}
    }

    fn plan_step(&mut self) -> PlanStep {
        let Some(request) = self.request.as_mut() else {
            return PlanStep::Settled;
        };

        if request.total_iterations >= self.config.total_search_iterations {
            let limit = self.config.total_search_iterations;
            self.finish(NavigationOutcome::Failed(NavigationFailure::IterationLimit(limit)));
            return PlanStep::Settled;
        }
        request.total_iterations += 1;
        let destination = request.destination;

        let snapped = {
            let grid = self.grid.lock();
            grid.grid_to_world(grid.world_to_grid(&destination))
        };
        if self.position.horizontal_distance(&snapped) <= self.config.detection_thickness {
            debug!(id = self.id, "Destination within detection thickness, skipping search");
            self.start_following(vec![destination], true);
            return PlanStep::Settled;
        }

        self.phase = Phase::Planning;
        let generation = self.generation;
        let tx = self.path_tx.clone();
        self.pathfinder.find_path(self.position, destination, move |result| {
            // The agent may be gone by the time the result arrives
            let _ = tx.send((generation, result));
        });

        match self.take_path_result() {
            Some(result) => self.handle_path(result),
            None => PlanStep::Settled,
        }
    }

    /// Next path result issued under the current generation, discarding stale ones.
    fn take_path_result(&mut self) -> Option<PathResult> {
        while let Ok((generation, result)) = self.path_rx.try_recv() {
            if generation == self.generation {
                return Some(result);
            }
            debug!(id = self.id, generation, current = self.generation, "Discarding stale path");
        }
        None
    }

    fn handle_path(&mut self, result: PathResult) -> PlanStep {
        let Some(request) = self.request.as_mut() else {
            return PlanStep::Settled;
        };
        let destination = request.destination;
        let mut waypoints = result.waypoints();

        let Some(last) = waypoints.last() else {
            if self.position.horizontal_distance(&destination) <= self.config.waypoint_threshold {
                self.finish(NavigationOutcome::Arrived);
                return PlanStep::Settled;
            }
            request.consecutive_empty += 1;
            if request.consecutive_empty > self.config.max_consecutive_empty_paths {
                let attempts = request.consecutive_empty;
                self.finish(NavigationOutcome::Failed(NavigationFailure::NoPathFound(attempts)));
                return PlanStep::Settled;
            }
            debug!(
                id = self.id,
                attempts = request.consecutive_empty,
                "Empty path, growing search area"
            );
            self.expand_search_area();
            return PlanStep::Retry;
        };

        if last.horizontal_distance(&destination) <= self.config.waypoint_threshold {
            waypoints.push(destination);
        }
        request.consecutive_empty = 0;
        if result.is_complete {
            request.search_multiplier = 0.0;
        }
        debug!(
            id = self.id,
            complete = result.is_complete,
            waypoints = waypoints.len(),
            "Following path"
        );
        self.start_following(waypoints, result.is_complete);
        PlanStep::Settled
    }

    /// Materializes the grid around the agent and widens the next growth step.
    fn expand_search_area(&mut self) {
        let Some(request) = self.request.as_mut() else {
            return;
        };
        let radius =
            self.config.detection_radius + self.config.detection_area_bonus * request.search_multiplier;
        request.search_multiplier += 1.0;
        let created = self.grid.lock().materialize_range(&self.position, radius);
        debug!(id = self.id, radius, created, "Search area expanded");
    }

    fn start_following(&mut self, waypoints: Vec<Vector3>, complete: bool) {
        let steering_point = steering::lookahead_point(&self.position, &waypoints, self.config.steering_distance);
        let facing = (self.rotation * Vector3::z()).flattened();
        let direction = steering::desired_direction(&self.position, &steering_point, &Vector3::zeros());
        let direction = if direction == Vector3::zeros() { facing } else { direction };

        self.smoother.reset();
        self.phase = Phase::Following(FollowState {
            waypoints,
            index: 0,
            complete,
            direction,
            steering_point,
            approach_timer: None,
            stuck_timer: 0.0,
            last_check: self.position,
        });
    }

    fn follow(&mut self, dt: f32) {
        let Phase::Following(mut follow) = mem::replace(&mut self.phase, Phase::Idle) else {
            return;
        };
        let Some(destination) = self.destination() else {
            return;
        };
        match self.steer(&mut follow, destination, dt) {
            FollowStep::Moving => self.phase = Phase::Following(follow),
            // A complete path may end on a cell center short of the destination itself
            FollowStep::EndOfPath
                if follow.complete
                    && self.position.horizontal_distance(&destination) <= self.config.destination_threshold =>
            {
                self.finish(NavigationOutcome::Arrived)
            }
            FollowStep::EndOfPath => self.replan_from_path_end(),
            FollowStep::Abort(failure) => self.finish(NavigationOutcome::Failed(failure)),
        }
    }

    fn steer(&mut self, follow: &mut FollowState, destination: Vector3, dt: f32) -> FollowStep {
        let config = &self.config;
        let last_index = follow.waypoints.len().saturating_sub(1);

        // Cut corners while far from the destination, be precise near it
        let threshold = if self.position.horizontal_distance(&destination) > config.destination_threshold {
            config.pass_through_threshold
        } else {
            config.waypoint_threshold
        };
        while follow.index < last_index
            && self.position.horizontal_distance(&follow.waypoints[follow.index]) <= threshold
        {
            follow.index += 1;
        }
        let Some(&final_waypoint) = follow.waypoints.last() else {
            return FollowStep::EndOfPath;
        };

        if follow.index == last_index
            && follow.approach_timer.is_none()
            && self.position.horizontal_distance(&final_waypoint) <= config.destination_threshold
        {
            debug!(id = self.id, "Approaching destination");
            follow.approach_timer = Some(0.0);
        }

        if let Some(timer) = follow.approach_timer {
            if timer > config.approach_duration {
                return FollowStep::EndOfPath;
            }
            let to_final = (final_waypoint - self.position).flattened();
            if to_final.dot(&follow.direction) <= 0.0 {
                if to_final.norm() <= config.waypoint_threshold {
                    return FollowStep::EndOfPath;
                }
                debug!(id = self.id, "Passed beside the final waypoint, turning back");
                follow.approach_timer = None;
            }
        }

        let others = self
            .neighbors
            .neighbors_within(&self.position, config.avoidance_radius, self.id);
        let avoidance = steering::avoidance_vector(&self.position, &others, config.avoidance_force);
        // While approaching, the heading stays frozen and only the avoidance push bends it
        let (desired, steering_point) = if follow.approach_timer.is_some() {
            (steering::bend_direction(&follow.direction, &avoidance), follow.steering_point)
        } else {
            let steering_point = steering::lookahead_point(
                &self.position,
                &follow.waypoints[follow.index..],
                config.steering_distance,
            );
            (
                steering::desired_direction(&self.position, &steering_point, &avoidance),
                steering_point,
            )
        };

        let smoothed = match self.smoother.step(follow.direction.into(), desired.into(), dt) {
            Ok(v) => v,
            Err(e) => {
                warn!(id = self.id, error = %e, "Turn smoothing failed, using raw direction");
                desired.into()
            }
        };
        if horizontal_magnitude(smoothed) <= config.overshoot_epsilon {
            warn!(id = self.id, "Steering direction collapsed, overshoot");
            return FollowStep::Abort(NavigationFailure::Overshoot);
        }
        follow.direction = Vector3::from(smoothed);
        follow.steering_point = steering_point;

        let speed = self.approach.speed(follow.approach_timer);
        self.position += follow.direction.flattened() * speed * dt;
        if let Some(look) = (follow.steering_point - self.position).flattened().try_normalize(1e-6) {
            self.rotation = UnitQuaternion::face_towards(&look, &Vector3::y());
        }
        if let Some(timer) = follow.approach_timer.as_mut() {
            *timer += dt;
        }
        if let Some(request) = self.request.as_mut() {
            request.search_multiplier = (request.search_multiplier - dt * config.search_area_decay).max(0.0);
        }

        if self.position.horizontal_distance(&follow.last_check) > config.stuck_distance {
            follow.last_check = self.position;
            follow.stuck_timer = 0.0;
        } else {
            follow.stuck_timer += dt;
            if follow.stuck_timer > config.max_stuck_time {
                warn!(id = self.id, stuck_for = follow.stuck_timer, "Agent stuck");
                return FollowStep::Abort(NavigationFailure::Stuck(follow.stuck_timer));
            }
        }
        FollowStep::Moving
    }

    /// Handles the end of a path that left the agent short of its destination.
    fn replan_from_path_end(&mut self) {
        let Some(request) = self.request.as_mut() else {
            return;
        };
        let distance = self.position.horizontal_distance(&request.destination);
        if distance <= self.config.waypoint_threshold {
            self.finish(NavigationOutcome::Arrived);
            return;
        }
        if let Some(previous) = request.last_partial_distance {
            if (previous - distance).abs() <= self.config.stuck_on_path_epsilon {
                warn!(id = self.id, distance, "No progress between partial paths");
                self.finish(NavigationOutcome::Failed(NavigationFailure::StuckOnPath));
                return;
            }
        }
        request.last_partial_distance = Some(distance);
        debug!(id = self.id, distance, "Path ended short of destination, replanning");
        self.expand_search_area();
        self.plan();
    }

    fn finish(&mut self, outcome: NavigationOutcome) {
        self.phase = Phase::Idle;
        match outcome {
            NavigationOutcome::Arrived => info!(id = self.id, "Arrived at destination"),
            NavigationOutcome::Failed(failure) => warn!(id = self.id, %failure, "Navigation failed"),
        }
        self.last_outcome = Some(outcome);
        if let Some(callback) = self.request.take().and_then(|r| r.callback) {
            callback(outcome);
        }
    }
}

impl Drop for NavigationAgent {
    fn drop(&mut self) {
        self.neighbors.remove(self.id);
    }
}

impl fmt::Debug for NavigationAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationAgent")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("state", &self.state())
            .field("generation", &self.generation)
            .finish()
    }
}
