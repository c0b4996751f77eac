mod blackboard;
mod bus;
mod config;

use blackboard::{Blackboard, raise_fault, record_outcome, snapshot, touch_tick};
use bus::Topic;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spin_sleep::SpinSleeper;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wayfinder_common::Vector3;
use wayfinder_navigation::agent::{AgentRegistry, NeighborIndex};
use wayfinder_navigation::{
    AgentPose, AgentState, NavigationAgent, NavigationOutcome, Pathfinder, SharedGrid, SpatialGrid,
    run_agent_task,
};

use crate::config::{LoopConfig, SimulationConfig};

/// A simulated agent and whether it roams once its errand is done.
struct SimAgent {
    agent: NavigationAgent,
    wanders: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let settings = config::load_config(&path)?;
    settings.navigation.validate()?;

    info!("Wayfinder simulation starting. Setting up Tokio runtime and navigation grid...");
    let runtime = tokio::runtime::Runtime::new()?;

    let grid = SpatialGrid::new(settings.navigation.grid.clone(), settings.terrain.clone())?;
    let grid: SharedGrid = Arc::new(Mutex::new(grid));
    let pathfinder = Pathfinder::with_runtime(grid.clone(), &settings.navigation.pathfinder, runtime.handle().clone());
    let registry: Arc<dyn NeighborIndex> = Arc::new(AgentRegistry::new());

    let bb: Blackboard = Arc::default();
    let pose_topic: Topic<AgentPose> = Topic::new(256);
    let pose_rx = pose_topic.subscribe();

    let agents = spawn_agents(&settings, &pathfinder, &registry, &bb)?;

    // A courier driven by its own async task, sharing the pathfinder with the simulation thread
    let courier = NavigationAgent::new(
        settings.navigation.agent.clone(),
        Vector3::new(-2.0, 0.0, -2.0),
        pathfinder.clone(),
        Arc::clone(&registry),
    )?;
    let courier_tx = pose_topic.sender();
    let period = Duration::from_secs_f32(1.0 / settings.simulation.tick_hz);
    runtime.spawn(async move {
        let mut courier = courier;
        match run_agent_task(&mut courier, Vector3::new(-10.0, 0.0, -10.0), period, courier_tx).await {
            Ok(outcome) => info!(id = courier.id(), %outcome, "Courier finished"),
            Err(e) => error!("Courier task failed: {:?}", e),
        }
    });

    info!(agents = agents.len(), "Spawning simulation thread...");
    let simulation = std::thread::Builder::new().name("simulation".into()).spawn({
        let bb = Arc::clone(&bb);
        let loop_config = settings.simulation.clone();
        let scenario = settings.scenario.clone();
        move || simulate(agents, pose_topic, bb, &loop_config, scenario.wander_extent, scenario.seed)
    })?;

    runtime.block_on(monitor(Arc::clone(&bb), pose_rx, settings.simulation.clone()))?;

    if simulation.join().is_err() {
        error!("Simulation thread panicked");
    }
    let state = snapshot(&bb);
    info!(
        ticks = state.ticks,
        arrivals = state.arrivals,
        failures = state.failures,
        cells = grid.lock().len(),
        "Simulation finished"
    );
    for fault in &state.faults {
        warn!(fault = %fault, "Fault raised during simulation");
    }
    Ok(())
}

fn spawn_agents(
    settings: &SimulationConfig,
    pathfinder: &Pathfinder,
    registry: &Arc<dyn NeighborIndex>,
    bb: &Blackboard,
) -> anyhow::Result<Vec<SimAgent>> {
    let mut rng = StdRng::seed_from_u64(settings.scenario.seed);
    let extent = settings.scenario.wander_extent;
    let mut agents = Vec::new();

    for spawn in &settings.scenario.agents {
        let start = Vector3::new(spawn.start[0], 0.0, spawn.start[1]);
        let mut agent = NavigationAgent::new(
            settings.navigation.agent.clone(),
            start,
            pathfinder.clone(),
            Arc::clone(registry),
        )?;
        let destination = Vector3::new(spawn.destination[0], 0.0, spawn.destination[1]);
        send(&mut agent, destination, bb);
        agents.push(SimAgent { agent, wanders: false });
    }

    for _ in 0..settings.scenario.wanderers {
        let start = random_point(&mut rng, extent);
        let agent = NavigationAgent::new(
            settings.navigation.agent.clone(),
            start,
            pathfinder.clone(),
            Arc::clone(registry),
        )?;
        agents.push(SimAgent { agent, wanders: true });
    }
    Ok(agents)
}

fn random_point(rng: &mut StdRng, extent: f32) -> Vector3 {
    Vector3::new(rng.random_range(-extent..=extent), 0.0, rng.random_range(-extent..=extent))
}

fn send(agent: &mut NavigationAgent, destination: Vector3, bb: &Blackboard) {
    let bb = Arc::clone(bb);
    let id = agent.id();
    info!(id, x = destination.x, z = destination.z, "Dispatching agent");
    agent.navigate_to(destination, move |outcome| {
        record_outcome(&bb, outcome);
        if let NavigationOutcome::Failed(failure) = outcome {
            warn!(id, %failure, "Agent gave up");
        }
    });
}

/// Fixed-step simulation loop.
fn simulate(
    mut agents: Vec<SimAgent>,
    pose_topic: Topic<AgentPose>,
    bb: Blackboard,
    config: &LoopConfig,
    wander_extent: f32,
    seed: u64,
) {
    info!("Simulation thread started.");
    let sleeper = SpinSleeper::new(1_000);
    let dt = 1.0 / config.tick_hz;
    let period = Duration::from_secs_f32(dt);
    let total_ticks = (config.duration_secs * config.tick_hz).ceil() as u64;
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));

    for tick in 0..total_ticks {
        let started = Instant::now();
        for sim in agents.iter_mut() {
            if sim.wanders && !sim.agent.is_navigating() {
                let destination = random_point(&mut rng, wander_extent);
                send(&mut sim.agent, destination, &bb);
            }
            sim.agent.tick(dt);
        }

        if tick % config.publish_every.max(1) == 0 {
            for sim in &agents {
                pose_topic.publish(sim.agent.pose());
            }
        }
        let navigating = agents.iter().filter(|s| s.agent.state() != AgentState::Idle).count();
        touch_tick(&bb, agents.len(), navigating);

        let elapsed = started.elapsed();
        if elapsed < period {
            sleeper.sleep(period - elapsed);
        } else {
            warn!(?elapsed, "Simulation tick overran its period");
        }
    }
    info!(ticks = total_ticks, "Simulation thread finished.");
}

/// Follows published poses, reports progress and watches for a stalled simulation.
///
/// Returns once every pose publisher is gone.
async fn monitor(
    bb: Blackboard,
    mut pose_rx: broadcast::Receiver<Arc<AgentPose>>,
    config: LoopConfig,
) -> anyhow::Result<()> {
    info!("Monitor task started.");
    let mut report = tokio::time::interval(Duration::from_millis(config.report_interval_ms));
    let stall_timeout = Duration::from_millis(config.stall_timeout_ms);
    let mut poses: HashMap<u64, Arc<AgentPose>> = HashMap::new();

    loop {
        tokio::select! {
            _ = report.tick() => {
                let state = snapshot(&bb);
                let age = Instant::now() - state.last_tick_ts;
                if state.ticks > 0 && age > stall_timeout {
                    warn!(?age, "Simulation stalled!");
                    raise_fault(&bb, "simulation stalled");
                }
                info!(
                    ticks = state.ticks,
                    agents = state.agents,
                    navigating = state.navigating,
                    arrivals = state.arrivals,
                    failures = state.failures,
                    "Simulation status"
                );
                for pose in poses.values() {
                    tracing::debug!(
                        id = pose.id,
                        x = pose.position.x,
                        z = pose.position.z,
                        yaw = pose.yaw.to_degrees(),
                        state = ?pose.state,
                        "Agent pose"
                    );
                }
            }
            result = pose_rx.recv() => {
                match result {
                    Ok(pose) => {
                        poses.insert(pose.id, pose);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Pose receiver lagged by {} messages in monitor.", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(agents_seen = poses.len(), "Pose topic closed, monitor stopping.");
                        return Ok(());
                    }
                }
            }
        }
    }
}
