use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

use wayfinder_navigation::NavigationOutcome;

/// Shared simulation status, written by the simulation thread and read by the monitor.
#[derive(Clone, Debug)]
pub struct State {
    pub ticks: u64,
    pub last_tick_ts: Instant,
    pub agents: usize,
    pub navigating: usize,
    pub arrivals: u32,
    pub failures: u32,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            ticks: 0,
            last_tick_ts: Instant::now(),
            agents: 0,
            navigating: 0,
            arrivals: 0,
            failures: 0,
            faults: Vec::new(),
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

pub fn touch_tick(bb: &Blackboard, agents: usize, navigating: usize) {
    let mut g = bb.write();
    g.ticks += 1;
    g.last_tick_ts = Instant::now();
    g.agents = agents;
    g.navigating = navigating;
}

pub fn record_outcome(bb: &Blackboard, outcome: NavigationOutcome) {
    let mut g = bb.write();
    match outcome {
        NavigationOutcome::Arrived => g.arrivals += 1,
        NavigationOutcome::Failed(_) => g.failures += 1,
    }
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_navigation::NavigationFailure;

    #[test]
    fn test_outcomes_and_faults() {
        let bb: Blackboard = Arc::default();
        record_outcome(&bb, NavigationOutcome::Arrived);
        record_outcome(&bb, NavigationOutcome::Failed(NavigationFailure::Overshoot));
        raise_fault(&bb, "stalled");
        raise_fault(&bb, "stalled");
        touch_tick(&bb, 3, 2);

        let state = snapshot(&bb);
        assert_eq!((state.arrivals, state.failures), (1, 1));
        assert_eq!(state.faults, vec!["stalled".to_string()]);
        assert_eq!((state.ticks, state.agents, state.navigating), (1, 3, 2));
    }
}
