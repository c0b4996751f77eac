use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use wayfinder_common::Vector3;

/// Identifier of an agent within a [`NeighborIndex`].
pub type AgentId = u64;

/// Spatial index answering "which agents are near this point".
///
/// Agents register once, publish their position every tick, and query the
/// index for avoidance.
pub trait NeighborIndex: Send + Sync {
    /// Adds an agent and returns its identifier.
    fn register(&self, position: Vector3) -> AgentId;

    /// Records the latest position of an agent.
    fn update(&self, id: AgentId, position: Vector3);

    /// Forgets an agent.
    fn remove(&self, id: AgentId);

    /// Positions of every agent other than `exclude` within `radius` of `center`.
    fn neighbors_within(&self, center: &Vector3, radius: f32, exclude: AgentId) -> Vec<Vector3>;
}

/// A [`NeighborIndex`] backed by a map scanned on every query.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    positions: RwLock<HashMap<AgentId, Vector3>>,
    next_id: AtomicU64,
}

impl AgentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    /// Returns true when no agent is registered.
    pub fn is_empty(&self) -> bool {
        self.positions.read().is_empty()
    }

    /// Last known position of an agent.
    pub fn position(&self, id: AgentId) -> Option<Vector3> {
        self.positions.read().get(&id).copied()
    }
}

impl NeighborIndex for AgentRegistry {
    fn register(&self, position: Vector3) -> AgentId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.positions.write().insert(id, position);
        id
    }

    fn update(&self, id: AgentId, position: Vector3) {
        self.positions.write().insert(id, position);
    }

    fn remove(&self, id: AgentId) {
        self.positions.write().remove(&id);
    }

    fn neighbors_within(&self, center: &Vector3, radius: f32, exclude: AgentId) -> Vec<Vector3> {
        let radius_sq = radius * radius;
        self.positions
            .read()
            .iter()
            .filter(|(id, p)| **id != exclude && (*p - center).norm_squared() <= radius_sq)
            .map(|(_, p)| *p)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_query() {
        let registry = AgentRegistry::new();
        let a = registry.register(Vector3::zeros());
        let b = registry.register(Vector3::new(3.0, 0.0, 0.0));
        let c = registry.register(Vector3::new(10.0, 0.0, 0.0));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 3);

        let near_a = registry.neighbors_within(&Vector3::zeros(), 5.0, a);
        assert_eq!(near_a, vec![Vector3::new(3.0, 0.0, 0.0)]);

        registry.update(c, Vector3::new(0.0, 0.0, 4.0));
        assert_eq!(registry.neighbors_within(&Vector3::zeros(), 5.0, a).len(), 2);

        registry.remove(b);
        assert_eq!(registry.position(b), None);
        assert_eq!(registry.neighbors_within(&Vector3::zeros(), 5.0, a).len(), 1);
    }
}
