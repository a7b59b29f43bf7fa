use crate::agent::*;
use crate::world::*;
use std::collections::{BTreeMap, HashSet};

/// Scriptable in-memory world for driving the tactical layer tick by tick.
pub struct TestWorld {
    pub tick: u64,
    agents: BTreeMap<AgentId, AgentSnapshot>,
    hostile: HashSet<AgentId>,
    pub outcome: Option<EngagementResult>,
    pub safe: Option<bool>,
    pub unsafe_points: Vec<Point>,
    pub pathable: Option<bool>,
    pub safe_spot: Option<Point>,
    /// Placement answer; `None` places at the requested area.
    pub placement: Option<Point>,
    pub can_build: bool,
}

impl TestWorld {
    pub fn new() -> TestWorld {
        TestWorld {
            tick: 0,
            agents: BTreeMap::new(),
            hostile: HashSet::new(),
            outcome: Some(EngagementResult::Tie),
            safe: Some(true),
            unsafe_points: Vec::new(),
            pathable: Some(true),
            safe_spot: None,
            placement: None,
            can_build: true,
        }
    }

    pub fn add_friendly(&mut self, id: AgentId, unit_type: UnitType, position: Point) -> &mut AgentSnapshot {
        self.hostile.remove(&id);
        self.agents.insert(id, AgentSnapshot::new(id, unit_type, position));
        self.agents.get_mut(&id).unwrap()
    }

    pub fn add_hostile(&mut self, id: AgentId, unit_type: UnitType, position: Point) -> &mut AgentSnapshot {
        self.hostile.insert(id);
        self.agents.insert(id, AgentSnapshot::new(id, unit_type, position));
        self.agents.get_mut(&id).unwrap()
    }

    pub fn remove(&mut self, id: AgentId) {
        self.agents.remove(&id);
        self.hostile.remove(&id);
    }

    pub fn agent_mut(&mut self, id: AgentId) -> &mut AgentSnapshot {
        self.agents.get_mut(&id).unwrap()
    }

    pub fn advance(&mut self, loops: u64) {
        self.tick += loops;
    }
}

impl WorldView for TestWorld {
    fn game_loop(&self) -> u64 {
        self.tick
    }

    fn agent(&self, id: AgentId) -> Option<&AgentSnapshot> {
        self.agents.get(&id)
    }

    fn agents_in_range(&self, origin: Point, radius: f32, filter: QueryFilter) -> Vec<&AgentSnapshot> {
        self.agents
            .values()
            .filter(|agent| filter.accepts(self.hostile.contains(&agent.id), agent.has(AgentFlags::FLYING)))
            .filter(|agent| agent.position.distance_to(origin) <= radius)
            .collect()
    }

    fn classify_engagement(&self, _own: &[&AgentSnapshot], _hostile: &[&AgentSnapshot]) -> Option<EngagementResult> {
        self.outcome
    }

    fn is_position_safe(&self, _grid: GridKind, position: Point) -> Option<bool> {
        if self.unsafe_points.iter().any(|p| p.distance_to(position) < 0.5) {
            Some(false)
        } else {
            self.safe
        }
    }

    fn in_pathing_grid(&self, _grid: GridKind, _position: Point) -> Option<bool> {
        self.pathable
    }

    fn closest_safe_spot(&self, _grid: GridKind, _from: Point, _radius: f32) -> Option<Point> {
        self.safe_spot
    }

    fn request_building_placement(&self, area: Point, _structure: UnitType) -> Option<Point> {
        Some(self.placement.unwrap_or(area))
    }

    fn can_start_structure(&self, _structure: UnitType) -> bool {
        self.can_build
    }
}
