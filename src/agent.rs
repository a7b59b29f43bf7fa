use bitflags::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque identifier of a live game entity. Lookups by id may fail at any
/// time once the entity dies or leaves vision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitType(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AbilityId(pub u32);

/// Map position in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Integer grid cell a position falls in. Used as a stable key for
/// anything anchored to a fixed map location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridKey {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Point {
        Point { x, y }
    }

    pub fn distance_squared_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;

        dx * dx + dy * dy
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        self.distance_squared_to(other).sqrt()
    }

    /// Move `distance` from this point toward `target`. A negative distance
    /// moves away from the target.
    pub fn towards(&self, target: Point, distance: f32) -> Point {
        let length = self.distance_to(target);

        if length <= f32::EPSILON {
            return *self;
        }

        let scale = distance / length;

        Point {
            x: self.x + (target.x - self.x) * scale,
            y: self.y + (target.y - self.y) * scale,
        }
    }

    pub fn grid_key(&self) -> GridKey {
        GridKey {
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
        }
    }

    /// Arithmetic mean of a set of points, `None` for an empty set.
    pub fn centroid<I>(points: I) -> Option<Point>
    where
        I: IntoIterator<Item = Point>,
    {
        let (sum_x, sum_y, count) = points
            .into_iter()
            .fold((0.0f32, 0.0f32, 0usize), |(x, y, n), p| (x + p.x, y + p.y, n + 1));

        if count == 0 {
            None
        } else {
            Some(Point::new(sum_x / count as f32, sum_y / count as f32))
        }
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AgentFlags: u32 {
        const UNSET = 0;

        const CARRYING_CARGO = 1u32 << 0;
        const FLYING = 1u32 << 1;
        const STRUCTURE = 1u32 << 2;
        /// Construction finished (structures) or fully spawned (units).
        const READY = 1u32 << 3;
        const CONSTRUCTING = 1u32 << 4;
        const MOVING = 1u32 << 5;
        /// Stationary high value siege unit.
        const HEAVY_SIEGE = 1u32 << 6;
        const WORKER = 1u32 << 7;
        /// Never worth reacting to (larva, eggs, changelings, ...).
        const IGNORED = 1u32 << 8;
        const ILLUSORY = 1u32 << 9;
        const STATIC_DEFENCE = 1u32 << 10;
        /// Currently revealed to the opponent.
        const DETECTED = 1u32 << 11;
    }
}

/// Everything the tactical layer needs to know about one agent this tick.
#[derive(Clone, Debug)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub unit_type: UnitType,
    pub position: Point,
    /// Health fraction in `0.0..=1.0`.
    pub health: f32,
    /// Supply cost, used to weigh groups of units.
    pub supply: f32,
    pub flags: AgentFlags,
    /// Game loop at which each tracked ability becomes usable again.
    pub ability_ready_at: HashMap<AbilityId, u64>,
    pub passengers: Vec<AgentId>,
}

impl AgentSnapshot {
    pub fn new(id: AgentId, unit_type: UnitType, position: Point) -> AgentSnapshot {
        AgentSnapshot {
            id,
            unit_type,
            position,
            health: 1.0,
            supply: 1.0,
            flags: AgentFlags::READY,
            ability_ready_at: HashMap::new(),
            passengers: Vec::new(),
        }
    }

    pub fn has(&self, flags: AgentFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn is_structure(&self) -> bool {
        self.has(AgentFlags::STRUCTURE)
    }

    pub fn has_cargo(&self) -> bool {
        self.has(AgentFlags::CARRYING_CARGO) || !self.passengers.is_empty()
    }

    /// Whether the agent is worth reacting to at all. Illusions and ignored
    /// types never are.
    pub fn is_threat_candidate(&self) -> bool {
        !self.flags.intersects(AgentFlags::IGNORED | AgentFlags::ILLUSORY)
    }

    /// Ticks until `ability` is ready. Untracked abilities are ready now.
    pub fn ability_ready_in(&self, ability: AbilityId, now: u64) -> u64 {
        self.ability_ready_at
            .get(&ability)
            .map(|ready_at| ready_at.saturating_sub(now))
            .unwrap_or(0)
    }

    pub fn ability_ready(&self, ability: AbilityId, now: u64) -> bool {
        self.ability_ready_in(ability, now) == 0
    }
}

/// Anything with a map position.
pub trait HasPosition {
    fn pos(&self) -> Point;
}

impl HasPosition for Point {
    fn pos(&self) -> Point {
        *self
    }
}

impl HasPosition for AgentSnapshot {
    fn pos(&self) -> Point {
        self.position
    }
}

impl<T: HasPosition + ?Sized> HasPosition for &T {
    fn pos(&self) -> Point {
        (**self).pos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_key_is_stable_within_a_cell() {
        assert_eq!(Point::new(10.2, 4.9).grid_key(), Point::new(10.8, 4.1).grid_key());
        assert_ne!(Point::new(10.9, 4.0).grid_key(), Point::new(11.0, 4.0).grid_key());
    }

    #[test]
    fn towards_with_negative_distance_moves_away() {
        let base = Point::new(10.0, 0.0);
        let centre = Point::new(0.0, 0.0);

        let pushed = base.towards(centre, -4.0);

        assert!((pushed.x - 14.0).abs() < 0.001);
        assert!(pushed.y.abs() < 0.001);
    }

    #[test]
    fn centroid_of_empty_set_is_none() {
        assert!(Point::centroid(Vec::new()).is_none());
        assert_eq!(
            Point::centroid(vec![Point::new(0.0, 0.0), Point::new(4.0, 2.0)]),
            Some(Point::new(2.0, 1.0))
        );
    }

    #[test]
    fn ability_readiness_counts_down() {
        let mut agent = AgentSnapshot::new(AgentId(1), UnitType(1), Point::default());
        agent.ability_ready_at.insert(AbilityId(7), 110);

        assert_eq!(agent.ability_ready_in(AbilityId(7), 100), 10);
        assert!(!agent.ability_ready(AbilityId(7), 109));
        assert!(agent.ability_ready(AbilityId(7), 110));
        assert!(agent.ability_ready(AbilityId(8), 0));
    }

    #[test]
    fn illusions_and_ignored_types_are_not_threats() {
        let mut agent = AgentSnapshot::new(AgentId(1), UnitType(1), Point::default());
        agent.flags |= AgentFlags::DETECTED;

        assert!(agent.is_threat_candidate());

        agent.flags |= AgentFlags::ILLUSORY;
        assert!(!agent.is_threat_candidate());

        agent.flags = AgentFlags::IGNORED;
        assert!(!agent.is_threat_candidate());
    }
}
