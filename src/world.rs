use crate::agent::*;
use bitflags::*;
use serde::{Deserialize, Serialize};

/// Predicted result of a fight between two agent sets, ordered from the
/// worst possible loss to the most emphatic victory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EngagementResult {
    LossEmphatic,
    LossOverwhelming,
    LossDecisive,
    LossClose,
    LossMarginal,
    Tie,
    VictoryMarginal,
    VictoryClose,
    VictoryDecisive,
    VictoryOverwhelming,
    VictoryEmphatic,
}

impl EngagementResult {
    pub fn is_loss_marginal_or_worse(self) -> bool {
        self <= EngagementResult::LossMarginal
    }

    pub fn is_victory_close_or_better(self) -> bool {
        self >= EngagementResult::VictoryClose
    }
}

/// Influence grids maintained by the sensing layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridKind {
    Ground,
    Air,
    Climber,
    GroundAvoidance,
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct QueryFilter: u8 {
        const UNSET = 0;

        const ENEMY = 1u8 << 0;
        const FRIENDLY = 1u8 << 1;
        const GROUND = 1u8 << 2;
        const FLYING = 1u8 << 3;

        const ALL_ENEMY = Self::ENEMY.bits() | Self::GROUND.bits() | Self::FLYING.bits();
        const ENEMY_GROUND = Self::ENEMY.bits() | Self::GROUND.bits();
        const ENEMY_FLYING = Self::ENEMY.bits() | Self::FLYING.bits();
        const ALL_FRIENDLY = Self::FRIENDLY.bits() | Self::GROUND.bits() | Self::FLYING.bits();
    }
}

impl QueryFilter {
    /// Whether an agent of the given allegiance and mobility passes this filter.
    pub fn accepts(&self, hostile: bool, flying: bool) -> bool {
        let side = if hostile { QueryFilter::ENEMY } else { QueryFilter::FRIENDLY };
        let layer = if flying { QueryFilter::FLYING } else { QueryFilter::GROUND };

        self.contains(side) && self.contains(layer)
    }
}

/// Read-only view of the world for the current tick, provided by the
/// sensing layer. Nothing returned here may be kept past the tick.
///
/// Queries that can be unavailable return `Option`; `None` means "no
/// information" and callers fall back to the conservative answer.
pub trait WorldView {
    fn game_loop(&self) -> u64;

    /// Resolve a live agent. Agents carried as cargo still resolve.
    fn agent(&self, id: AgentId) -> Option<&AgentSnapshot>;

    fn agents_in_range(&self, origin: Point, radius: f32, filter: QueryFilter) -> Vec<&AgentSnapshot>;

    fn classify_engagement(&self, own: &[&AgentSnapshot], hostile: &[&AgentSnapshot]) -> Option<EngagementResult>;

    fn is_position_safe(&self, grid: GridKind, position: Point) -> Option<bool>;

    fn in_pathing_grid(&self, grid: GridKind, position: Point) -> Option<bool>;

    fn closest_safe_spot(&self, grid: GridKind, from: Point, radius: f32) -> Option<Point>;

    fn request_building_placement(&self, area: Point, structure: UnitType) -> Option<Point>;

    /// Resources and tech requirements allow starting `structure` now.
    fn can_start_structure(&self, structure: UnitType) -> bool;
}

/// Convenience lookups layered over `WorldView`.
pub trait WorldViewExt: WorldView {
    /// Hostiles near `origin` that are worth reacting to.
    fn threats_in_range(&self, origin: Point, radius: f32, filter: QueryFilter) -> Vec<&AgentSnapshot> {
        self.agents_in_range(origin, radius, filter)
            .into_iter()
            .filter(|agent| agent.is_threat_candidate())
            .collect()
    }

    /// Conservative safety: unknown counts as unsafe.
    fn is_safe(&self, grid: GridKind, position: Point) -> bool {
        self.is_position_safe(grid, position).unwrap_or(false)
    }

    /// Conservative pathability: unknown counts as blocked.
    fn is_pathable(&self, grid: GridKind, position: Point) -> bool {
        self.in_pathing_grid(grid, position).unwrap_or(false)
    }

    /// Own structure occupying the site around `position`, if any.
    fn own_structure_at(&self, position: Point, site_radius: f32) -> Option<&AgentSnapshot> {
        self.agents_in_range(position, site_radius, QueryFilter::ALL_FRIENDLY)
            .into_iter()
            .filter(|agent| agent.is_structure())
            .filter(|agent| agent.position.distance_squared_to(position) < site_radius * site_radius)
            .min_by(|a, b| {
                a.position
                    .distance_squared_to(position)
                    .partial_cmp(&b.position.distance_squared_to(position))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

impl<T: WorldView + ?Sized> WorldViewExt for T {}
