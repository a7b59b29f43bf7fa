use crate::agent::*;
use crate::world::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// High-level intent for one agent. The command layer turns these into
/// concrete orders; nothing here is executed by this crate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Directive {
    /// Stay out of danger on the given influence grid.
    KeepSafe { grid: GridKind },
    /// Path toward a point on a grid, stopping within `success_distance`.
    PathTo { target: Point, grid: GridKind, success_distance: f32 },
    /// Move without stopping to fight.
    MoveTo { target: Point },
    /// Move, fighting anything met on the way.
    AttackMove { target: Point },
    /// Attack a specific agent.
    Attack { target: AgentId },
    /// Shoot whatever valid target is already in range.
    ShootInRange,
    UseAbility { ability: AbilityId, target: Option<Point> },
    /// Load the given agent.
    PickUp { cargo: AgentId },
    /// Unload all cargo at a point.
    DropCargo { at: Point },
    Build { structure_type: UnitType, at: Point },
    /// Resume construction on an existing, unfinished structure.
    ResumeConstruction { structure: AgentId },
    Halt,
}

/// Ordered directive bundles per agent for one tick.
#[derive(Clone, Debug, Default)]
pub struct DirectiveQueue {
    bundles: BTreeMap<AgentId, Vec<Directive>>,
}

impl DirectiveQueue {
    pub fn new() -> DirectiveQueue {
        DirectiveQueue::default()
    }

    pub fn push(&mut self, agent: AgentId, directive: Directive) {
        self.bundles.entry(agent).or_default().push(directive);
    }

    pub fn extend<I>(&mut self, agent: AgentId, directives: I)
    where
        I: IntoIterator<Item = Directive>,
    {
        self.bundles.entry(agent).or_default().extend(directives);
    }

    pub fn get(&self, agent: AgentId) -> &[Directive] {
        self.bundles.get(&agent).map(|bundle| bundle.as_slice()).unwrap_or(&[])
    }

    pub fn has_directives(&self, agent: AgentId) -> bool {
        !self.get(agent).is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<AgentId, Vec<Directive>> {
        self.bundles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundles_keep_push_order() {
        let mut queue = DirectiveQueue::new();

        queue.push(AgentId(2), Directive::ShootInRange);
        queue.push(AgentId(2), Directive::KeepSafe { grid: GridKind::Ground });

        assert_eq!(
            queue.get(AgentId(2)),
            &[Directive::ShootInRange, Directive::KeepSafe { grid: GridKind::Ground }]
        );
        assert!(!queue.has_directives(AgentId(3)));
    }
}
