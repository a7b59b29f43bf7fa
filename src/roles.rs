use crate::agent::*;
use crate::world::*;
use bitflags::*;
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Coarse intent tag. Every tracked agent holds exactly one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Gathering,
    Attacking,
    Defending,
    DropShip,
    DropUnitsToLoad,
    DropUnitsAttacking,
    ProxyWorker,
    BaseDefender,
    Harassing,
    OffensiveRepair,
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct RoleFlags: u16 {
        const NONE = 0;

        const GATHERING = 1u16 << 0;
        const ATTACKING = 1u16 << 1;
        const DEFENDING = 1u16 << 2;
        const DROP_SHIP = 1u16 << 3;
        const DROP_UNITS_TO_LOAD = 1u16 << 4;
        const DROP_UNITS_ATTACKING = 1u16 << 5;
        const PROXY_WORKER = 1u16 << 6;
        const BASE_DEFENDER = 1u16 << 7;
        const HARASSING = 1u16 << 8;
        const OFFENSIVE_REPAIR = 1u16 << 9;

        const DROP_PAYLOAD = Self::DROP_UNITS_TO_LOAD.bits() | Self::DROP_UNITS_ATTACKING.bits();
        const ARMY = Self::ATTACKING.bits() | Self::DEFENDING.bits();
    }
}

impl Role {
    pub fn flag(self) -> RoleFlags {
        match self {
            Role::Gathering => RoleFlags::GATHERING,
            Role::Attacking => RoleFlags::ATTACKING,
            Role::Defending => RoleFlags::DEFENDING,
            Role::DropShip => RoleFlags::DROP_SHIP,
            Role::DropUnitsToLoad => RoleFlags::DROP_UNITS_TO_LOAD,
            Role::DropUnitsAttacking => RoleFlags::DROP_UNITS_ATTACKING,
            Role::ProxyWorker => RoleFlags::PROXY_WORKER,
            Role::BaseDefender => RoleFlags::BASE_DEFENDER,
            Role::Harassing => RoleFlags::HARASSING,
            Role::OffensiveRepair => RoleFlags::OFFENSIVE_REPAIR,
        }
    }

    pub fn is_in(self, flags: RoleFlags) -> bool {
        flags.contains(self.flag())
    }
}

/// Role reassignment event handed to the command layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RoleChange {
    pub agent: AgentId,
    pub from: Role,
    pub to: Role,
}

/// Single authoritative agent -> role store.
///
/// Writes are visible to every reader immediately. Agents the registry has
/// never seen resolve to the baseline role. Removal is expressed as
/// reassignment to `Role::Gathering`; the entry itself is only dropped when
/// the agent stops resolving in the world.
#[derive(Default)]
pub struct RoleRegistry {
    roles: HashMap<AgentId, Role>,
    by_role: HashMap<Role, BTreeSet<AgentId>>,
    changes: Vec<RoleChange>,
}

impl RoleRegistry {
    pub fn new() -> RoleRegistry {
        RoleRegistry::default()
    }

    /// Idempotent overwrite. Re-assigning the current role records nothing.
    pub fn assign(&mut self, agent: AgentId, role: Role) {
        let previous = self.roles.insert(agent, role);

        let from = match previous {
            Some(previous) if previous == role => return,
            Some(previous) => {
                if let Some(members) = self.by_role.get_mut(&previous) {
                    members.remove(&agent);
                }

                previous
            }
            None => Role::Gathering,
        };

        self.by_role.entry(role).or_default().insert(agent);

        if from != role {
            debug!("Role change: {:?} {:?} -> {:?}", agent, from, role);

            self.changes.push(RoleChange { agent, from, to: role });
        }
    }

    pub fn batch_assign<I>(&mut self, agents: I, role: Role)
    where
        I: IntoIterator<Item = AgentId>,
    {
        for agent in agents {
            self.assign(agent, role);
        }
    }

    /// Start tracking an agent under the baseline role if it is unknown.
    pub fn track(&mut self, agent: AgentId) {
        if !self.roles.contains_key(&agent) {
            self.roles.insert(agent, Role::Gathering);
            self.by_role.entry(Role::Gathering).or_default().insert(agent);
        }
    }

    pub fn is_tracked(&self, agent: AgentId) -> bool {
        self.roles.contains_key(&agent)
    }

    pub fn role_of(&self, agent: AgentId) -> Role {
        self.roles.get(&agent).copied().unwrap_or_default()
    }

    pub fn agents_with_role(&self, role: Role) -> BTreeSet<AgentId> {
        self.by_role.get(&role).cloned().unwrap_or_default()
    }

    pub fn agents_with_any_role(&self, roles: RoleFlags) -> BTreeSet<AgentId> {
        self.by_role
            .iter()
            .filter(|(role, _)| role.is_in(roles))
            .flat_map(|(_, members)| members.iter().copied())
            .collect()
    }

    pub fn count_with_role(&self, role: Role) -> usize {
        self.by_role.get(&role).map(|members| members.len()).unwrap_or(0)
    }

    /// Forget agents that no longer resolve in the world.
    pub fn prune(&mut self, world: &dyn WorldView) -> Vec<AgentId> {
        let dead: Vec<AgentId> = self.roles.keys().copied().filter(|id| world.agent(*id).is_none()).collect();

        for id in &dead {
            if let Some(role) = self.roles.remove(id) {
                if let Some(members) = self.by_role.get_mut(&role) {
                    members.remove(id);
                }
            }
        }

        if !dead.is_empty() {
            debug!("Pruned {} dead agents from role registry", dead.len());
        }

        dead
    }

    /// Role changes recorded since the last drain, in assignment order.
    pub fn drain_changes(&mut self) -> Vec<RoleChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testworld::*;

    #[test]
    fn untracked_agents_resolve_to_baseline() {
        let registry = RoleRegistry::new();

        assert_eq!(registry.role_of(AgentId(5)), Role::Gathering);
    }

    #[test]
    fn assign_overwrites_previous_role() {
        let mut registry = RoleRegistry::new();

        registry.assign(AgentId(1), Role::Attacking);
        registry.assign(AgentId(1), Role::DropShip);

        assert_eq!(registry.role_of(AgentId(1)), Role::DropShip);
        assert!(registry.agents_with_role(Role::Attacking).is_empty());
        assert_eq!(registry.agents_with_role(Role::DropShip).len(), 1);
    }

    #[test]
    fn every_agent_is_indexed_under_exactly_one_role() {
        let mut registry = RoleRegistry::new();

        registry.batch_assign(vec![AgentId(1), AgentId(2), AgentId(3)], Role::Attacking);
        registry.assign(AgentId(2), Role::Defending);
        registry.assign(AgentId(3), Role::Gathering);
        registry.track(AgentId(4));

        let all = [
            Role::Gathering,
            Role::Attacking,
            Role::Defending,
            Role::DropShip,
            Role::DropUnitsToLoad,
            Role::DropUnitsAttacking,
            Role::ProxyWorker,
            Role::BaseDefender,
            Role::Harassing,
            Role::OffensiveRepair,
        ];

        for id in 1..=4 {
            let holders = all.iter().filter(|role| registry.agents_with_role(**role).contains(&AgentId(id))).count();

            assert_eq!(holders, 1, "agent {} held {} roles", id, holders);
        }
    }

    #[test]
    fn repeated_assign_records_one_change() {
        let mut registry = RoleRegistry::new();

        registry.assign(AgentId(1), Role::Attacking);
        registry.assign(AgentId(1), Role::Attacking);

        let changes = registry.drain_changes();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from, Role::Gathering);
        assert_eq!(changes[0].to, Role::Attacking);
        assert!(registry.drain_changes().is_empty());
    }

    #[test]
    fn any_role_query_unions_sets() {
        let mut registry = RoleRegistry::new();

        registry.assign(AgentId(1), Role::DropUnitsToLoad);
        registry.assign(AgentId(2), Role::DropUnitsAttacking);
        registry.assign(AgentId(3), Role::Attacking);

        let payload = registry.agents_with_any_role(RoleFlags::DROP_PAYLOAD);

        assert_eq!(payload.into_iter().collect::<Vec<_>>(), vec![AgentId(1), AgentId(2)]);
    }

    #[test]
    fn prune_forgets_dead_agents() {
        let mut world = TestWorld::new();
        world.add_friendly(AgentId(1), UnitType(1), Point::new(0.0, 0.0));

        let mut registry = RoleRegistry::new();
        registry.assign(AgentId(1), Role::Attacking);
        registry.assign(AgentId(2), Role::Attacking);

        let dead = registry.prune(&world);

        assert_eq!(dead, vec![AgentId(2)]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.agents_with_role(Role::Attacking).len(), 1);
    }
}
