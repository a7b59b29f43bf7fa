use crate::agent::*;
use crate::operations::construction::*;
use crate::operations::data::*;
use crate::operations::drop::*;
use crate::roles::*;
use crate::world::*;
use log::*;
use std::collections::HashSet;

/// Role an agent returns to when the record holding it goes away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handback {
    pub agent: AgentId,
    pub role: Role,
}

/// Context extracted at queue-time for a drop operation deletion.
pub struct DropCleanup {
    pub operation: OperationId,
    pub handbacks: Vec<Handback>,
}

/// Context extracted at queue-time for a build task deletion.
pub struct BuildTaskCleanup {
    pub key: GridKey,
    pub handbacks: Vec<Handback>,
}

/// One pending deletion. Carries everything needed to hand roles back and
/// delete the record without further lookups.
pub enum CleanupEntry {
    Drop(DropCleanup),
    BuildTask(BuildTaskCleanup),
}

impl CleanupEntry {
    fn handbacks(&self) -> &[Handback] {
        match self {
            CleanupEntry::Drop(d) => &d.handbacks,
            CleanupEntry::BuildTask(b) => &b.handbacks,
        }
    }
}

/// Records scheduled for deletion this tick.
#[derive(Default)]
pub struct CleanupQueue {
    pending: Vec<CleanupEntry>,
}

impl CleanupQueue {
    pub fn delete_drop(&mut self, cleanup: DropCleanup) {
        self.pending.push(CleanupEntry::Drop(cleanup));
    }

    pub fn delete_build_task(&mut self, cleanup: BuildTaskCleanup) {
        self.pending.push(CleanupEntry::BuildTask(cleanup));
    }

    /// Drain all pending entries, leaving the queue empty.
    fn drain(&mut self) -> Vec<CleanupEntry> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Hand roles back and delete every queued record.
///
/// Handbacks for agents that no longer resolve are skipped. A record queued
/// twice is only processed once.
pub fn process_cleanup(
    queue: &mut CleanupQueue,
    world: &dyn WorldView,
    roles: &mut RoleRegistry,
    drops: &mut DropManager,
    construction: &mut ConstructionManager,
) {
    if queue.is_empty() {
        return;
    }

    let mut entries = queue.drain();

    // ── Deduplicate ──────────────────────────────────────────────────

    let mut seen_drops = HashSet::new();
    let mut seen_tasks = HashSet::new();

    entries.retain(|entry| match entry {
        CleanupEntry::Drop(d) => seen_drops.insert(d.operation),
        CleanupEntry::BuildTask(b) => seen_tasks.insert(b.key),
    });

    // ── Role handback ────────────────────────────────────────────────

    for entry in &entries {
        for handback in entry.handbacks() {
            if world.agent(handback.agent).is_some() {
                roles.assign(handback.agent, handback.role);
            }
        }
    }

    // ── Record deletion ──────────────────────────────────────────────

    for entry in entries {
        match entry {
            CleanupEntry::Drop(d) => {
                if !drops.remove_operation(d.operation) {
                    warn!("Cleanup: drop operation {:?} already removed", d.operation);
                }
            }
            CleanupEntry::BuildTask(b) => {
                if !construction.remove_task(b.key) {
                    warn!("Cleanup: build task {:?} already removed", b.key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::*;
    use crate::testworld::*;

    #[test]
    fn handbacks_skip_dead_agents_and_duplicates() {
        let mut world = TestWorld::new();
        world.add_friendly(AgentId(1), UnitType(1), Point::default());

        let mut roles = RoleRegistry::new();
        roles.assign(AgentId(1), Role::DropShip);

        let mut drops = DropManager::new(DropSettings::default());
        let mut construction = ConstructionManager::new(ConstructionSettings::default());

        let mut queue = CleanupQueue::default();

        for _ in 0..2 {
            queue.delete_drop(DropCleanup {
                operation: OperationId(9),
                handbacks: vec![
                    Handback {
                        agent: AgentId(1),
                        role: Role::Attacking,
                    },
                    Handback {
                        agent: AgentId(2),
                        role: Role::Attacking,
                    },
                ],
            });
        }

        process_cleanup(&mut queue, &world, &mut roles, &mut drops, &mut construction);

        assert!(queue.is_empty());
        assert_eq!(roles.role_of(AgentId(1)), Role::Attacking);
        assert!(!roles.is_tracked(AgentId(2)));
    }
}
