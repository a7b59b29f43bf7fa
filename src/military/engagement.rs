use super::squad::*;
use crate::agent::*;
use crate::features::*;
use crate::roles::*;
use crate::world::*;
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngagementState {
    #[default]
    Disengaged,
    Engaged,
}

impl EngagementState {
    pub fn is_engaged(self) -> bool {
        matches!(self, EngagementState::Engaged)
    }
}

/// What a squad sees around it this tick, gathered before classification.
#[derive(Clone, Copy, Debug, Default)]
pub struct EngagementInputs {
    pub hostiles_present: bool,
    /// A friendly siege agent has hostiles close enough to need protecting.
    pub siege_threatened: bool,
}

#[derive(Clone, Debug, Default)]
struct EngagementRecord {
    state: EngagementState,
    last_outcome: Option<EngagementResult>,
}

/// Per-squad fight/avoid decision damped by two thresholds.
///
/// A squad only commits once the predicted outcome reaches the engage
/// threshold and only breaks off once it falls to the disengage threshold,
/// so outcomes wobbling between the two never flip the decision. Records
/// exist only for squads observed this tick; a squad missing for one tick
/// starts over disengaged.
pub struct EngagementTracker {
    settings: EngagementSettings,
    records: HashMap<SquadId, EngagementRecord>,
    seen: HashSet<SquadId>,
}

impl EngagementTracker {
    pub fn new(settings: EngagementSettings) -> Result<EngagementTracker, String> {
        settings.validate()?;

        Ok(EngagementTracker {
            settings,
            records: HashMap::new(),
            seen: HashSet::new(),
        })
    }

    pub fn settings(&self) -> &EngagementSettings {
        &self.settings
    }

    pub fn begin_tick(&mut self) {
        self.seen.clear();
    }

    /// Drop records of squads that were not observed since `begin_tick`.
    pub fn end_tick(&mut self) {
        let seen = &self.seen;

        self.records.retain(|squad, _| {
            let keep = seen.contains(squad);

            if !keep {
                debug!("Squad {:?} no longer observed, clearing engagement", squad);
            }

            keep
        });
    }

    pub fn is_engaged(&self, squad: SquadId) -> bool {
        self.records.get(&squad).map(|record| record.state.is_engaged()).unwrap_or(false)
    }

    pub fn last_outcome(&self, squad: SquadId) -> Option<EngagementResult> {
        self.records.get(&squad).and_then(|record| record.last_outcome)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Advance one squad's decision. `classify` is only consulted when no
    /// override applies; an unavailable classification counts as a loss.
    pub fn update<F>(&mut self, squad: SquadId, inputs: EngagementInputs, classify: F) -> bool
    where
        F: FnOnce() -> Option<EngagementResult>,
    {
        self.seen.insert(squad);

        let engage_threshold = self.settings.engage_threshold;
        let disengage_threshold = self.settings.disengage_threshold;

        let record = self.records.entry(squad).or_default();

        let next = if !inputs.hostiles_present {
            record.last_outcome = None;

            EngagementState::Disengaged
        } else if inputs.siege_threatened {
            EngagementState::Engaged
        } else {
            let outcome = classify();

            record.last_outcome = outcome;

            match (record.state, outcome) {
                (_, None) => EngagementState::Disengaged,
                (EngagementState::Disengaged, Some(outcome)) if outcome >= engage_threshold => EngagementState::Engaged,
                (EngagementState::Disengaged, Some(_)) => EngagementState::Disengaged,
                (EngagementState::Engaged, Some(outcome)) if outcome <= disengage_threshold => EngagementState::Disengaged,
                (EngagementState::Engaged, Some(_)) => EngagementState::Engaged,
            }
        };

        if next != record.state {
            info!("Squad {:?} engagement {:?} -> {:?} (outcome {:?})", squad, record.state, next, record.last_outcome);

            record.state = next;
        }

        record.state.is_engaged()
    }

    /// Gather a squad's surroundings from the world and advance its decision.
    pub fn evaluate(&mut self, world: &dyn WorldView, roles: &RoleRegistry, squad: &Squad) -> bool {
        let hostiles = combat_hostiles(world, squad.centroid, self.settings.detection_radius);

        let siege_threatened = squad
            .members
            .iter()
            .filter_map(|id| world.agent(*id))
            .filter(|member| member.has(AgentFlags::HEAVY_SIEGE))
            .any(|member| {
                let radius_squared = self.settings.siege_protect_radius * self.settings.siege_protect_radius;

                hostiles
                    .iter()
                    .any(|hostile| hostile.position.distance_squared_to(member.position) < radius_squared)
            });

        let inputs = EngagementInputs {
            hostiles_present: !hostiles.is_empty(),
            siege_threatened,
        };

        let friendly_radius = self.settings.friendly_radius;
        let combat_roles = self.settings.combat_role_flags();

        self.update(squad.id, inputs, || {
            let hostile_centre = Point::centroid(hostiles.iter().map(|hostile| hostile.position))?;
            let friendlies = counted_friendlies(world, roles, combat_roles, hostile_centre, friendly_radius);

            world.classify_engagement(&friendlies, &hostiles)
        })
    }
}

/// Hostile units plus static defence near `origin`. Other structures and
/// non-threatening agents are left out.
pub fn combat_hostiles(world: &dyn WorldView, origin: Point, radius: f32) -> Vec<&AgentSnapshot> {
    world
        .threats_in_range(origin, radius, QueryFilter::ALL_ENEMY)
        .into_iter()
        .filter(|hostile| !hostile.is_structure() || hostile.has(AgentFlags::STATIC_DEFENCE))
        .collect()
}

/// Own ground combatants around a fight: agents holding one of
/// `combat_roles`, leaving out siege agents, flyers and structures.
pub fn counted_friendlies<'a>(
    world: &'a dyn WorldView,
    roles: &RoleRegistry,
    combat_roles: RoleFlags,
    centre: Point,
    radius: f32,
) -> Vec<&'a AgentSnapshot> {
    world
        .agents_in_range(centre, radius, QueryFilter::FRIENDLY | QueryFilter::GROUND)
        .into_iter()
        .filter(|agent| roles.role_of(agent.id).is_in(combat_roles))
        .filter(|agent| !agent.is_structure())
        .filter(|agent| !agent.has(AgentFlags::HEAVY_SIEGE))
        .filter(|agent| !agent.has(AgentFlags::FLYING))
        .collect()
}

// ─── Skirmish verdicts ──────────────────────────────────────────────────────
//
// Small raiding groups use a one-shot verdict instead of the damped tracker:
// they fight unless the fight is at least a marginal loss.

/// Predicted outcome for a raiding group of `group_size` agents. Weak-only
/// threats and matched fights are taken without asking the classifier;
/// otherwise workers are left out of the hostile side.
pub fn skirmish_outcome(
    world: &dyn WorldView,
    settings: &HarassSettings,
    group_size: usize,
    own: &[&AgentSnapshot],
    threats: &[&AgentSnapshot],
) -> Option<EngagementResult> {
    let only_weak = !threats.is_empty()
        && !settings.weak_types.is_empty()
        && threats.iter().all(|threat| settings.weak_types.contains(&threat.unit_type));

    let matched = threats
        .iter()
        .filter(|threat| settings.matched_types.contains(&threat.unit_type))
        .count();
    let even_fight = matched > 0 && matched <= group_size;

    if only_weak || even_fight {
        Some(EngagementResult::VictoryClose)
    } else {
        let unit_threats: Vec<&AgentSnapshot> = threats.iter().copied().filter(|threat| !threat.has(AgentFlags::WORKER)).collect();

        world.classify_engagement(own, &unit_threats)
    }
}

/// Whether a raiding group should fight. No verdict means no fight.
pub fn can_skirmish(outcome: Option<EngagementResult>) -> bool {
    outcome.map(|outcome| !outcome.is_loss_marginal_or_worse()).unwrap_or(false)
}

/// Verdict for a group of harassing agents against nearby ground threats.
/// Members that no longer hold the Harassing role are ignored; `None` when
/// none are left. A group with nothing around it is free to raid.
pub fn skirmish_verdict(world: &dyn WorldView, roles: &RoleRegistry, settings: &HarassSettings, squad: &Squad) -> Option<bool> {
    let group_size = squad
        .members
        .iter()
        .filter(|member| world.agent(**member).is_some())
        .filter(|member| roles.role_of(**member) == Role::Harassing)
        .count();

    if group_size == 0 {
        return None;
    }

    let threats = combat_hostiles(world, squad.centroid, settings.threat_radius)
        .into_iter()
        .filter(|threat| !threat.has(AgentFlags::FLYING))
        .collect::<Vec<_>>();

    if threats.is_empty() {
        return Some(true);
    }

    let support_squared = settings.support_radius * settings.support_radius;

    let own: Vec<&AgentSnapshot> = world
        .agents_in_range(squad.centroid, settings.support_radius, QueryFilter::ALL_FRIENDLY)
        .into_iter()
        .filter(|agent| !agent.is_structure() && !agent.has(AgentFlags::WORKER))
        .filter(|agent| agent.position.distance_squared_to(squad.centroid) < support_squared)
        .collect();

    Some(can_skirmish(skirmish_outcome(world, settings, group_size, &own, &threats)))
}
