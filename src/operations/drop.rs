use super::data::*;
use crate::agent::*;
use crate::cleanup::*;
use crate::directives::*;
use crate::features::*;
use crate::findnearest::*;
use crate::machine_tick::*;
use crate::roles::*;
use crate::world::*;
use log::*;
use screeps_machine::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Externally visible phase of a drop operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DropPhase {
    /// Payload being picked up.
    Loading,
    /// Carrier moving toward the target with cargo aboard.
    Transit,
    /// Cargo being unloaded at the target.
    Releasing,
    /// Empty carrier withdrawing while the payload fights.
    Returning,
    /// Carrying the payload home to heal.
    Diverted,
    Complete,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DropContext {
    pub carrier: AgentId,
    /// Fixed at creation. Only ever consulted, never changed.
    pub payload: BTreeSet<AgentId>,
    /// Candidate point the operation was created for.
    pub candidate: Point,
    /// Fixed at creation. Payload fights toward it once released.
    pub target: Point,
    /// Where the carrier heads this tick, recomputed from `target`.
    pub aim: Point,
    pub needs_healing: bool,
    pub emergency: bool,
    pub created_at: u64,
}

pub struct DropTickContext<'a> {
    pub world: &'a dyn WorldView,
    pub roles: &'a mut RoleRegistry,
    pub directives: &'a mut DirectiveQueue,
    pub settings: &'a DropSettings,
    pub healing_spot: Option<Point>,
    /// Payload members alive and still holding a drop role.
    pub survivors: Vec<AgentId>,
}

machine!(
    #[derive(Clone, Serialize, Deserialize)]
    enum DropState {
        Loading,
        Transit,
        Releasing,
        Returning,
        Diverted,
        Complete
    }

    impl {
        _ => fn phase(&self) -> DropPhase;

        _ => fn tick(&mut self, state_context: &mut DropContext, tick_context: &mut DropTickContext) -> Result<Option<DropState>, String>;
    }
);

fn carrier_snapshot<'a>(world: &'a dyn WorldView, state_context: &DropContext) -> Result<&'a AgentSnapshot, String> {
    world
        .agent(state_context.carrier)
        .ok_or_else(|| format!("Carrier {:?} no longer exists", state_context.carrier))
}

/// Interruptions checked before a loaded or loading carrier does anything
/// else. A critically damaged carrier always releases immediately. Past
/// that, a drop configured for healing heads home when carrier or payload
/// is hurt and a healing spot is known.
fn check_interrupts(
    state_context: &mut DropContext,
    tick_context: &mut DropTickContext,
    carrier: &AgentSnapshot,
) -> Option<DropState> {
    let settings = tick_context.settings;

    if carrier.health <= settings.emergency_health {
        warn!(
            "Drop carrier {:?} at {:.0}% health, emergency release",
            state_context.carrier,
            carrier.health * 100.0
        );

        state_context.emergency = true;

        return Some(DropState::releasing());
    }

    if let (Some(divert), Some(_)) = (&settings.divert, tick_context.healing_spot) {
        let carrier_hurt = carrier.has_cargo() && carrier.health <= divert.carrier_health;

        let payload_hurt = tick_context
            .survivors
            .iter()
            .filter_map(|id| tick_context.world.agent(*id))
            .any(|agent| agent.health <= divert.payload_health);

        if carrier_hurt || payload_hurt {
            info!("Drop with carrier {:?} diverting to heal", state_context.carrier);

            state_context.needs_healing = true;

            tick_context.roles.batch_assign(tick_context.survivors.iter().copied(), Role::DropUnitsToLoad);

            return Some(DropState::diverted());
        }
    }

    None
}

/// Every passenger's gated ability is within the lead time of being ready.
fn payload_ready(tick_context: &DropTickContext, carrier: &AgentSnapshot) -> bool {
    let settings = tick_context.settings;
    let now = tick_context.world.game_loop();

    match settings.payload_ability {
        Some(ability) => carrier
            .passengers
            .iter()
            .filter_map(|id| tick_context.world.agent(*id))
            .all(|passenger| passenger.ability_ready_in(ability, now) <= settings.readiness_lead),
        None => true,
    }
}

/// Unloading right where the carrier is pays off: enough hostile supply is
/// close while the carrier is hidden and no heavy siege covers the spot.
fn early_drop_here(world: &dyn WorldView, early_drop: &EarlyDropSettings, carrier: &AgentSnapshot) -> bool {
    if carrier.has(AgentFlags::DETECTED) {
        return false;
    }

    let close: Vec<&AgentSnapshot> = world
        .threats_in_range(carrier.position, early_drop.radius, QueryFilter::ALL_ENEMY)
        .into_iter()
        .filter(|agent| !agent.is_structure())
        .collect();

    let supply: f32 = close.iter().map(|agent| agent.supply).sum();

    supply >= early_drop.min_supply && !close.iter().any(|agent| agent.has(AgentFlags::HEAVY_SIEGE))
}

/// The carrier is being shot at over ground the payload can stand on.
fn under_fire_here(world: &dyn WorldView, under_fire: &UnderFireSettings, carrier: &AgentSnapshot) -> bool {
    if !world.is_pathable(GridKind::Ground, carrier.position) {
        return false;
    }

    let air = world.threats_in_range(carrier.position, under_fire.air_radius, QueryFilter::ENEMY_FLYING);
    let ground = world.threats_in_range(carrier.position, under_fire.ground_radius, QueryFilter::ENEMY_GROUND);

    !air.is_empty() || !ground.is_empty()
}

/// Point the carrier should head for this tick. Starts from the fixed
/// target; never changes it.
fn retarget(state_context: &DropContext, tick_context: &DropTickContext, carrier: &AgentSnapshot) -> Point {
    let world = tick_context.world;
    let settings = tick_context.settings;

    if let Some(early_drop) = &settings.early_drop {
        if early_drop_here(world, early_drop, carrier) {
            return carrier.position;
        }
    }

    if let Some(under_fire) = &settings.drop_under_fire {
        if under_fire_here(world, under_fire, carrier) {
            return carrier.position;
        }
    }

    let mut aim = state_context.target;

    let workers: Vec<Point> = world
        .threats_in_range(carrier.position, settings.cluster_radius, QueryFilter::ENEMY_GROUND)
        .into_iter()
        .filter(|agent| agent.has(AgentFlags::WORKER))
        .map(|agent| agent.position)
        .collect();

    if workers.len() >= settings.cluster_min {
        if let Some(centre) = Point::centroid(workers) {
            aim = centre;
        }
    }

    if !world.is_safe(GridKind::Air, carrier.position) {
        if let Some(spot) = world.closest_safe_spot(GridKind::Air, aim, settings.safe_spot_radius) {
            aim = spot;
        }
    }

    aim
}

impl Loading {
    fn phase(&self) -> DropPhase {
        DropPhase::Loading
    }

    fn tick(&mut self, state_context: &mut DropContext, tick_context: &mut DropTickContext) -> Result<Option<DropState>, String> {
        let world = tick_context.world;
        let carrier = carrier_snapshot(world, state_context)?;

        if let Some(next) = check_interrupts(state_context, tick_context, carrier) {
            return Ok(Some(next));
        }

        let to_load: Vec<&AgentSnapshot> = tick_context
            .survivors
            .iter()
            .filter(|id| tick_context.roles.role_of(**id) == Role::DropUnitsToLoad)
            .filter(|id| !carrier.passengers.contains(*id))
            .filter_map(|id| world.agent(*id))
            .sorted_by_distance_to(carrier.position);

        if to_load.is_empty() {
            if carrier.has_cargo() {
                return Ok(Some(DropState::transit()));
            }

            // Everything still alive is on the ground fighting.
            return Ok(Some(DropState::returning()));
        }

        for cargo in to_load {
            tick_context.directives.push(carrier.id, Directive::PickUp { cargo: cargo.id });
            tick_context.directives.push(
                cargo.id,
                Directive::PathTo {
                    target: carrier.position,
                    grid: GridKind::Ground,
                    success_distance: 1.0,
                },
            );
        }

        Ok(None)
    }
}

impl Transit {
    fn phase(&self) -> DropPhase {
        DropPhase::Transit
    }

    fn tick(&mut self, state_context: &mut DropContext, tick_context: &mut DropTickContext) -> Result<Option<DropState>, String> {
        let world = tick_context.world;
        let carrier = carrier_snapshot(world, state_context)?;

        if let Some(next) = check_interrupts(state_context, tick_context, carrier) {
            return Ok(Some(next));
        }

        if !carrier.has_cargo() {
            return Ok(Some(DropState::loading()));
        }

        let aim = retarget(state_context, tick_context, carrier);

        if aim != state_context.aim {
            debug!("Drop carrier {:?} now aiming at {:?}", carrier.id, aim);

            state_context.aim = aim;
        }

        let settings = tick_context.settings;

        let arrived = carrier.position.distance_to(state_context.aim) <= settings.arrival_distance;

        if arrived && world.is_pathable(GridKind::Ground, carrier.position) && payload_ready(tick_context, carrier) {
            return Ok(Some(DropState::releasing()));
        }

        if let Some(boost) = settings.carrier_boost_ability {
            if carrier.has(AgentFlags::MOVING) && carrier.ability_ready(boost, world.game_loop()) {
                tick_context
                    .directives
                    .push(carrier.id, Directive::UseAbility { ability: boost, target: None });
            }
        }

        tick_context.directives.push(
            carrier.id,
            Directive::PathTo {
                target: state_context.aim,
                grid: GridKind::Air,
                success_distance: settings.arrival_distance,
            },
        );

        Ok(None)
    }
}

impl Releasing {
    fn phase(&self) -> DropPhase {
        DropPhase::Releasing
    }

    fn tick(&mut self, state_context: &mut DropContext, tick_context: &mut DropTickContext) -> Result<Option<DropState>, String> {
        let world = tick_context.world;
        let carrier = carrier_snapshot(world, state_context)?;

        if !carrier.has_cargo() {
            if state_context.emergency {
                return Ok(Some(DropState::complete()));
            }

            return Ok(Some(DropState::returning()));
        }

        if world.is_pathable(GridKind::Ground, carrier.position) {
            let aboard = tick_context.survivors.iter().copied().filter(|id| carrier.passengers.contains(id));

            tick_context.roles.batch_assign(aboard, Role::DropUnitsAttacking);

            tick_context.directives.push(carrier.id, Directive::DropCargo { at: carrier.position });
        } else {
            tick_context.directives.push(carrier.id, Directive::KeepSafe { grid: GridKind::Air });
        }

        Ok(None)
    }
}

impl Returning {
    fn phase(&self) -> DropPhase {
        DropPhase::Returning
    }

    fn tick(&mut self, state_context: &mut DropContext, tick_context: &mut DropTickContext) -> Result<Option<DropState>, String> {
        let carrier = carrier_snapshot(tick_context.world, state_context)?;

        if state_context.emergency {
            return Ok(Some(DropState::complete()));
        }

        let reloading = tick_context
            .survivors
            .iter()
            .any(|id| tick_context.roles.role_of(*id) == Role::DropUnitsToLoad);

        if reloading {
            return Ok(Some(DropState::loading()));
        }

        tick_context.directives.push(carrier.id, Directive::KeepSafe { grid: GridKind::Air });

        Ok(None)
    }
}

impl Diverted {
    fn phase(&self) -> DropPhase {
        DropPhase::Diverted
    }

    fn tick(&mut self, state_context: &mut DropContext, tick_context: &mut DropTickContext) -> Result<Option<DropState>, String> {
        let world = tick_context.world;
        let carrier = carrier_snapshot(world, state_context)?;

        let healing_spot = match tick_context.healing_spot {
            Some(spot) => spot,
            None => {
                state_context.needs_healing = false;

                return Ok(Some(DropState::loading()));
            }
        };

        let healed = carrier.health >= 1.0
            && tick_context
                .survivors
                .iter()
                .filter_map(|id| world.agent(*id))
                .all(|agent| agent.health >= 1.0);

        if healed {
            info!("Drop with carrier {:?} healed, resuming", carrier.id);

            state_context.needs_healing = false;

            return Ok(Some(DropState::loading()));
        }

        let arrival_distance = tick_context.settings.arrival_distance;

        if carrier.has_cargo() && carrier.position.distance_to(healing_spot) > arrival_distance {
            tick_context.directives.push(
                carrier.id,
                Directive::PathTo {
                    target: healing_spot,
                    grid: GridKind::Air,
                    success_distance: arrival_distance,
                },
            );
        } else if carrier.has_cargo() {
            tick_context.directives.push(carrier.id, Directive::DropCargo { at: carrier.position });
        } else {
            tick_context.directives.push(carrier.id, Directive::MoveTo { target: healing_spot });
        }

        for id in tick_context.survivors.iter().copied().filter(|id| !carrier.passengers.contains(id)) {
            tick_context.directives.push(
                id,
                Directive::PathTo {
                    target: healing_spot,
                    grid: GridKind::Ground,
                    success_distance: arrival_distance,
                },
            );
        }

        Ok(None)
    }
}

impl Complete {
    fn phase(&self) -> DropPhase {
        DropPhase::Complete
    }

    fn tick(&mut self, _state_context: &mut DropContext, _tick_context: &mut DropTickContext) -> Result<Option<DropState>, String> {
        Ok(None)
    }
}

// ─── Operation record ───────────────────────────────────────────────────────

pub struct DropOperation {
    id: OperationId,
    context: DropContext,
    state: DropState,
}

impl DropOperation {
    fn new(id: OperationId, context: DropContext) -> DropOperation {
        DropOperation {
            id,
            context,
            state: DropState::loading(),
        }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn phase(&self) -> DropPhase {
        self.state.phase()
    }

    pub fn carrier(&self) -> AgentId {
        self.context.carrier
    }

    pub fn payload(&self) -> &BTreeSet<AgentId> {
        &self.context.payload
    }

    pub fn target(&self) -> Point {
        self.context.target
    }

    pub fn aim(&self) -> Point {
        self.context.aim
    }

    pub fn candidate(&self) -> Point {
        self.context.candidate
    }

    pub fn needs_healing(&self) -> bool {
        self.context.needs_healing
    }

    pub fn is_emergency(&self) -> bool {
        self.context.emergency
    }

    pub fn created_at(&self) -> u64 {
        self.context.created_at
    }

    fn claimed_agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        std::iter::once(self.context.carrier).chain(self.context.payload.iter().copied())
    }

    /// Payload members that are alive and still hold a drop role.
    fn surviving_payload(&self, world: &dyn WorldView, roles: &RoleRegistry) -> Vec<AgentId> {
        self.context
            .payload
            .iter()
            .copied()
            .filter(|id| world.agent(*id).is_some())
            .filter(|id| roles.role_of(*id).is_in(RoleFlags::DROP_PAYLOAD))
            .collect()
    }

    fn run_operation(
        &mut self,
        world: &dyn WorldView,
        roles: &mut RoleRegistry,
        directives: &mut DirectiveQueue,
        settings: &DropSettings,
        healing_spot: Option<Point>,
    ) -> Result<OperationResult, String> {
        carrier_snapshot(world, &self.context)?;

        let survivors = self.surviving_payload(world, roles);

        if survivors.is_empty() {
            return Ok(OperationResult::Success);
        }

        let mut tick_context = DropTickContext {
            world,
            roles,
            directives,
            settings,
            healing_spot,
            survivors,
        };

        let before = self.state.phase();

        step_state_machine_result(&mut self.state, "DropOperation", |state| {
            state.tick(&mut self.context, &mut tick_context)
        })?;

        let after = self.state.phase();

        if before != after {
            info!("Drop operation {:?} {:?} -> {:?}", self.id, before, after);
        }

        if after == DropPhase::Complete {
            return Ok(OperationResult::Success);
        }

        direct_released_payload(&self.context, &mut tick_context, after);

        Ok(OperationResult::Running)
    }
}

/// Directives for payload that has been dropped and is fighting.
fn direct_released_payload(state_context: &DropContext, tick_context: &mut DropTickContext, phase: DropPhase) {
    let world = tick_context.world;
    let settings = tick_context.settings;
    let now = world.game_loop();

    let carrier_passengers: Vec<AgentId> = world
        .agent(state_context.carrier)
        .map(|carrier| carrier.passengers.clone())
        .unwrap_or_default();

    let released: Vec<&AgentSnapshot> = tick_context
        .survivors
        .iter()
        .filter(|id| tick_context.roles.role_of(**id) == Role::DropUnitsAttacking)
        .filter(|id| !carrier_passengers.contains(*id))
        .filter_map(|id| world.agent(*id))
        .collect();

    for agent in released {
        match settings.payload_ability {
            Some(ability) if agent.ability_ready(ability, now) => {
                tick_context.directives.extend(
                    agent.id,
                    vec![
                        Directive::UseAbility { ability, target: None },
                        Directive::ShootInRange,
                        Directive::KeepSafe { grid: GridKind::Ground },
                        Directive::AttackMove {
                            target: state_context.target,
                        },
                    ],
                );
            }
            Some(_) if settings.reload_on_cooldown && phase == DropPhase::Returning => {
                debug!("Payload {:?} on cooldown, reloading", agent.id);

                tick_context.roles.assign(agent.id, Role::DropUnitsToLoad);
            }
            Some(_) => {
                tick_context.directives.extend(
                    agent.id,
                    vec![Directive::ShootInRange, Directive::KeepSafe { grid: GridKind::Ground }],
                );
            }
            None => {
                tick_context.directives.extend(
                    agent.id,
                    vec![
                        Directive::ShootInRange,
                        Directive::AttackMove {
                            target: state_context.target,
                        },
                    ],
                );
            }
        }
    }
}

// ─── Manager ────────────────────────────────────────────────────────────────

/// Owns every open drop operation and the index of agents they hold.
pub struct DropManager {
    settings: DropSettings,
    next_id: u64,
    operations: BTreeMap<OperationId, DropOperation>,
    claims: ClaimIndex<OperationId>,
}

impl DropManager {
    pub fn new(settings: DropSettings) -> DropManager {
        DropManager {
            settings,
            next_id: 1,
            operations: BTreeMap::new(),
            claims: ClaimIndex::default(),
        }
    }

    pub fn settings(&self) -> &DropSettings {
        &self.settings
    }

    pub fn operations(&self) -> impl Iterator<Item = &DropOperation> {
        self.operations.values()
    }

    pub fn operation(&self, id: OperationId) -> Option<&DropOperation> {
        self.operations.get(&id)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn owner_of(&self, agent: AgentId) -> Option<OperationId> {
        self.claims.owner_of(agent)
    }

    fn rebuild_claims(&mut self) {
        let claims: Vec<(AgentId, OperationId)> = self
            .operations
            .values()
            .flat_map(|operation| operation.claimed_agents().map(move |agent| (agent, operation.id)))
            .collect();

        self.claims.rebuild(claims);
    }

    pub fn remove_operation(&mut self, id: OperationId) -> bool {
        let removed = self.operations.remove(&id).is_some();

        if removed {
            self.rebuild_claims();
        }

        removed
    }

    /// Advance every operation by one evaluation. Finished and failed
    /// operations are queued for cleanup with their role handbacks.
    pub fn run_operations(
        &mut self,
        world: &dyn WorldView,
        roles: &mut RoleRegistry,
        directives: &mut DirectiveQueue,
        cleanup: &mut CleanupQueue,
        healing_spot: Option<Point>,
    ) {
        let fallback = self.settings.fallback_role;

        for operation in self.operations.values_mut() {
            let result = operation.run_operation(world, roles, directives, &self.settings, healing_spot);

            let handbacks: Vec<Handback> = match result {
                Ok(OperationResult::Running) => continue,
                Ok(OperationResult::Success) => {
                    info!("Drop operation {:?} complete, cleaning up", operation.id);

                    operation
                        .claimed_agents()
                        .filter(|agent| *agent == operation.context.carrier || roles.role_of(*agent).is_in(RoleFlags::DROP_PAYLOAD))
                        .map(|agent| Handback { agent, role: fallback })
                        .collect()
                }
                Err(reason) => {
                    info!("Drop operation {:?} failed, cleaning up: {}", operation.id, reason);

                    operation
                        .surviving_payload(world, roles)
                        .into_iter()
                        .map(|agent| Handback { agent, role: fallback })
                        .collect()
                }
            };

            cleanup.delete_drop(DropCleanup {
                operation: operation.id,
                handbacks,
            });
        }
    }

    /// Hand back agents left in drop roles that no open operation holds.
    pub fn sweep_orphans(&self, roles: &mut RoleRegistry) {
        let orphans: Vec<AgentId> = roles
            .agents_with_any_role(RoleFlags::DROP_PAYLOAD | RoleFlags::DROP_SHIP)
            .into_iter()
            .filter(|agent| !self.claims.is_claimed(*agent))
            .collect();

        for agent in orphans {
            debug!("Agent {:?} left in a drop role without an operation, handing back", agent);

            roles.assign(agent, self.settings.fallback_role);
        }
    }

    /// Pick the candidate targeted by the fewest open operations, breaking
    /// ties in favour of the closer candidate.
    fn choose_candidate(&self, candidates: &[Point], from: Point) -> Option<Point> {
        candidates
            .iter()
            .copied()
            .map(|candidate| {
                let targeting = self.operations.values().filter(|operation| operation.context.candidate == candidate).count();

                (targeting, from.distance_squared_to(candidate), candidate)
            })
            .min_by(|(a_count, a_distance, _), (b_count, b_distance, _)| {
                a_count
                    .cmp(b_count)
                    .then(a_distance.partial_cmp(b_distance).unwrap_or(std::cmp::Ordering::Equal))
            })
            .map(|(_, _, candidate)| candidate)
    }

    fn available<'a>(&self, world: &'a dyn WorldView, roles: &RoleRegistry, types: &[UnitType]) -> Vec<&'a AgentSnapshot> {
        roles
            .agents_with_any_role(self.settings.steal_from_flags())
            .into_iter()
            .filter(|agent| !self.claims.is_claimed(*agent))
            .filter_map(|agent| world.agent(agent))
            .filter(|agent| types.contains(&agent.unit_type))
            .collect()
    }

    /// Start new operations while below the cap and enough idle agents
    /// exist. Claims are made in the same pass that decides them.
    pub fn create_operations(&mut self, world: &dyn WorldView, roles: &mut RoleRegistry, candidates: &[Point], map_centre: Point) {
        while self.operations.len() < self.settings.max_operations {
            match self.try_create_operation(world, roles, candidates, map_centre) {
                Some(id) => {
                    if let Some(operation) = self.operations.get(&id) {
                        info!(
                            "Drop operation {:?} created: carrier {:?}, payload {:?}, target {:?}",
                            id, operation.context.carrier, operation.context.payload, operation.context.target
                        );
                    }
                }
                None => break,
            }
        }
    }

    fn try_create_operation(
        &mut self,
        world: &dyn WorldView,
        roles: &mut RoleRegistry,
        candidates: &[Point],
        map_centre: Point,
    ) -> Option<OperationId> {
        if candidates.is_empty() {
            return None;
        }

        let payload_pool = self.available(world, roles, &self.settings.payload_types);

        if payload_pool.len() < self.settings.payload_size {
            return None;
        }

        let pool_centre = Point::centroid(payload_pool.iter().map(|agent| agent.position))?;

        let carrier = self
            .available(world, roles, &self.settings.carrier_types)
            .into_iter()
            .filter(|agent| agent.health >= 1.0)
            .find_nearest_linear(pool_centre)?;

        let payload: BTreeSet<AgentId> = payload_pool
            .into_iter()
            .filter(|agent| agent.id != carrier.id)
            .sorted_by_distance_to(carrier.position)
            .into_iter()
            .take(self.settings.payload_size)
            .map(|agent| agent.id)
            .collect();

        if payload.len() < self.settings.payload_size {
            return None;
        }

        let candidate = self.choose_candidate(candidates, carrier.position)?;
        let target = candidate.towards(map_centre, -self.settings.target_offset);

        let id = OperationId(self.next_id);

        for agent in std::iter::once(carrier.id).chain(payload.iter().copied()) {
            if let Err(owner) = self.claims.try_claim(agent, id) {
                warn!("Drop creation rejected: agent {:?} already held by {:?}", agent, owner);

                self.rebuild_claims();

                return None;
            }
        }

        self.next_id += 1;

        roles.assign(carrier.id, Role::DropShip);
        roles.batch_assign(payload.iter().copied(), Role::DropUnitsToLoad);

        let context = DropContext {
            carrier: carrier.id,
            payload,
            candidate,
            target,
            aim: target,
            needs_healing: false,
            emergency: false,
            created_at: world.game_loop(),
        };

        self.operations.insert(id, DropOperation::new(id, context));
        self.rebuild_claims();

        Some(id)
    }
}
