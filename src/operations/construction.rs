use super::data::*;
use crate::agent::*;
use crate::cleanup::*;
use crate::directives::*;
use crate::features::*;
use crate::findnearest::*;
use crate::machine_tick::*;
use crate::roles::*;
use crate::world::*;
use itertools::*;
use log::*;
use screeps_machine::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BuildTaskStatus {
    /// Builder travelling to the site.
    Moving,
    /// Structure started and being worked on.
    Building,
    /// Builder fighting off harassment near the site.
    Defending,
    /// Structure finished.
    Idle,
}

/// What the caller wants built this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstructionRequest {
    pub area: Point,
    pub structure_type: UnitType,
    pub max_structures: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildTaskContext {
    pub structure_type: UnitType,
    /// Fixed site. The task key is derived from it once at creation.
    pub position: Point,
}

pub struct BuildTickContext<'a> {
    pub world: &'a dyn WorldView,
    pub directives: &'a mut DirectiveQueue,
    pub settings: &'a ConstructionSettings,
    pub builder: &'a AgentSnapshot,
}

machine!(
    #[derive(Clone, Serialize, Deserialize)]
    enum BuildTaskState {
        Moving,
        Building,
        Defending,
        Idle
    }

    impl {
        _ => fn status(&self) -> BuildTaskStatus;

        _ => fn tick(&mut self, state_context: &mut BuildTaskContext, tick_context: &mut BuildTickContext) -> Result<Option<BuildTaskState>, String>;
    }
);

/// Own structure occupying a build site, if any.
fn site_structure<'a>(world: &'a dyn WorldView, position: Point, settings: &ConstructionSettings) -> Option<&'a AgentSnapshot> {
    world.own_structure_at(position, settings.site_radius)
}

fn enemy_workers_near(world: &dyn WorldView, position: Point, radius: f32) -> Vec<&AgentSnapshot> {
    world
        .threats_in_range(position, radius, QueryFilter::ENEMY_GROUND)
        .into_iter()
        .filter(|agent| agent.has(AgentFlags::WORKER))
        .collect()
}

impl Moving {
    fn status(&self) -> BuildTaskStatus {
        BuildTaskStatus::Moving
    }

    fn tick(&mut self, state_context: &mut BuildTaskContext, tick_context: &mut BuildTickContext) -> Result<Option<BuildTaskState>, String> {
        let world = tick_context.world;
        let builder = tick_context.builder;
        let settings = tick_context.settings;
        let position = state_context.position;

        let in_range = builder.position.distance_squared_to(position) <= settings.build_range * settings.build_range;

        match site_structure(world, position, settings) {
            Some(structure) if structure.has(AgentFlags::READY) => Ok(Some(BuildTaskState::idle())),
            Some(structure) if in_range => {
                tick_context.directives.push(
                    builder.id,
                    Directive::ResumeConstruction {
                        structure: structure.id,
                    },
                );

                Ok(Some(BuildTaskState::building()))
            }
            None if in_range && world.can_start_structure(state_context.structure_type) => {
                tick_context.directives.push(
                    builder.id,
                    Directive::Build {
                        structure_type: state_context.structure_type,
                        at: position,
                    },
                );

                Ok(Some(BuildTaskState::building()))
            }
            _ => {
                tick_context.directives.push(builder.id, Directive::MoveTo { target: position });

                Ok(None)
            }
        }
    }
}

impl Building {
    fn status(&self) -> BuildTaskStatus {
        BuildTaskStatus::Building
    }

    fn tick(&mut self, state_context: &mut BuildTaskContext, tick_context: &mut BuildTickContext) -> Result<Option<BuildTaskState>, String> {
        let world = tick_context.world;
        let builder = tick_context.builder;
        let settings = tick_context.settings;

        let structure = match site_structure(world, state_context.position, settings) {
            Some(structure) => structure,
            None => return Ok(Some(BuildTaskState::moving())),
        };

        if structure.has(AgentFlags::READY) {
            return Ok(Some(BuildTaskState::idle()));
        }

        let threatened = !enemy_workers_near(world, builder.position, settings.threat_radius).is_empty();
        let constructing = builder.has(AgentFlags::CONSTRUCTING);

        if threatened && constructing {
            debug!("Builder {:?} harassed at {:?}, defending", builder.id, state_context.position);

            tick_context.directives.push(builder.id, Directive::Halt);

            return Ok(Some(BuildTaskState::defending()));
        }

        if !constructing && !builder.has(AgentFlags::MOVING) {
            tick_context.directives.push(
                builder.id,
                Directive::ResumeConstruction {
                    structure: structure.id,
                },
            );
        }

        Ok(None)
    }
}

impl Defending {
    fn status(&self) -> BuildTaskStatus {
        BuildTaskStatus::Defending
    }

    fn tick(&mut self, state_context: &mut BuildTaskContext, tick_context: &mut BuildTickContext) -> Result<Option<BuildTaskState>, String> {
        let builder = tick_context.builder;
        let settings = tick_context.settings;

        if builder.position.distance_squared_to(state_context.position) > settings.leash_distance * settings.leash_distance {
            return Ok(Some(BuildTaskState::moving()));
        }

        let nearest = enemy_workers_near(tick_context.world, builder.position, settings.defend_radius)
            .into_iter()
            .find_nearest_linear(builder.position);

        match nearest {
            Some(enemy) => {
                tick_context.directives.push(builder.id, Directive::Attack { target: enemy.id });

                Ok(None)
            }
            None => Ok(Some(BuildTaskState::moving())),
        }
    }
}

impl Idle {
    fn status(&self) -> BuildTaskStatus {
        BuildTaskStatus::Idle
    }

    fn tick(&mut self, _state_context: &mut BuildTaskContext, _tick_context: &mut BuildTickContext) -> Result<Option<BuildTaskState>, String> {
        Ok(None)
    }
}

// ─── Task record ────────────────────────────────────────────────────────────

pub struct BuildTask {
    key: GridKey,
    context: BuildTaskContext,
    builder: Option<AgentId>,
    /// Creation time, refreshed whenever a builder is (re)assigned.
    assigned_at: u64,
    state: BuildTaskState,
}

impl BuildTask {
    pub fn key(&self) -> GridKey {
        self.key
    }

    pub fn position(&self) -> Point {
        self.context.position
    }

    pub fn structure_type(&self) -> UnitType {
        self.context.structure_type
    }

    pub fn builder(&self) -> Option<AgentId> {
        self.builder
    }

    pub fn status(&self) -> BuildTaskStatus {
        self.state.status()
    }

    pub fn needs_builder(&self) -> bool {
        self.builder.is_none()
    }

    fn run_task(
        &mut self,
        world: &dyn WorldView,
        directives: &mut DirectiveQueue,
        settings: &ConstructionSettings,
        builder: &AgentSnapshot,
    ) -> Result<OperationResult, String> {
        let mut tick_context = BuildTickContext {
            world,
            directives,
            settings,
            builder,
        };

        let before = self.state.status();

        step_state_machine_result(&mut self.state, "BuildTask", |state| {
            state.tick(&mut self.context, &mut tick_context)
        })?;

        let after = self.state.status();

        if before != after {
            debug!("Build task {:?} {:?} -> {:?}", self.key, before, after);
        }

        match after {
            BuildTaskStatus::Idle => Ok(OperationResult::Success),
            _ => Ok(OperationResult::Running),
        }
    }
}

// ─── Manager ────────────────────────────────────────────────────────────────

/// Owns every build task, keyed by the grid cell of its site, and the index
/// of builders assigned to them.
pub struct ConstructionManager {
    settings: ConstructionSettings,
    tasks: BTreeMap<GridKey, BuildTask>,
    builders: ClaimIndex<GridKey>,
}

impl ConstructionManager {
    pub fn new(settings: ConstructionSettings) -> ConstructionManager {
        ConstructionManager {
            settings,
            tasks: BTreeMap::new(),
            builders: ClaimIndex::default(),
        }
    }

    pub fn settings(&self) -> &ConstructionSettings {
        &self.settings
    }

    pub fn tasks(&self) -> impl Iterator<Item = &BuildTask> {
        self.tasks.values()
    }

    pub fn task(&self, key: GridKey) -> Option<&BuildTask> {
        self.tasks.get(&key)
    }

    pub fn task_of(&self, builder: AgentId) -> Option<GridKey> {
        self.builders.owner_of(builder)
    }

    /// Number of structures currently being worked toward.
    pub fn num_structures_building(&self) -> usize {
        self.tasks.len()
    }

    /// At least `min_structures` task sites hold a finished structure.
    pub fn is_complete(&self, world: &dyn WorldView, min_structures: usize) -> bool {
        let ready = self
            .tasks
            .values()
            .filter(|task| {
                site_structure(world, task.context.position, &self.settings)
                    .map(|structure| structure.has(AgentFlags::READY))
                    .unwrap_or(false)
            })
            .count();

        ready >= min_structures
    }

    fn rebuild_builders(&mut self) {
        let claims: Vec<(AgentId, GridKey)> = self
            .tasks
            .values()
            .filter_map(|task| task.builder.map(|builder| (builder, task.key)))
            .collect();

        self.builders.rebuild(claims);
    }

    pub fn remove_task(&mut self, key: GridKey) -> bool {
        let removed = self.tasks.remove(&key).is_some();

        if removed {
            self.rebuild_builders();
        }

        removed
    }

    /// Reject a second task at an occupied key.
    pub fn insert_task(&mut self, position: Point, structure_type: UnitType, builder: Option<AgentId>, now: u64) -> Result<GridKey, String> {
        let key = position.grid_key();

        if self.tasks.contains_key(&key) {
            return Err(format!("Build task already exists at {:?}", key));
        }

        if let Some(builder) = builder {
            if let Some(owner) = self.builders.owner_of(builder) {
                return Err(format!("Builder {:?} already assigned to {:?}", builder, owner));
            }
        }

        self.tasks.insert(
            key,
            BuildTask {
                key,
                context: BuildTaskContext { structure_type, position },
                builder,
                assigned_at: now,
                state: BuildTaskState::moving(),
            },
        );

        self.rebuild_builders();

        Ok(key)
    }

    /// Drop builders that died or were taken for other work, keeping their
    /// tasks for a replacement. Finished orphaned sites and tasks that never
    /// got a structure are removed.
    pub fn prune(&mut self, world: &dyn WorldView, roles: &RoleRegistry) {
        let now = world.game_loop();

        for task in self.tasks.values_mut() {
            if let Some(builder) = task.builder {
                if world.agent(builder).is_none() || roles.role_of(builder) != Role::ProxyWorker {
                    info!("Builder {:?} lost from build task {:?}, awaiting replacement", builder, task.key);

                    task.builder = None;
                    task.state = BuildTaskState::moving();
                }
            }
        }

        let settings = &self.settings;

        let expired: Vec<GridKey> = self
            .tasks
            .values()
            .filter(|task| task.builder.is_none())
            .filter(|task| match site_structure(world, task.context.position, settings) {
                Some(structure) => structure.has(AgentFlags::READY),
                None => now.saturating_sub(task.assigned_at) > settings.abandon_after,
            })
            .map(|task| task.key)
            .collect();

        for key in expired {
            info!("Build task {:?} has no builder and nothing left to finish, removing", key);

            self.tasks.remove(&key);
        }

        self.rebuild_builders();
    }

    /// Advance every task with a live builder by one evaluation.
    pub fn run_tasks(&mut self, world: &dyn WorldView, directives: &mut DirectiveQueue, cleanup: &mut CleanupQueue) {
        for task in self.tasks.values_mut() {
            let builder = match task.builder.and_then(|builder| world.agent(builder)) {
                Some(builder) => builder,
                None => continue,
            };

            match task.run_task(world, directives, &self.settings, builder) {
                Ok(OperationResult::Running) => {}
                Ok(OperationResult::Success) => {
                    info!("Build task {:?} complete, releasing builder {:?}", task.key, builder.id);

                    cleanup.delete_build_task(BuildTaskCleanup {
                        key: task.key,
                        handbacks: vec![Handback {
                            agent: builder.id,
                            role: Role::Gathering,
                        }],
                    });
                }
                Err(reason) => {
                    warn!("Build task {:?} failed: {}", task.key, reason);

                    cleanup.delete_build_task(BuildTaskCleanup {
                        key: task.key,
                        handbacks: vec![Handback {
                            agent: builder.id,
                            role: Role::Gathering,
                        }],
                    });
                }
            }
        }
    }

    /// Keep exactly `pool_size` agents in the builder role. Extra builders
    /// furthest from the area go back to gathering; one missing slot per
    /// tick is filled by the closest gathering worker.
    pub fn maintain_pool(&mut self, world: &dyn WorldView, roles: &mut RoleRegistry, request: &ConstructionRequest) {
        let pool: Vec<&AgentSnapshot> = roles
            .agents_with_role(Role::ProxyWorker)
            .into_iter()
            .filter_map(|agent| world.agent(agent))
            .collect();

        let pool_size = self.settings.pool_size;

        if pool.len() > pool_size {
            let excess = pool.len() - pool_size;

            let released: Vec<AgentId> = pool
                .into_iter()
                .sorted_by(|a, b| {
                    let a_distance = a.position.distance_squared_to(request.area);
                    let b_distance = b.position.distance_squared_to(request.area);

                    b_distance.partial_cmp(&a_distance).unwrap_or(std::cmp::Ordering::Equal)
                })
                .take(excess)
                .map(|agent| agent.id)
                .collect();

            for agent in released {
                debug!("Releasing surplus builder {:?}", agent);

                roles.assign(agent, Role::Gathering);

                if let Some(key) = self.builders.owner_of(agent) {
                    if let Some(task) = self.tasks.get_mut(&key) {
                        task.builder = None;
                        task.state = BuildTaskState::moving();
                    }
                }
            }

            self.rebuild_builders();
        } else if pool.len() < pool_size {
            let recruit = roles
                .agents_with_role(Role::Gathering)
                .into_iter()
                .filter_map(|agent| world.agent(agent))
                .filter(|agent| agent.has(AgentFlags::WORKER))
                .find_nearest_linear(request.area);

            if let Some(recruit) = recruit {
                debug!("Recruiting builder {:?}", recruit.id);

                roles.assign(recruit.id, Role::ProxyWorker);
            }
        }
    }

    /// Structures of the requested type around the area plus planned sites
    /// that have no structure yet.
    fn counted_structures(&self, world: &dyn WorldView, request: &ConstructionRequest) -> usize {
        let started = world
            .agents_in_range(request.area, self.settings.count_radius, QueryFilter::ALL_FRIENDLY)
            .into_iter()
            .filter(|agent| agent.is_structure() && agent.unit_type == request.structure_type)
            .count();

        let planned = self
            .tasks
            .values()
            .filter(|task| task.context.structure_type == request.structure_type)
            .filter(|task| site_structure(world, task.context.position, &self.settings).is_none())
            .count();

        started + planned
    }

    /// Hand idle builders to tasks missing one, then open new tasks while
    /// under the requested cap.
    pub fn assign_builders(&mut self, world: &dyn WorldView, roles: &RoleRegistry, request: Option<&ConstructionRequest>) {
        let now = world.game_loop();

        let mut idle: Vec<AgentId> = roles
            .agents_with_role(Role::ProxyWorker)
            .into_iter()
            .filter(|agent| world.agent(*agent).is_some())
            .filter(|agent| !self.builders.is_claimed(*agent))
            .collect();

        idle.reverse();

        for task in self.tasks.values_mut().filter(|task| task.builder.is_none()) {
            let builder = match idle.pop() {
                Some(builder) => builder,
                None => break,
            };

            info!("Builder {:?} resuming build task {:?}", builder, task.key);

            task.builder = Some(builder);
            task.state = BuildTaskState::moving();
            task.assigned_at = now;
        }

        self.rebuild_builders();

        let request = match request {
            Some(request) => request,
            None => return,
        };

        while let Some(builder) = idle.pop() {
            if self.counted_structures(world, request) >= request.max_structures {
                break;
            }

            let placement = match world.request_building_placement(request.area, request.structure_type) {
                Some(placement) => placement,
                None => break,
            };

            match self.insert_task(placement, request.structure_type, Some(builder), now) {
                Ok(key) => info!("Build task {:?} created for builder {:?}", key, builder),
                Err(err) => warn!("Build task rejected: {}", err),
            }
        }
    }
}
