use crate::agent::*;
use crate::cleanup::*;
use crate::directives::*;
use crate::features::*;
use crate::military::engagement::*;
use crate::military::squad::*;
use crate::operations::construction::*;
use crate::operations::drop::*;
use crate::roles::*;
use crate::world::*;
use log::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Caller-supplied situation for one tick.
#[derive(Clone, Debug, Default)]
pub struct TickInput {
    pub squads: Vec<Squad>,
    pub attack_target: Point,
    /// Candidate drop destinations, usually enemy bases.
    pub drop_candidates: Vec<Point>,
    pub map_centre: Point,
    /// Where diverted drop payload goes to heal.
    pub healing_spot: Option<Point>,
    pub construction: Option<ConstructionRequest>,
    /// Small raiding groups, judged with the one-shot skirmish verdict.
    pub harass_squads: Vec<Squad>,
    pub harass_target: Point,
}

/// Everything decided in one tick, ready for the command layer.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TickOutput {
    pub tick: u64,
    pub role_changes: Vec<RoleChange>,
    pub directives: BTreeMap<AgentId, Vec<Directive>>,
    pub squads: Vec<SquadOrder>,
    /// Orders for raiding groups that still have a harassing member.
    pub harass: Vec<SquadOrder>,
}

impl TickOutput {
    pub fn directives_for(&self, agent: AgentId) -> &[Directive] {
        self.directives.get(&agent).map(|bundle| bundle.as_slice()).unwrap_or(&[])
    }
}

pub struct TacticalOrchestrator {
    roles: RoleRegistry,
    engagement: EngagementTracker,
    drops: DropManager,
    construction: ConstructionManager,
    harass: HarassSettings,
}

impl TacticalOrchestrator {
    pub fn new(features: Features) -> Result<TacticalOrchestrator, String> {
        features.validate()?;

        Ok(TacticalOrchestrator {
            roles: RoleRegistry::new(),
            engagement: EngagementTracker::new(features.engagement)?,
            drops: DropManager::new(features.drops),
            construction: ConstructionManager::new(features.construction),
            harass: features.harass,
        })
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    /// Direct access for the caller to register agents or hand out roles
    /// outside the tactical layer. Changes show up in the next tick output.
    pub fn roles_mut(&mut self) -> &mut RoleRegistry {
        &mut self.roles
    }

    pub fn engagement(&self) -> &EngagementTracker {
        &self.engagement
    }

    pub fn drops(&self) -> &DropManager {
        &self.drops
    }

    pub fn construction(&self) -> &ConstructionManager {
        &self.construction
    }

    /// Run one full reconciliation pass.
    pub fn tick(&mut self, world: &dyn WorldView, input: &TickInput) -> TickOutput {
        let now = world.game_loop();

        trace!("Tactical tick {}", now);

        let mut directives = DirectiveQueue::new();
        let mut cleanup = CleanupQueue::default();

        //
        // Drop everything that no longer resolves.
        //

        self.roles.prune(world);
        self.construction.prune(world, &self.roles);

        //
        // Engagement decisions for every observed squad.
        //

        self.engagement.begin_tick();

        let squads: Vec<SquadOrder> = input
            .squads
            .iter()
            .map(|squad| SquadOrder {
                squad: squad.id,
                engaged: self.engagement.evaluate(world, &self.roles, squad),
                target: squad_destination(squad, &input.squads, input.attack_target),
            })
            .collect();

        self.engagement.end_tick();

        let harass: Vec<SquadOrder> = input
            .harass_squads
            .iter()
            .filter_map(|squad| {
                let engaged = skirmish_verdict(world, &self.roles, &self.harass, squad)?;

                Some(SquadOrder {
                    squad: squad.id,
                    engaged,
                    target: input.harass_target,
                })
            })
            .collect();

        //
        // One evaluation per operation and task.
        //

        self.drops
            .run_operations(world, &mut self.roles, &mut directives, &mut cleanup, input.healing_spot);

        self.construction.run_tasks(world, &mut directives, &mut cleanup);

        process_cleanup(&mut cleanup, world, &mut self.roles, &mut self.drops, &mut self.construction);

        //
        // New work.
        //

        self.drops.sweep_orphans(&mut self.roles);
        self.drops
            .create_operations(world, &mut self.roles, &input.drop_candidates, input.map_centre);

        if let Some(request) = &input.construction {
            self.construction.maintain_pool(world, &mut self.roles, request);
        }

        self.construction
            .assign_builders(world, &self.roles, input.construction.as_ref());

        TickOutput {
            tick: now,
            role_changes: self.roles.drain_changes(),
            directives: directives.into_inner(),
            squads,
            harass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testworld::*;

    const MARINE: UnitType = UnitType(48);
    const SCV: UnitType = UnitType(45);
    const BARRACKS: UnitType = UnitType(21);
    const MEDIVAC: UnitType = UnitType(54);
    const REAPER: UnitType = UnitType(49);

    fn squad_at(world: &mut TestWorld, id: u64, centroid: Point) -> Squad {
        world.add_friendly(AgentId(id * 100), MARINE, centroid);

        Squad {
            id: SquadId(id),
            centroid,
            members: vec![AgentId(id * 100)],
            main_squad: true,
        }
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let mut features = Features::default();
        features.engagement.engage_threshold = EngagementResult::LossClose;

        assert!(TacticalOrchestrator::new(features).is_err());
    }

    #[test]
    fn oscillating_classifier_flips_once() {
        let mut world = TestWorld::new();
        let mut orchestrator = TacticalOrchestrator::new(Features::default()).unwrap();

        let centre = Point::new(20.0, 20.0);
        let input = TickInput {
            squads: vec![squad_at(&mut world, 1, centre)],
            attack_target: Point::new(90.0, 90.0),
            ..TickInput::default()
        };

        world.add_hostile(AgentId(900), MARINE, Point::new(25.0, 20.0));

        let mut flips = 0;
        let mut engaged = false;

        for tick in 0..20 {
            world.outcome = Some(if tick % 2 == 0 {
                EngagementResult::VictoryClose
            } else {
                EngagementResult::Tie
            });

            let output = orchestrator.tick(&world, &input);

            if output.squads[0].engaged != engaged {
                flips += 1;
                engaged = output.squads[0].engaged;
            }

            assert_eq!(output.squads[0].target, Point::new(90.0, 90.0));

            world.advance(1);
        }

        assert_eq!(flips, 1);
        assert!(engaged);
    }

    #[test]
    fn squads_with_nothing_nearby_stay_disengaged() {
        let mut world = TestWorld::new();
        let mut orchestrator = TacticalOrchestrator::new(Features::default()).unwrap();

        world.outcome = Some(EngagementResult::VictoryEmphatic);

        let input = TickInput {
            squads: vec![squad_at(&mut world, 1, Point::new(20.0, 20.0))],
            ..TickInput::default()
        };

        let output = orchestrator.tick(&world, &input);

        assert!(!output.squads[0].engaged);
    }

    #[test]
    fn raiding_groups_get_a_skirmish_verdict() {
        let mut features = Features::default();
        features.harass.matched_types = vec![MARINE];

        let mut world = TestWorld::new();
        let mut orchestrator = TacticalOrchestrator::new(features).unwrap();

        world.outcome = Some(EngagementResult::LossDecisive);

        for id in 1..3 {
            world.add_friendly(AgentId(id), REAPER, Point::new(60.0, 60.0));
            orchestrator.roles_mut().assign(AgentId(id), Role::Harassing);
        }

        world.add_friendly(AgentId(3), REAPER, Point::new(10.0, 10.0));
        orchestrator.roles_mut().assign(AgentId(3), Role::Attacking);

        world.add_hostile(AgentId(900), MARINE, Point::new(65.0, 60.0));
        world.add_hostile(AgentId(901), MARINE, Point::new(65.0, 61.0));

        let raid = |id: u64, centroid: Point, members: Vec<AgentId>| Squad {
            id: SquadId(id),
            centroid,
            members,
            main_squad: false,
        };

        let input = TickInput {
            harass_squads: vec![
                raid(1, Point::new(60.0, 60.0), vec![AgentId(1), AgentId(2)]),
                raid(2, Point::new(10.0, 10.0), vec![AgentId(3)]),
            ],
            harass_target: Point::new(80.0, 80.0),
            ..TickInput::default()
        };

        let output = orchestrator.tick(&world, &input);

        assert_eq!(
            output.harass,
            vec![SquadOrder {
                squad: SquadId(1),
                engaged: true,
                target: Point::new(80.0, 80.0),
            }]
        );

        world.remove(AgentId(2));
        world.advance(1);

        let output = orchestrator.tick(&world, &input);

        assert_eq!(output.harass.len(), 1);
        assert!(!output.harass[0].engaged);
        assert!(output.squads.is_empty());
    }

    #[test]
    fn every_tracked_agent_has_one_role() {
        let mut world = TestWorld::new();
        let mut orchestrator = TacticalOrchestrator::new(Features::default()).unwrap();

        world.add_friendly(AgentId(1), MARINE, Point::default());
        world.add_friendly(AgentId(2), MARINE, Point::default());

        orchestrator.roles_mut().assign(AgentId(1), Role::Attacking);
        orchestrator.roles_mut().assign(AgentId(1), Role::Defending);
        orchestrator.roles_mut().track(AgentId(2));

        let output = orchestrator.tick(&world, &TickInput::default());

        assert_eq!(orchestrator.roles().role_of(AgentId(1)), Role::Defending);
        assert_eq!(orchestrator.roles().agents_with_any_role(RoleFlags::all()).len(), 2);
        assert_eq!(output.role_changes.len(), 2);
        assert_eq!(output.role_changes[1].to, Role::Defending);

        world.remove(AgentId(2));
        orchestrator.tick(&world, &TickInput::default());

        assert!(!orchestrator.roles().is_tracked(AgentId(2)));
        assert_eq!(orchestrator.roles().len(), 1);
    }

    fn drop_features() -> Features {
        let mut features = Features::default();

        features.drops.carrier_types = vec![MEDIVAC];
        features.drops.payload_types = vec![MARINE];

        features
    }

    #[test]
    fn wiped_payload_returns_carrier_to_fallback() {
        let mut world = TestWorld::new();
        let mut orchestrator = TacticalOrchestrator::new(drop_features()).unwrap();

        world.add_friendly(AgentId(1), MEDIVAC, Point::new(10.0, 10.0));
        orchestrator.roles_mut().assign(AgentId(1), Role::Attacking);

        for id in 10..14 {
            world.add_friendly(AgentId(id), MARINE, Point::new(11.0, 10.0));
            orchestrator.roles_mut().assign(AgentId(id), Role::Attacking);
        }

        let input = TickInput {
            drop_candidates: vec![Point::new(100.0, 100.0)],
            map_centre: Point::new(50.0, 50.0),
            ..TickInput::default()
        };

        let output = orchestrator.tick(&world, &input);

        assert_eq!(orchestrator.drops().len(), 1);
        assert!(output
            .role_changes
            .contains(&RoleChange {
                agent: AgentId(1),
                from: Role::Attacking,
                to: Role::DropShip,
            }));

        world.advance(1);

        for id in 10..14 {
            world.remove(AgentId(id));
        }

        let output = orchestrator.tick(&world, &input);

        assert!(orchestrator.drops().is_empty());
        assert_eq!(orchestrator.roles().role_of(AgentId(1)), Role::Attacking);
        assert_eq!(
            output.role_changes,
            vec![RoleChange {
                agent: AgentId(1),
                from: Role::DropShip,
                to: Role::Attacking,
            }]
        );
    }

    #[test]
    fn single_payload_is_claimed_once() {
        let mut features = drop_features();
        features.drops.payload_size = 1;
        features.drops.max_operations = 2;

        let mut world = TestWorld::new();
        let mut orchestrator = TacticalOrchestrator::new(features).unwrap();

        for id in 1..3 {
            world.add_friendly(AgentId(id), MEDIVAC, Point::new(10.0, 10.0));
            orchestrator.roles_mut().assign(AgentId(id), Role::Attacking);
        }

        world.add_friendly(AgentId(10), MARINE, Point::new(11.0, 10.0));
        orchestrator.roles_mut().assign(AgentId(10), Role::Attacking);

        let input = TickInput {
            drop_candidates: vec![Point::new(100.0, 100.0), Point::new(0.0, 100.0)],
            map_centre: Point::new(50.0, 50.0),
            ..TickInput::default()
        };

        orchestrator.tick(&world, &input);

        assert_eq!(orchestrator.drops().len(), 1);
        assert_eq!(orchestrator.roles().count_with_role(Role::DropShip), 1);
        assert_eq!(orchestrator.roles().role_of(AgentId(2)), Role::Attacking);
    }

    #[test]
    fn lost_builder_is_replaced_next_tick() {
        let mut world = TestWorld::new();
        let mut orchestrator = TacticalOrchestrator::new(Features::default()).unwrap();

        let site = Point::new(40.0, 40.0);

        world.add_friendly(AgentId(1), SCV, Point::new(39.0, 40.0)).flags |= AgentFlags::WORKER;
        world.add_friendly(AgentId(2), SCV, Point::new(5.0, 5.0)).flags |= AgentFlags::WORKER;
        orchestrator.roles_mut().track(AgentId(1));
        orchestrator.roles_mut().track(AgentId(2));

        let input = TickInput {
            construction: Some(ConstructionRequest {
                area: site,
                structure_type: BARRACKS,
                max_structures: 1,
            }),
            ..TickInput::default()
        };

        // Recruit and plan, then start the structure.
        orchestrator.tick(&world, &input);
        world.advance(1);

        let output = orchestrator.tick(&world, &input);
        world.advance(1);

        assert!(matches!(output.directives_for(AgentId(1))[0], Directive::Build { .. }));

        world.add_friendly(AgentId(50), BARRACKS, site).flags = AgentFlags::STRUCTURE;
        world.remove(AgentId(1));

        orchestrator.tick(&world, &input);

        let task = orchestrator.construction().tasks().next().unwrap();

        assert_eq!(task.builder(), Some(AgentId(2)));
        assert_eq!(task.status(), BuildTaskStatus::Moving);
        assert_eq!(orchestrator.construction().num_structures_building(), 1);
    }

    #[test]
    fn output_serializes_to_json() {
        let mut world = TestWorld::new();
        let mut orchestrator = TacticalOrchestrator::new(Features::default()).unwrap();

        world.add_friendly(AgentId(1), MARINE, Point::default());
        orchestrator.roles_mut().assign(AgentId(1), Role::Harassing);

        let output = orchestrator.tick(&world, &TickInput::default());
        let json = serde_json::to_string(&output).unwrap();

        assert!(json.contains("Harassing"));
    }
}
