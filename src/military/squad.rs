use crate::agent::*;
use serde::{Deserialize, Serialize};

/// Stable key of a squad across ticks, assigned by whoever groups agents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SquadId(pub u64);

/// Proximity grouping of friendly agents for one tick.
#[derive(Clone, Debug)]
pub struct Squad {
    pub id: SquadId,
    pub centroid: Point,
    pub members: Vec<AgentId>,
    /// The largest group; other squads regroup on it.
    pub main_squad: bool,
}

/// Per-squad decision handed to the command layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SquadOrder {
    pub squad: SquadId,
    pub engaged: bool,
    /// Where the squad should head this tick.
    pub target: Point,
}

/// Where each squad should go. The main squad heads for the attack target;
/// every other squad regroups on the main squad.
pub fn squad_destination(squad: &Squad, squads: &[Squad], attack_target: Point) -> Point {
    if squad.main_squad {
        return attack_target;
    }

    squads
        .iter()
        .find(|other| other.main_squad && other.id != squad.id)
        .map(|main| main.centroid)
        .unwrap_or(attack_target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squad(id: u64, centroid: Point, main_squad: bool) -> Squad {
        Squad {
            id: SquadId(id),
            centroid,
            members: vec![AgentId(id * 10)],
            main_squad,
        }
    }

    #[test]
    fn stragglers_regroup_on_main_squad() {
        let squads = vec![squad(1, Point::new(10.0, 10.0), true), squad(2, Point::new(50.0, 50.0), false)];
        let target = Point::new(100.0, 100.0);

        assert_eq!(squad_destination(&squads[0], &squads, target), target);
        assert_eq!(squad_destination(&squads[1], &squads, target), Point::new(10.0, 10.0));
    }

    #[test]
    fn without_main_squad_everyone_attacks() {
        let squads = vec![squad(2, Point::new(50.0, 50.0), false)];
        let target = Point::new(100.0, 100.0);

        assert_eq!(squad_destination(&squads[0], &squads, target), target);
    }
}
