#![warn(clippy::all)]

pub mod agent;
pub mod cleanup;
pub mod directives;
pub mod features;
pub mod findnearest;
pub mod logging;
pub mod machine_tick;
pub mod military;
pub mod operations;
pub mod orchestrator;
pub mod roles;
pub mod world;

#[cfg(test)]
mod testworld;

pub use agent::{AbilityId, AgentFlags, AgentId, AgentSnapshot, GridKey, Point, UnitType};
pub use directives::Directive;
pub use features::Features;
pub use military::squad::{Squad, SquadId, SquadOrder};
pub use operations::construction::ConstructionRequest;
pub use orchestrator::{TacticalOrchestrator, TickInput, TickOutput};
pub use roles::{Role, RoleChange, RoleRegistry};
pub use world::{EngagementResult, GridKind, QueryFilter, WorldView, WorldViewExt};
