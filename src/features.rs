use crate::agent::*;
use crate::roles::*;
use crate::world::*;
use serde::{Deserialize, Serialize};

/// Whole game loops in `seconds` of game time, truncated.
pub const fn seconds_to_loops(seconds: u32) -> u64 {
    (seconds as u64 * 224) / 10
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub engagement: EngagementSettings,
    pub drops: DropSettings,
    pub construction: ConstructionSettings,
    pub harass: HarassSettings,
}

impl Features {
    pub fn from_json(data: &str) -> Result<Features, String> {
        let features: Features = serde_json::from_str(data).map_err(|err| format!("Failed to parse features: {}", err))?;

        features.validate()?;

        Ok(features)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.engagement.validate()?;
        self.drops.validate()?;
        self.construction.validate()?;
        self.harass.validate()?;

        Ok(())
    }
}

fn ensure_positive(name: &str, value: f32) -> Result<(), String> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(format!("{} must be positive, got {}", name, value))
    }
}

fn ensure_fraction(name: &str, value: f32) -> Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{} must be within 0..=1, got {}", name, value))
    }
}

// ─── Engagement ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementSettings {
    /// A disengaged squad commits once the outcome is at least this good.
    pub engage_threshold: EngagementResult,
    /// An engaged squad breaks off once the outcome is this bad or worse.
    pub disengage_threshold: EngagementResult,
    pub detection_radius: f32,
    /// Hostiles this close to a friendly siege agent force an engagement.
    pub siege_protect_radius: f32,
    /// Friendlies counted around the hostile centroid.
    pub friendly_radius: f32,
    /// Roles whose agents count as own combatants.
    pub combat_roles: Vec<Role>,
}

impl Default for EngagementSettings {
    fn default() -> Self {
        EngagementSettings {
            engage_threshold: EngagementResult::VictoryClose,
            disengage_threshold: EngagementResult::LossMarginal,
            detection_radius: 25.5,
            siege_protect_radius: 8.5,
            friendly_radius: 15.5,
            combat_roles: vec![Role::Attacking],
        }
    }
}

impl EngagementSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.engage_threshold <= self.disengage_threshold {
            return Err(format!(
                "Engage threshold {:?} must be strictly better than disengage threshold {:?}",
                self.engage_threshold, self.disengage_threshold
            ));
        }

        ensure_positive("engagement.detection_radius", self.detection_radius)?;
        ensure_positive("engagement.siege_protect_radius", self.siege_protect_radius)?;
        ensure_positive("engagement.friendly_radius", self.friendly_radius)?;

        Ok(())
    }

    pub fn combat_role_flags(&self) -> RoleFlags {
        self.combat_roles.iter().fold(RoleFlags::NONE, |flags, role| flags | role.flag())
    }
}

// ─── Drops ──────────────────────────────────────────────────────────────────

/// Healing side-trip for drops whose payload is worth preserving.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DivertSettings {
    /// Loaded carrier at or below this health heads home.
    pub carrier_health: f32,
    /// Any payload member at or below this health heads home.
    pub payload_health: f32,
}

impl Default for DivertSettings {
    fn default() -> Self {
        DivertSettings {
            carrier_health: 0.25,
            payload_health: 0.4,
        }
    }
}

/// Unload on the spot when the carrier is undetected and enough enemy
/// units are close by, unless a sieged tank covers them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyDropSettings {
    pub radius: f32,
    pub min_supply: f32,
}

impl Default for EarlyDropSettings {
    fn default() -> Self {
        EarlyDropSettings {
            radius: 9.0,
            min_supply: 3.0,
        }
    }
}

/// Unload on the spot as soon as the carrier comes under threat over
/// pathable ground.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UnderFireSettings {
    pub air_radius: f32,
    pub ground_radius: f32,
}

impl Default for UnderFireSettings {
    fn default() -> Self {
        UnderFireSettings {
            air_radius: 11.0,
            ground_radius: 7.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DropSettings {
    /// Agent types able to carry the payload. Empty disables drop creation.
    pub carrier_types: Vec<UnitType>,
    pub payload_types: Vec<UnitType>,
    pub payload_size: usize,
    pub max_operations: usize,
    /// Roles carriers and payload may be taken from.
    pub steal_from: Vec<Role>,
    /// Role agents are handed back to when an operation ends.
    pub fallback_role: Role,
    /// Payload ability gated by the readiness check.
    pub payload_ability: Option<AbilityId>,
    pub carrier_boost_ability: Option<AbilityId>,
    /// Release once every passenger's ability is within this many loops of ready.
    pub readiness_lead: u64,
    pub emergency_health: f32,
    pub arrival_distance: f32,
    /// Distance the chosen target is pushed past the candidate, away from the map centre.
    pub target_offset: f32,
    pub cluster_min: usize,
    pub cluster_radius: f32,
    pub safe_spot_radius: f32,
    /// Released payload with its ability cooling down is picked back up.
    pub reload_on_cooldown: bool,
    pub divert: Option<DivertSettings>,
    pub early_drop: Option<EarlyDropSettings>,
    pub drop_under_fire: Option<UnderFireSettings>,
}

impl Default for DropSettings {
    fn default() -> Self {
        DropSettings {
            carrier_types: Vec::new(),
            payload_types: Vec::new(),
            payload_size: 4,
            max_operations: 1,
            steal_from: vec![Role::Attacking, Role::Defending],
            fallback_role: Role::Attacking,
            payload_ability: None,
            carrier_boost_ability: None,
            readiness_lead: seconds_to_loops(7),
            emergency_health: 0.3,
            arrival_distance: 4.0,
            target_offset: 4.0,
            cluster_min: 6,
            cluster_radius: 8.5,
            safe_spot_radius: 12.0,
            reload_on_cooldown: true,
            divert: None,
            early_drop: None,
            drop_under_fire: None,
        }
    }
}

impl DropSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.payload_size == 0 {
            return Err("drops.payload_size must be at least 1".to_string());
        }

        ensure_fraction("drops.emergency_health", self.emergency_health)?;
        ensure_positive("drops.arrival_distance", self.arrival_distance)?;
        ensure_positive("drops.cluster_radius", self.cluster_radius)?;
        ensure_positive("drops.safe_spot_radius", self.safe_spot_radius)?;

        if let Some(divert) = &self.divert {
            ensure_fraction("drops.divert.carrier_health", divert.carrier_health)?;
            ensure_fraction("drops.divert.payload_health", divert.payload_health)?;
        }

        if let Some(early_drop) = &self.early_drop {
            ensure_positive("drops.early_drop.radius", early_drop.radius)?;
        }

        if let Some(under_fire) = &self.drop_under_fire {
            ensure_positive("drops.drop_under_fire.air_radius", under_fire.air_radius)?;
            ensure_positive("drops.drop_under_fire.ground_radius", under_fire.ground_radius)?;
        }

        Ok(())
    }

    pub fn steal_from_flags(&self) -> RoleFlags {
        self.steal_from.iter().fold(RoleFlags::NONE, |flags, role| flags | role.flag())
    }
}

// ─── Construction ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionSettings {
    /// A structure closer than this to a task position occupies the site.
    pub site_radius: f32,
    pub build_range: f32,
    pub threat_radius: f32,
    pub defend_radius: f32,
    /// A defending builder further than this from the site returns to it.
    pub leash_distance: f32,
    /// Tasks with neither structure nor builder are dropped after this many loops.
    pub abandon_after: u64,
    /// Structures within this radius of a request's area count toward its cap.
    pub count_radius: f32,
    pub pool_size: usize,
}

impl Default for ConstructionSettings {
    fn default() -> Self {
        ConstructionSettings {
            site_radius: 3.0,
            build_range: 5.0,
            threat_radius: 9.0,
            defend_radius: 11.0,
            leash_distance: 10.0,
            abandon_after: seconds_to_loops(30),
            count_radius: 25.0,
            pool_size: 1,
        }
    }
}

impl ConstructionSettings {
    pub fn validate(&self) -> Result<(), String> {
        ensure_positive("construction.site_radius", self.site_radius)?;
        ensure_positive("construction.build_range", self.build_range)?;
        ensure_positive("construction.threat_radius", self.threat_radius)?;
        ensure_positive("construction.defend_radius", self.defend_radius)?;
        ensure_positive("construction.leash_distance", self.leash_distance)?;
        ensure_positive("construction.count_radius", self.count_radius)?;

        Ok(())
    }
}

// ─── Harassment ─────────────────────────────────────────────────────────────

/// One-shot fight verdicts for small raiding groups.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HarassSettings {
    /// Hostiles this close to a group are its threats.
    pub threat_radius: f32,
    /// Own non-worker agents this close to a group fight alongside it.
    pub support_radius: f32,
    /// Fight when every threat is one of these.
    pub weak_types: Vec<UnitType>,
    /// Fight when the number of these threats is positive and no larger
    /// than the group.
    pub matched_types: Vec<UnitType>,
}

impl Default for HarassSettings {
    fn default() -> Self {
        HarassSettings {
            threat_radius: 12.0,
            support_radius: 10.0,
            weak_types: Vec::new(),
            matched_types: Vec::new(),
        }
    }
}

impl HarassSettings {
    pub fn validate(&self) -> Result<(), String> {
        ensure_positive("harass.threat_radius", self.threat_radius)?;
        ensure_positive("harass.support_radius", self.support_radius)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Features::default().validate().is_ok());
        assert_eq!(DropSettings::default().readiness_lead, 156);
        assert_eq!(ConstructionSettings::default().abandon_after, 672);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let features = Features::from_json(r#"{ "drops": { "payload_size": 2 } }"#).unwrap();

        assert_eq!(features.drops.payload_size, 2);
        assert_eq!(features.drops.max_operations, 1);
        assert_eq!(features.engagement.engage_threshold, EngagementResult::VictoryClose);
    }

    #[test]
    fn thresholds_without_a_band_are_rejected() {
        let result = Features::from_json(r#"{ "engagement": { "engage_threshold": "Tie", "disengage_threshold": "Tie" } }"#);

        assert!(result.is_err());
    }

    #[test]
    fn zero_payload_is_rejected() {
        assert!(Features::from_json(r#"{ "drops": { "payload_size": 0 } }"#).is_err());
    }

    #[test]
    fn negative_radius_is_rejected() {
        assert!(Features::from_json(r#"{ "construction": { "defend_radius": -1.0 } }"#).is_err());
    }

    #[test]
    fn optional_drop_rules_take_defaults_when_named() {
        let features = Features::from_json(r#"{ "drops": { "early_drop": {}, "drop_under_fire": { "ground_radius": 5.0 } } }"#).unwrap();

        assert_eq!(features.drops.early_drop.map(|early| early.min_supply), Some(3.0));
        assert_eq!(features.drops.drop_under_fire.map(|fire| (fire.air_radius, fire.ground_radius)), Some((11.0, 5.0)));
        assert!(Features::from_json(r#"{ "drops": { "early_drop": { "radius": 0.0 } } }"#).is_err());
    }

    #[test]
    fn combat_roles_become_flags() {
        let features = Features::from_json(r#"{ "engagement": { "combat_roles": ["Attacking", "Defending"] } }"#).unwrap();

        assert_eq!(features.engagement.combat_role_flags(), RoleFlags::ARMY);
        assert_eq!(EngagementSettings::default().combat_role_flags(), RoleFlags::ATTACKING);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Features::from_json("{ drops: ").is_err());
    }
}
