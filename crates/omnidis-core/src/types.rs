//! Core identity types shared by every PDU an exercise participant emits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wildcard site number addressing every site (IEEE 1278.1 §5.1.4).
pub const ALL_SITES: u16 = 0xFFFF;
/// Wildcard application number addressing every application.
pub const ALL_APPLIC: u16 = 0xFFFF;
/// Wildcard entity number addressing every entity.
pub const ALL_ENTITIES: u16 = 0xFFFF;
/// Reserved "no site" value.
pub const NO_SITE: u16 = 0;
/// Reserved "no application" value.
pub const NO_APPLIC: u16 = 0;
/// Reserved "no entity" value.
pub const NO_ENTITY: u16 = 0;
/// Reserved "no exercise" value.
pub const NO_EXERCISE: u8 = 0;

/// Globally unique identifier of a simulated object within an exercise.
///
/// # Examples
///
/// ```
/// use omnidis_core::types::EntityId;
///
/// let id = EntityId::new(1, 1, 42);
/// assert_eq!(id.to_string(), "1:1:42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub site: u16,
    pub application: u16,
    pub entity: u16,
}

impl EntityId {
    /// Creates a new entity identifier.
    pub fn new(site: u16, application: u16, entity: u16) -> Self {
        Self {
            site,
            application,
            entity,
        }
    }

    /// Identifier addressing every entity of every application on every site.
    pub fn all() -> Self {
        Self::new(ALL_SITES, ALL_APPLIC, ALL_ENTITIES)
    }

    /// Returns true if any component is a wildcard.
    pub fn is_broadcast(&self) -> bool {
        self.site == ALL_SITES || self.application == ALL_APPLIC || self.entity == ALL_ENTITIES
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.site, self.application, self.entity)
    }
}

/// The (site, application, exercise) triple stamped on every PDU of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExerciseIdentity {
    pub site_id: u16,
    pub application_id: u16,
    pub exercise_id: u8,
}

impl ExerciseIdentity {
    /// Returns true if any field carries the reserved zero value.
    pub fn uses_reserved_values(&self) -> bool {
        self.site_id == NO_SITE || self.application_id == NO_APPLIC || self.exercise_id == NO_EXERCISE
    }

    /// Entity id used as originator of simulation management PDUs.
    pub fn simulation_manager(&self) -> EntityId {
        EntityId::new(self.site_id, self.application_id, NO_ENTITY)
    }

    /// Entity id of a local entity owned by this application.
    pub fn entity(&self, entity: u16) -> EntityId {
        EntityId::new(self.site_id, self.application_id, entity)
    }
}

impl fmt::Display for ExerciseIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "site={} application={} exercise={}",
            self.site_id, self.application_id, self.exercise_id
        )
    }
}

/// How the header timestamp is interpreted by receivers.
///
/// Relative timestamps only order PDUs from one sender; absolute timestamps
/// require the host clock to be synchronised to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampKind {
    #[default]
    Relative,
    Absolute,
}

impl TimestampKind {
    /// Value of the least significant timestamp bit.
    pub fn flag(&self) -> u32 {
        match self {
            TimestampKind::Relative => 0,
            TimestampKind::Absolute => 1,
        }
    }
}

/// Side an entity belongs to in the exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForceId {
    Other,
    #[default]
    Friendly,
    Opposing,
    Neutral,
}

impl ForceId {
    /// DIS enumeration value.
    pub fn code(&self) -> u8 {
        match self {
            ForceId::Other => 0,
            ForceId::Friendly => 1,
            ForceId::Opposing => 2,
            ForceId::Neutral => 3,
        }
    }

    /// Maps a DIS enumeration value back; unknown values become `Other`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ForceId::Friendly,
            2 => ForceId::Opposing,
            3 => ForceId::Neutral,
            _ => ForceId::Other,
        }
    }
}

/// Unit in which the telemetry source reports angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    #[default]
    Radians,
    Degrees,
}

/// Unit in which the telemetry source reports linear speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnit {
    #[default]
    MetersPerSecond,
    Knots,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_display() {
        assert_eq!(EntityId::new(2, 1, 7).to_string(), "2:1:7");
    }

    #[test]
    fn test_broadcast_id() {
        assert!(EntityId::all().is_broadcast());
        assert!(!EntityId::new(1, 1, 1).is_broadcast());
    }

    #[test]
    fn test_reserved_identity() {
        let identity = ExerciseIdentity {
            site_id: 1,
            application_id: 0,
            exercise_id: 1,
        };
        assert!(identity.uses_reserved_values());
        assert_eq!(identity.simulation_manager(), EntityId::new(1, 0, 0));
    }

    #[test]
    fn test_force_id_codes() {
        assert_eq!(ForceId::default().code(), 1);
        assert_eq!(ForceId::from_code(2), ForceId::Opposing);
        assert_eq!(ForceId::from_code(99), ForceId::Other);
    }

    #[test]
    fn test_timestamp_flag() {
        assert_eq!(TimestampKind::default(), TimestampKind::Relative);
        assert_eq!(TimestampKind::Absolute.flag(), 1);
    }
}
