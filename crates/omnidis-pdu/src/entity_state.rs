//! Entity State PDU (type 1, Entity Information family).
//!
//! Layout after the 12-byte header, offsets from the start of the PDU:
//!
//! | offset | size | field                                     |
//! |--------|------|-------------------------------------------|
//! | 12     | 6    | entity id (site, application, entity)     |
//! | 18     | 1    | force id                                  |
//! | 19     | 1    | articulation parameter count (always 0)   |
//! | 20     | 8    | entity type                               |
//! | 28     | 8    | alternative entity type                   |
//! | 36     | 12   | linear velocity, 3 x f32                  |
//! | 48     | 24   | location, 3 x f64 ECEF                    |
//! | 72     | 12   | orientation psi/theta/phi, 3 x f32        |
//! | 84     | 4    | appearance                                |
//! | 88     | 1    | dead-reckoning algorithm                  |
//! | 89     | 15   | other dead-reckoning parameters           |
//! | 104    | 12   | dead-reckoning linear acceleration        |
//! | 116    | 12   | dead-reckoning angular velocity           |
//! | 128    | 1    | marking character set                     |
//! | 129    | 11   | marking characters                        |
//! | 140    | 4    | capabilities                              |

use crate::entity_type::EntityType;
use crate::error::{FrameError, PduError};
use crate::geo::{
    self, AngularVelocityVector, GeocentricPosition, GeodeticPosition, KinematicUnits,
    Orientation, VelocityVector, WorldOrientation,
};
use crate::header::{build_header, PduHeader, PduType, HEADER_LENGTH};
use crate::pdu::EncodedPdu;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use omnidis_core::config::MARKING_CAPACITY;
use omnidis_core::{EntityId, ForceId, SessionContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Total Entity State PDU length, header included
pub const ENTITY_STATE_LENGTH: usize = 144;

const DR_OTHER_PARAMETERS: usize = 15;

/// Marking character set code for ASCII
pub const CHARACTER_SET_ASCII: u8 = 1;

/// Fixed-width ASCII entity label.
///
/// Longer text is truncated to 11 bytes; shorter text is null-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntityMarking {
    characters: [u8; MARKING_CAPACITY],
}

impl EntityMarking {
    /// # Errors
    ///
    /// Returns [`PduError::InvalidMarking`] if `text` contains non-ASCII
    /// characters.
    pub fn new(text: &str) -> Result<Self, PduError> {
        if !text.is_ascii() {
            return Err(PduError::InvalidMarking(format!(
                "{text:?} contains non-ASCII characters"
            )));
        }

        let mut characters = [0u8; MARKING_CAPACITY];
        let len = text.len().min(MARKING_CAPACITY);
        characters[..len].copy_from_slice(&text.as_bytes()[..len]);
        Ok(Self { characters })
    }

    pub fn as_bytes(&self) -> &[u8; MARKING_CAPACITY] {
        &self.characters
    }

    /// Marking text without trailing padding
    pub fn as_str(&self) -> &str {
        let end = self
            .characters
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(MARKING_CAPACITY);
        std::str::from_utf8(&self.characters[..end]).unwrap_or_default()
    }

    fn from_wire(characters: [u8; MARKING_CAPACITY]) -> Self {
        Self { characters }
    }
}

impl fmt::Display for EntityMarking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dead-reckoning algorithm enumeration (IEEE 1278.1 Annex B)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeadReckoningAlgorithm {
    Other,
    Static,
    DrmFpw,
    DrmRpw,
    DrmRvw,
    DrmFvw,
    /// Constant velocity, body-axis rates
    #[default]
    DrmFpb,
    DrmRpb,
    DrmRvb,
    DrmFvb,
}

impl DeadReckoningAlgorithm {
    pub fn code(&self) -> u8 {
        match self {
            DeadReckoningAlgorithm::Other => 0,
            DeadReckoningAlgorithm::Static => 1,
            DeadReckoningAlgorithm::DrmFpw => 2,
            DeadReckoningAlgorithm::DrmRpw => 3,
            DeadReckoningAlgorithm::DrmRvw => 4,
            DeadReckoningAlgorithm::DrmFvw => 5,
            DeadReckoningAlgorithm::DrmFpb => 6,
            DeadReckoningAlgorithm::DrmRpb => 7,
            DeadReckoningAlgorithm::DrmRvb => 8,
            DeadReckoningAlgorithm::DrmFvb => 9,
        }
    }

    /// Unknown codes decode as `Other`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => DeadReckoningAlgorithm::Static,
            2 => DeadReckoningAlgorithm::DrmFpw,
            3 => DeadReckoningAlgorithm::DrmRpw,
            4 => DeadReckoningAlgorithm::DrmRvw,
            5 => DeadReckoningAlgorithm::DrmFvw,
            6 => DeadReckoningAlgorithm::DrmFpb,
            7 => DeadReckoningAlgorithm::DrmRpb,
            8 => DeadReckoningAlgorithm::DrmRvb,
            9 => DeadReckoningAlgorithm::DrmFvb,
            _ => DeadReckoningAlgorithm::Other,
        }
    }
}

/// Static description of the local entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    /// Defaults to `entity_type` when unset
    pub alternative_type: Option<EntityType>,
    pub force: ForceId,
    pub marking: EntityMarking,
    pub dead_reckoning: DeadReckoningAlgorithm,
}

impl EntityDescriptor {
    pub fn new(entity_id: EntityId, entity_type: EntityType, marking: EntityMarking) -> Self {
        Self {
            entity_id,
            entity_type,
            alternative_type: None,
            force: ForceId::default(),
            marking,
            dead_reckoning: DeadReckoningAlgorithm::default(),
        }
    }

    pub fn with_force(mut self, force: ForceId) -> Self {
        self.force = force;
        self
    }

    pub fn with_alternative_type(mut self, alternative: EntityType) -> Self {
        self.alternative_type = Some(alternative);
        self
    }

    pub fn with_dead_reckoning(mut self, algorithm: DeadReckoningAlgorithm) -> Self {
        self.dead_reckoning = algorithm;
        self
    }
}

/// Per-tick kinematic state in SI units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityKinematics {
    pub position: GeodeticPosition,
    pub orientation: Orientation,
    pub velocity: VelocityVector,
    pub angular_velocity: AngularVelocityVector,
}

impl EntityKinematics {
    pub fn new(position: GeodeticPosition, orientation: Orientation, velocity: VelocityVector) -> Self {
        Self {
            position,
            orientation,
            velocity,
            angular_velocity: AngularVelocityVector::default(),
        }
    }

    pub fn with_angular_velocity(mut self, angular_velocity: AngularVelocityVector) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Converts telemetry reported in `units` to SI.
    pub fn normalized(&self, units: &KinematicUnits) -> Self {
        Self {
            position: self.position,
            orientation: units.normalize_orientation(self.orientation),
            velocity: units.normalize_velocity(self.velocity),
            angular_velocity: units.normalize_angular_velocity(self.angular_velocity),
        }
    }

    /// Checks geodetic ranges and that every other component is finite.
    pub fn validate(&self) -> Result<(), PduError> {
        self.position.validate()?;

        let checks: [(&'static str, [f64; 3]); 3] = [
            (
                "orientation",
                [self.orientation.yaw, self.orientation.pitch, self.orientation.roll],
            ),
            ("velocity", [self.velocity.u, self.velocity.v, self.velocity.w]),
            (
                "angular_velocity",
                [
                    self.angular_velocity.yaw_rate,
                    self.angular_velocity.pitch_rate,
                    self.angular_velocity.roll_rate,
                ],
            ),
        ];

        for (name, values) in checks {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(PduError::InvalidKinematics(name));
            }
        }

        Ok(())
    }
}

/// Entity State PDU in wire units
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStatePdu {
    pub header: PduHeader,
    pub entity_id: EntityId,
    pub force_id: u8,
    pub entity_type: EntityType,
    pub alternative_entity_type: EntityType,
    pub linear_velocity: [f32; 3],
    pub location: GeocentricPosition,
    pub orientation: [f32; 3],
    pub appearance: u32,
    pub dead_reckoning_algorithm: DeadReckoningAlgorithm,
    pub dead_reckoning_acceleration: [f32; 3],
    pub dead_reckoning_angular_velocity: [f32; 3],
    pub marking: EntityMarking,
    pub capabilities: u32,
}

impl EntityStatePdu {
    /// Validates and converts the kinematics into a ready-to-serialize PDU.
    ///
    /// # Errors
    ///
    /// Fails on out-of-range position or non-finite kinematic values; no
    /// session state is touched in that case.
    pub fn build(
        descriptor: &EntityDescriptor,
        kinematics: &EntityKinematics,
        session: &SessionContext,
        now: DateTime<Utc>,
    ) -> Result<Self, PduError> {
        kinematics.validate()?;

        let location = geo::geodetic_to_ecef(&kinematics.position)?;
        let world = geo::orientation_to_world(&kinematics.position, &kinematics.orientation);
        let rates = geo::body_rates_to_angular_velocity(&kinematics.angular_velocity);
        let velocity = kinematics.velocity;

        Ok(Self {
            header: build_header(
                PduType::EntityState,
                ENTITY_STATE_LENGTH - HEADER_LENGTH,
                session,
                now,
            ),
            entity_id: descriptor.entity_id,
            force_id: descriptor.force.code(),
            entity_type: descriptor.entity_type,
            alternative_entity_type: descriptor.alternative_type.unwrap_or(descriptor.entity_type),
            linear_velocity: [velocity.u as f32, velocity.v as f32, velocity.w as f32],
            location,
            orientation: [world.psi as f32, world.theta as f32, world.phi as f32],
            appearance: 0,
            dead_reckoning_algorithm: descriptor.dead_reckoning,
            dead_reckoning_acceleration: [0.0; 3],
            dead_reckoning_angular_velocity: [
                rates.yaw_rate as f32,
                rates.pitch_rate as f32,
                rates.roll_rate as f32,
            ],
            marking: descriptor.marking,
            capabilities: 0,
        })
    }

    /// World-frame orientation carried by this PDU.
    pub fn world_orientation(&self) -> WorldOrientation {
        WorldOrientation {
            psi: self.orientation[0] as f64,
            theta: self.orientation[1] as f64,
            phi: self.orientation[2] as f64,
        }
    }

    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        self.header.serialize(buf);

        buf.put_u16(self.entity_id.site);
        buf.put_u16(self.entity_id.application);
        buf.put_u16(self.entity_id.entity);
        buf.put_u8(self.force_id);
        buf.put_u8(0); // articulation parameters

        self.entity_type.serialize(buf);
        self.alternative_entity_type.serialize(buf);

        put_f32x3(buf, &self.linear_velocity);
        buf.put_f64(self.location.x());
        buf.put_f64(self.location.y());
        buf.put_f64(self.location.z());
        put_f32x3(buf, &self.orientation);

        buf.put_u32(self.appearance);

        buf.put_u8(self.dead_reckoning_algorithm.code());
        buf.put_bytes(0, DR_OTHER_PARAMETERS);
        put_f32x3(buf, &self.dead_reckoning_acceleration);
        put_f32x3(buf, &self.dead_reckoning_angular_velocity);

        buf.put_u8(CHARACTER_SET_ASCII);
        buf.put_slice(self.marking.as_bytes());

        buf.put_u32(self.capabilities);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ENTITY_STATE_LENGTH);
        self.serialize(&mut buf);
        debug_assert_eq!(
            buf.len(),
            self.header.length as usize,
            "Entity State declared length disagrees with serialized size"
        );
        buf.freeze()
    }

    /// Parses a complete Entity State PDU.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = PduHeader::parse(bytes)?;
        if header.pdu_type != PduType::EntityState {
            return Err(FrameError::UnknownPduType(header.pdu_type.code()));
        }
        FrameError::ensure_len(bytes, ENTITY_STATE_LENGTH)?;

        let mut buf = &bytes[HEADER_LENGTH..];

        let entity_id = EntityId::new(buf.get_u16(), buf.get_u16(), buf.get_u16());
        let force_id = buf.get_u8();
        let _articulation_count = buf.get_u8();
        let entity_type = EntityType::read(&mut buf);
        let alternative_entity_type = EntityType::read(&mut buf);
        let linear_velocity = get_f32x3(&mut buf);
        let location = GeocentricPosition::from_wire(buf.get_f64(), buf.get_f64(), buf.get_f64());
        let orientation = get_f32x3(&mut buf);
        let appearance = buf.get_u32();

        let dead_reckoning_algorithm = DeadReckoningAlgorithm::from_code(buf.get_u8());
        buf.advance(DR_OTHER_PARAMETERS);
        let dead_reckoning_acceleration = get_f32x3(&mut buf);
        let dead_reckoning_angular_velocity = get_f32x3(&mut buf);

        let _character_set = buf.get_u8();
        let mut characters = [0u8; MARKING_CAPACITY];
        buf.copy_to_slice(&mut characters);
        let capabilities = buf.get_u32();

        trace!(entity = %entity_id, "Decoded Entity State PDU");

        Ok(Self {
            header,
            entity_id,
            force_id,
            entity_type,
            alternative_entity_type,
            linear_velocity,
            location,
            orientation,
            appearance,
            dead_reckoning_algorithm,
            dead_reckoning_acceleration,
            dead_reckoning_angular_velocity,
            marking: EntityMarking::from_wire(characters),
            capabilities,
        })
    }
}

/// Builds and serializes an Entity State PDU, consuming one session
/// sequence number on success.
pub fn encode(
    descriptor: &EntityDescriptor,
    kinematics: &EntityKinematics,
    session: &SessionContext,
    now: DateTime<Utc>,
) -> Result<EncodedPdu, PduError> {
    let pdu = EntityStatePdu::build(descriptor, kinematics, session, now)?;
    let sequence = session.next_sequence();
    Ok(EncodedPdu::new(PduType::EntityState, sequence, pdu.to_bytes()))
}

fn put_f32x3<B: BufMut>(buf: &mut B, values: &[f32; 3]) {
    for v in values {
        buf.put_f32(*v);
    }
}

fn get_f32x3<B: Buf>(buf: &mut B) -> [f32; 3] {
    [buf.get_f32(), buf.get_f32(), buf.get_f32()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_type::GENERIC_SHIP_CONTAINER_CLASS_SMALL;

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(
            EntityId::new(1, 1, 42),
            GENERIC_SHIP_CONTAINER_CLASS_SMALL,
            EntityMarking::new("Hi Reto").unwrap(),
        )
    }

    fn kinematics() -> EntityKinematics {
        EntityKinematics::new(
            GeodeticPosition::new(57.66, 12.44, 0.0),
            Orientation::new(0.3, 0.0, 0.0),
            VelocityVector::new(2.0, 0.0, 0.0),
        )
        .with_angular_velocity(AngularVelocityVector::new(0.01, 0.0, 0.0))
    }

    #[test]
    fn test_marking_padding_and_truncation() {
        let short = EntityMarking::new("Hi Reto").unwrap();
        assert_eq!(short.as_bytes(), b"Hi Reto\0\0\0\0");
        assert_eq!(short.as_str(), "Hi Reto");

        let long = EntityMarking::new("MV EVER GIVEN 2021").unwrap();
        assert_eq!(long.as_bytes(), b"MV EVER GIV");
        assert_eq!(long.to_string(), "MV EVER GIV");

        let exact = EntityMarking::new("Hi Reto 123").unwrap();
        assert_eq!(exact.as_bytes(), b"Hi Reto 123");
        assert_eq!(exact.as_str(), "Hi Reto 123");

        let empty = EntityMarking::new("").unwrap();
        assert_eq!(empty.as_bytes(), &[0u8; MARKING_CAPACITY]);
    }

    #[test]
    fn test_marking_rejects_non_ascii() {
        assert!(matches!(
            EntityMarking::new("Göteborg"),
            Err(PduError::InvalidMarking(_))
        ));
    }

    #[test]
    fn test_dead_reckoning_codes() {
        assert_eq!(DeadReckoningAlgorithm::default().code(), 6);
        for code in 0..=9 {
            assert_eq!(DeadReckoningAlgorithm::from_code(code).code(), code);
        }
        assert_eq!(
            DeadReckoningAlgorithm::from_code(200),
            DeadReckoningAlgorithm::Other
        );
    }

    #[test]
    fn test_encode_length_and_sequence() {
        let session = SessionContext::new(1, 1, 1);
        let first = encode(&descriptor(), &kinematics(), &session, Utc::now()).unwrap();
        let second = encode(&descriptor(), &kinematics(), &session, Utc::now()).unwrap();

        assert_eq!(first.data.len(), ENTITY_STATE_LENGTH);
        assert_eq!(u16::from_be_bytes([first.data[8], first.data[9]]), 144);
        assert_eq!(second.sequence, first.sequence.wrapping_add(1));
    }

    #[test]
    fn test_invalid_input_consumes_no_sequence() {
        let session = SessionContext::new(1, 1, 1);
        let mut bad = kinematics();
        bad.position.latitude = 95.0;

        let err = encode(&descriptor(), &bad, &session, Utc::now()).unwrap_err();
        assert!(err.is_invalid_position());
        assert_eq!(session.peek_sequence(), 0);

        let mut bad = kinematics();
        bad.velocity.u = f64::NAN;
        assert_eq!(
            encode(&descriptor(), &bad, &session, Utc::now()).unwrap_err(),
            PduError::InvalidKinematics("velocity")
        );
    }

    #[test]
    fn test_decode_round_trip() {
        let session = SessionContext::new(3, 4, 5);
        let descriptor = descriptor().with_force(ForceId::Neutral);
        let pdu = EntityStatePdu::build(&descriptor, &kinematics(), &session, Utc::now()).unwrap();

        let decoded = EntityStatePdu::decode(&pdu.to_bytes()).unwrap();
        assert_eq!(decoded, pdu);
        assert_eq!(decoded.force_id, 3);
        assert_eq!(decoded.marking.as_str(), "Hi Reto");
        assert_eq!(decoded.alternative_entity_type, GENERIC_SHIP_CONTAINER_CLASS_SMALL);

        let local = geo::world_to_orientation(
            &kinematics().position,
            &decoded.world_orientation(),
        );
        assert!((local.yaw - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_other_pdu_types() {
        let mut bytes = vec![0u8; 40];
        bytes[..12].copy_from_slice(&[6, 1, 14, 5, 0, 0, 0, 0, 0, 40, 0, 0]);
        assert_eq!(
            EntityStatePdu::decode(&bytes),
            Err(FrameError::UnknownPduType(14))
        );
    }
}
