//! # OmniDIS PDU
//!
//! Encoding of the DIS (IEEE 1278.1, protocol version 6) PDUs emitted by the
//! dispatcher:
//!
//! - **Header**: the common 12-byte header ([`header`])
//! - **Entity State**: entity identity, type, location, orientation,
//!   velocity and marking ([`entity_state`])
//! - **Simulation management**: Start/Resume and Stop/Freeze ([`simulation`])
//! - **Coordinates**: WGS84 geodetic to ECEF and NED attitude to DIS Euler
//!   angles ([`geo`])
//! - **Entity types**: name to DIS entity type lookup ([`entity_type`])
//!
//! Every builder returns an [`EncodedPdu`]: the serialized bytes plus the
//! session sequence number it consumed. Encoding is all-or-nothing; an
//! invalid input yields an error and no bytes.
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use omnidis_core::{EntityId, SessionContext};
//! use omnidis_pdu::entity_state::{encode, EntityDescriptor, EntityKinematics, EntityMarking};
//! use omnidis_pdu::entity_type::EntityTypeRegistry;
//! use omnidis_pdu::geo::{GeodeticPosition, Orientation, VelocityVector};
//!
//! let session = SessionContext::new(1, 1, 1);
//! let registry = EntityTypeRegistry::new();
//! let descriptor = EntityDescriptor::new(
//!     EntityId::new(1, 1, 1),
//!     registry.resolve("generic_ship_container_class_small").unwrap(),
//!     EntityMarking::new("Hi Reto").unwrap(),
//! );
//! let kinematics = EntityKinematics::new(
//!     GeodeticPosition::new(57.66, 12.44, 0.0),
//!     Orientation::new(0.3, 0.0, 0.0),
//!     VelocityVector::new(2.0, 0.0, 0.0),
//! );
//!
//! let pdu = encode(&descriptor, &kinematics, &session, Utc::now()).unwrap();
//! assert_eq!(pdu.data.len(), 144);
//! ```

pub mod entity_state;
pub mod entity_type;
pub mod error;
pub mod geo;
pub mod header;
pub mod pdu;
pub mod simulation;

pub use entity_state::{
    DeadReckoningAlgorithm, EntityDescriptor, EntityKinematics, EntityMarking, EntityStatePdu,
};
pub use entity_type::{EntityType, EntityTypeRegistry};
pub use error::{FrameError, PduError};
pub use geo::{
    AngularVelocityVector, GeocentricPosition, GeodeticPosition, KinematicUnits, Orientation,
    VelocityVector, WorldOrientation,
};
pub use header::{PduHeader, PduType, ProtocolFamily, HEADER_LENGTH, PROTOCOL_VERSION};
pub use pdu::{decode_pdu, EncodedPdu, Pdu};
pub use simulation::{FrozenBehavior, StopReason};
