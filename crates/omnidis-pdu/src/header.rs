//! Common PDU header shared by every PDU kind.
//!
//! Layout (big-endian, offsets from the start of the PDU):
//!
//! | offset | size | field            |
//! |--------|------|------------------|
//! | 0      | 1    | protocol version |
//! | 1      | 1    | exercise id      |
//! | 2      | 1    | PDU type         |
//! | 3      | 1    | protocol family  |
//! | 4      | 4    | timestamp        |
//! | 8      | 2    | length           |
//! | 10     | 2    | padding          |

use crate::error::FrameError;
use bytes::{Buf, BufMut};
use chrono::{DateTime, Utc};
use omnidis_core::SessionContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// IEEE 1278.1-1995 protocol version
pub const PROTOCOL_VERSION: u8 = 6;

/// Serialized header size in bytes
pub const HEADER_LENGTH: usize = 12;

/// PDU types emitted by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PduType {
    EntityState,
    StartResume,
    StopFreeze,
}

impl PduType {
    /// DIS enumeration value
    pub fn code(&self) -> u8 {
        match self {
            PduType::EntityState => 1,
            PduType::StartResume => 13,
            PduType::StopFreeze => 14,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, FrameError> {
        match code {
            1 => Ok(PduType::EntityState),
            13 => Ok(PduType::StartResume),
            14 => Ok(PduType::StopFreeze),
            other => Err(FrameError::UnknownPduType(other)),
        }
    }

    /// Protocol family this PDU type belongs to.
    pub fn family(&self) -> ProtocolFamily {
        match self {
            PduType::EntityState => ProtocolFamily::EntityInformation,
            PduType::StartResume | PduType::StopFreeze => ProtocolFamily::SimulationManagement,
        }
    }

    /// Fixed total length of this PDU kind, header included.
    pub fn length(&self) -> usize {
        match self {
            PduType::EntityState => 144,
            PduType::StartResume => 44,
            PduType::StopFreeze => 40,
        }
    }
}

impl fmt::Display for PduType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PduType::EntityState => "EntityState",
            PduType::StartResume => "Start/Resume",
            PduType::StopFreeze => "Stop/Freeze",
        };
        f.write_str(name)
    }
}

/// DIS protocol families used by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolFamily {
    EntityInformation,
    SimulationManagement,
}

impl ProtocolFamily {
    pub fn code(&self) -> u8 {
        match self {
            ProtocolFamily::EntityInformation => 1,
            ProtocolFamily::SimulationManagement => 5,
        }
    }
}

/// Decoded or about-to-be-serialized PDU header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PduHeader {
    pub protocol_version: u8,
    pub exercise_id: u8,
    pub pdu_type: PduType,
    pub protocol_family: ProtocolFamily,
    pub timestamp: u32,
    /// Total PDU length in bytes, header included
    pub length: u16,
    pub padding: u16,
}

impl PduHeader {
    /// Payload length announced by this header.
    pub fn payload_length(&self) -> usize {
        (self.length as usize).saturating_sub(HEADER_LENGTH)
    }

    /// Writes the 12 header bytes.
    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.protocol_version);
        buf.put_u8(self.exercise_id);
        buf.put_u8(self.pdu_type.code());
        buf.put_u8(self.protocol_family.code());
        buf.put_u32(self.timestamp);
        buf.put_u16(self.length);
        buf.put_u16(self.padding);
    }

    /// Parses and checks a header at the start of `bytes`.
    ///
    /// `bytes` must hold the complete PDU: the declared length is compared
    /// against it so a companion receiver can skip or reject the datagram.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        FrameError::ensure_len(bytes, HEADER_LENGTH)?;
        let mut buf = bytes;

        let protocol_version = buf.get_u8();
        if protocol_version != PROTOCOL_VERSION {
            return Err(FrameError::UnsupportedVersion(protocol_version));
        }

        let exercise_id = buf.get_u8();
        let type_code = buf.get_u8();
        let family_code = buf.get_u8();
        let timestamp = buf.get_u32();
        let length = buf.get_u16();
        let padding = buf.get_u16();

        if length as usize != bytes.len() {
            return Err(FrameError::LengthMismatch {
                declared: length as usize,
                actual: bytes.len(),
            });
        }

        let pdu_type = PduType::from_code(type_code)?;
        let protocol_family = pdu_type.family();
        if protocol_family.code() != family_code {
            return Err(FrameError::FamilyMismatch {
                pdu_type: type_code,
                family: family_code,
            });
        }

        Ok(Self {
            protocol_version,
            exercise_id,
            pdu_type,
            protocol_family,
            timestamp,
            length,
            padding,
        })
    }
}

/// Stamps a header for a PDU of `payload_length` bytes built at `now`.
pub fn build_header(
    pdu_type: PduType,
    payload_length: usize,
    session: &SessionContext,
    now: DateTime<Utc>,
) -> PduHeader {
    let length = HEADER_LENGTH + payload_length;
    debug_assert!(length <= u16::MAX as usize, "PDU length {length} overflows u16");

    PduHeader {
        protocol_version: PROTOCOL_VERSION,
        exercise_id: session.identity().exercise_id,
        pdu_type,
        protocol_family: pdu_type.family(),
        timestamp: session.timestamp(now),
        length: length as u16,
        padding: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use omnidis_core::session::timestamp_seconds;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 15, 0).unwrap()
    }

    fn serialized(header: &PduHeader) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LENGTH);
        header.serialize(&mut buf);
        buf
    }

    #[test]
    fn test_build_header() {
        let session = SessionContext::new(1, 2, 9);
        let header = build_header(PduType::StopFreeze, 28, &session, now());

        assert_eq!(header.protocol_version, 6);
        assert_eq!(header.exercise_id, 9);
        assert_eq!(header.protocol_family, ProtocolFamily::SimulationManagement);
        assert_eq!(header.length, 40);
        assert_eq!(header.payload_length(), 28);
        assert!((timestamp_seconds(header.timestamp) - 900.0).abs() < 1e-3);
    }

    #[test]
    fn test_serialize_byte_offsets() {
        let header = PduHeader {
            protocol_version: PROTOCOL_VERSION,
            exercise_id: 3,
            pdu_type: PduType::EntityState,
            protocol_family: ProtocolFamily::EntityInformation,
            timestamp: 0x0102_0304,
            length: 144,
            padding: 0,
        };

        let bytes = serialized(&header);
        assert_eq!(bytes.len(), HEADER_LENGTH);
        assert_eq!(
            bytes,
            vec![6, 3, 1, 1, 0x01, 0x02, 0x03, 0x04, 0x00, 0x90, 0x00, 0x00]
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let session = SessionContext::new(1, 1, 1);
        let header = build_header(PduType::StartResume, 32, &session, now());

        let mut bytes = serialized(&header);
        bytes.resize(header.length as usize, 0);

        assert_eq!(PduHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            PduHeader::parse(&[6, 1, 1]),
            Err(FrameError::Truncated {
                needed: 12,
                actual: 3
            })
        );

        let mut bytes = vec![7, 1, 1, 1, 0, 0, 0, 0, 0, 12, 0, 0];
        assert_eq!(
            PduHeader::parse(&bytes),
            Err(FrameError::UnsupportedVersion(7))
        );

        bytes[0] = 6;
        bytes[9] = 20;
        assert!(matches!(
            PduHeader::parse(&bytes),
            Err(FrameError::LengthMismatch {
                declared: 20,
                actual: 12
            })
        ));

        bytes[9] = 12;
        bytes[2] = 2;
        assert_eq!(PduHeader::parse(&bytes), Err(FrameError::UnknownPduType(2)));

        bytes[2] = 13;
        bytes[3] = 1;
        assert!(matches!(
            PduHeader::parse(&bytes),
            Err(FrameError::FamilyMismatch { .. })
        ));
    }

    #[test]
    fn test_pdu_type_codes() {
        for pdu_type in [PduType::EntityState, PduType::StartResume, PduType::StopFreeze] {
            assert_eq!(PduType::from_code(pdu_type.code()).unwrap(), pdu_type);
        }
        assert_eq!(PduType::StartResume.to_string(), "Start/Resume");
    }
}
