//! Simulation management PDUs: Start/Resume and Stop/Freeze.
//!
//! Both are addressed from the application's simulation manager
//! (`site:application:0`) to every participant (`65535:65535:65535`). The
//! request id field carries the session sequence number.

use crate::error::FrameError;
use crate::header::{build_header, PduHeader, PduType, HEADER_LENGTH};
use crate::pdu::EncodedPdu;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use omnidis_core::{ClockTime, EntityId, SessionContext};
use serde::{Deserialize, Serialize};

/// Start/Resume PDU length, header included
pub const START_RESUME_LENGTH: usize = 44;

/// Stop/Freeze PDU length, header included
pub const STOP_FREEZE_LENGTH: usize = 40;

/// Why the exercise is being stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Other,
    Recess,
    #[default]
    Termination,
    SystemFailure,
    SecurityViolation,
    EntityReconstitution,
    StopForReset,
    StopForRestart,
    AbortTrainingReturnToTacticalOperations,
}

impl StopReason {
    pub fn code(&self) -> u8 {
        match self {
            StopReason::Other => 0,
            StopReason::Recess => 1,
            StopReason::Termination => 2,
            StopReason::SystemFailure => 3,
            StopReason::SecurityViolation => 4,
            StopReason::EntityReconstitution => 5,
            StopReason::StopForReset => 6,
            StopReason::StopForRestart => 7,
            StopReason::AbortTrainingReturnToTacticalOperations => 8,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => StopReason::Recess,
            2 => StopReason::Termination,
            3 => StopReason::SystemFailure,
            4 => StopReason::SecurityViolation,
            5 => StopReason::EntityReconstitution,
            6 => StopReason::StopForReset,
            7 => StopReason::StopForRestart,
            8 => StopReason::AbortTrainingReturnToTacticalOperations,
            _ => StopReason::Other,
        }
    }
}

/// What receivers keep doing while frozen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrozenBehavior {
    pub run_simulation_clock: bool,
    pub transmit_updates: bool,
    pub process_updates: bool,
}

impl Default for FrozenBehavior {
    /// Keep transmitting updates, stop the clock and ignore incoming PDUs.
    fn default() -> Self {
        Self {
            run_simulation_clock: false,
            transmit_updates: true,
            process_updates: false,
        }
    }
}

impl FrozenBehavior {
    pub fn bits(&self) -> u8 {
        (self.run_simulation_clock as u8)
            | ((self.transmit_updates as u8) << 1)
            | ((self.process_updates as u8) << 2)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            run_simulation_clock: bits & 0b001 != 0,
            transmit_updates: bits & 0b010 != 0,
            process_updates: bits & 0b100 != 0,
        }
    }
}

/// Start/Resume PDU (type 13)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartResumePdu {
    pub header: PduHeader,
    pub originating_id: EntityId,
    pub receiving_id: EntityId,
    pub real_world_time: ClockTime,
    pub simulation_time: ClockTime,
    pub request_id: u32,
}

/// Stop/Freeze PDU (type 14)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopFreezePdu {
    pub header: PduHeader,
    pub originating_id: EntityId,
    pub receiving_id: EntityId,
    pub real_world_time: ClockTime,
    pub reason: StopReason,
    pub frozen_behavior: FrozenBehavior,
    pub request_id: u32,
}

impl StartResumePdu {
    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        self.header.serialize(buf);
        put_entity_id(buf, &self.originating_id);
        put_entity_id(buf, &self.receiving_id);
        put_clock_time(buf, &self.real_world_time);
        put_clock_time(buf, &self.simulation_time);
        buf.put_u32(self.request_id);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(START_RESUME_LENGTH);
        self.serialize(&mut buf);
        debug_assert_eq!(buf.len(), self.header.length as usize);
        buf.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = expect_header(bytes, PduType::StartResume)?;
        let mut buf = &bytes[HEADER_LENGTH..];

        Ok(Self {
            header,
            originating_id: get_entity_id(&mut buf),
            receiving_id: get_entity_id(&mut buf),
            real_world_time: get_clock_time(&mut buf),
            simulation_time: get_clock_time(&mut buf),
            request_id: buf.get_u32(),
        })
    }
}

impl StopFreezePdu {
    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        self.header.serialize(buf);
        put_entity_id(buf, &self.originating_id);
        put_entity_id(buf, &self.receiving_id);
        put_clock_time(buf, &self.real_world_time);
        buf.put_u8(self.reason.code());
        buf.put_u8(self.frozen_behavior.bits());
        buf.put_u16(0);
        buf.put_u32(self.request_id);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(STOP_FREEZE_LENGTH);
        self.serialize(&mut buf);
        debug_assert_eq!(buf.len(), self.header.length as usize);
        buf.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = expect_header(bytes, PduType::StopFreeze)?;
        let mut buf = &bytes[HEADER_LENGTH..];

        let originating_id = get_entity_id(&mut buf);
        let receiving_id = get_entity_id(&mut buf);
        let real_world_time = get_clock_time(&mut buf);
        let reason = StopReason::from_code(buf.get_u8());
        let frozen_behavior = FrozenBehavior::from_bits(buf.get_u8());
        buf.advance(2);

        Ok(Self {
            header,
            originating_id,
            receiving_id,
            real_world_time,
            reason,
            frozen_behavior,
            request_id: buf.get_u32(),
        })
    }
}

/// Builds a Start/Resume PDU.
///
/// Real-world and simulation times default to `now` when not given.
pub fn build_start_resume(
    session: &SessionContext,
    real_world_time: Option<DateTime<Utc>>,
    simulation_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> EncodedPdu {
    let sequence = session.next_sequence();
    let kind = session.timestamp_kind();

    let pdu = StartResumePdu {
        header: build_header(
            PduType::StartResume,
            START_RESUME_LENGTH - HEADER_LENGTH,
            session,
            now,
        ),
        originating_id: session.identity().simulation_manager(),
        receiving_id: EntityId::all(),
        real_world_time: ClockTime::from_datetime(real_world_time.unwrap_or(now), kind),
        simulation_time: ClockTime::from_datetime(simulation_time.unwrap_or(now), kind),
        request_id: sequence,
    };

    EncodedPdu::new(PduType::StartResume, sequence, pdu.to_bytes())
}

/// Builds a Stop/Freeze PDU stamped with the current real-world time.
pub fn build_stop_freeze(
    session: &SessionContext,
    reason: StopReason,
    frozen_behavior: FrozenBehavior,
    now: DateTime<Utc>,
) -> EncodedPdu {
    let sequence = session.next_sequence();

    let pdu = StopFreezePdu {
        header: build_header(
            PduType::StopFreeze,
            STOP_FREEZE_LENGTH - HEADER_LENGTH,
            session,
            now,
        ),
        originating_id: session.identity().simulation_manager(),
        receiving_id: EntityId::all(),
        real_world_time: session.clock_time(now),
        reason,
        frozen_behavior,
        request_id: sequence,
    };

    EncodedPdu::new(PduType::StopFreeze, sequence, pdu.to_bytes())
}

fn expect_header(bytes: &[u8], expected: PduType) -> Result<PduHeader, FrameError> {
    let header = PduHeader::parse(bytes)?;
    if header.pdu_type != expected {
        return Err(FrameError::UnknownPduType(header.pdu_type.code()));
    }
    FrameError::ensure_len(bytes, expected.length())?;
    Ok(header)
}

fn put_entity_id<B: BufMut>(buf: &mut B, id: &EntityId) {
    buf.put_u16(id.site);
    buf.put_u16(id.application);
    buf.put_u16(id.entity);
}

fn get_entity_id<B: Buf>(buf: &mut B) -> EntityId {
    EntityId::new(buf.get_u16(), buf.get_u16(), buf.get_u16())
}

fn put_clock_time<B: BufMut>(buf: &mut B, time: &ClockTime) {
    buf.put_i32(time.hour);
    buf.put_u32(time.time_past_hour);
}

fn get_clock_time<B: Buf>(buf: &mut B) -> ClockTime {
    ClockTime {
        hour: buf.get_i32(),
        time_past_hour: buf.get_u32(),
    }
}
