//! Serialized PDUs and type-dispatched decoding.

use crate::entity_state::EntityStatePdu;
use crate::error::FrameError;
use crate::header::{PduHeader, PduType};
use crate::simulation::{StartResumePdu, StopFreezePdu};
use bytes::Bytes;
use tracing::debug;

/// A fully serialized PDU ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPdu {
    pub pdu_type: PduType,
    /// Session sequence number consumed by this PDU
    pub sequence: u32,
    pub data: Bytes,
}

impl EncodedPdu {
    pub fn new(pdu_type: PduType, sequence: u32, data: Bytes) -> Self {
        debug!(%pdu_type, sequence, len = data.len(), "Encoded PDU");
        Self {
            pdu_type,
            sequence,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Any PDU this crate can build.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    EntityState(EntityStatePdu),
    StartResume(StartResumePdu),
    StopFreeze(StopFreezePdu),
}

impl Pdu {
    pub fn header(&self) -> &PduHeader {
        match self {
            Pdu::EntityState(pdu) => &pdu.header,
            Pdu::StartResume(pdu) => &pdu.header,
            Pdu::StopFreeze(pdu) => &pdu.header,
        }
    }
}

/// Decodes a datagram according to its header's PDU type.
pub fn decode_pdu(bytes: &[u8]) -> Result<Pdu, FrameError> {
    let header = PduHeader::parse(bytes)?;
    match header.pdu_type {
        PduType::EntityState => EntityStatePdu::decode(bytes).map(Pdu::EntityState),
        PduType::StartResume => StartResumePdu::decode(bytes).map(Pdu::StartResume),
        PduType::StopFreeze => StopFreezePdu::decode(bytes).map(Pdu::StopFreeze),
    }
}
