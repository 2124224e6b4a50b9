//! Errors raised while building or parsing PDUs

use thiserror::Error;

/// Per-tick encoding failures.
///
/// An encoding either fully succeeds or yields one of these and no bytes;
/// the caller skips the tick and carries on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PduError {
    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    #[error("Invalid altitude: {0} (must be finite)")]
    InvalidAltitude(f64),

    #[error("Invalid kinematic value for {0}: must be finite")]
    InvalidKinematics(&'static str),

    #[error("Invalid marking: {0}")]
    InvalidMarking(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

impl PduError {
    /// Returns true for errors caused by bad geodetic input.
    pub fn is_invalid_position(&self) -> bool {
        matches!(
            self,
            PduError::InvalidLatitude(_) | PduError::InvalidLongitude(_) | PduError::InvalidAltitude(_)
        )
    }
}

/// Failures while parsing received bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Buffer too short: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("Declared length {declared} does not match buffer length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Unknown PDU type: {0}")]
    UnknownPduType(u8),

    #[error("PDU type {pdu_type} carried in unexpected protocol family {family}")]
    FamilyMismatch { pdu_type: u8, family: u8 },
}

impl FrameError {
    pub(crate) fn ensure_len(buf: &[u8], needed: usize) -> Result<(), FrameError> {
        if buf.len() < needed {
            return Err(FrameError::Truncated {
                needed,
                actual: buf.len(),
            });
        }
        Ok(())
    }
}
