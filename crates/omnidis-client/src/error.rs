use omnidis_pdu::PduError;
use std::io;
use thiserror::Error;

/// Failure to hand a datagram to the network
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Socket is not bound")]
    NotBound,

    #[error("Send timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Partial datagram sent: {actual} of {expected} bytes")]
    PartialSend { expected: usize, actual: usize },

    #[error("I/O error ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by [`crate::PduDispatcher`]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Bad per-tick input; the tick was skipped
    #[error("PDU error: {0}")]
    Pdu(#[from] PduError),

    /// The datagram could not be sent; not retried
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// True when the caller supplied kinematics no PDU could be built from.
    pub fn is_input_error(&self) -> bool {
        matches!(self, DispatchError::Pdu(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let err: TransportError = io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(matches!(
            err,
            TransportError::Io {
                kind: io::ErrorKind::ConnectionRefused,
                ..
            }
        ));
    }

    #[test]
    fn test_input_error_classification() {
        let err = DispatchError::from(TransportError::NotBound);
        assert!(!err.is_input_error());
        assert!(err.to_string().contains("not bound"));

        let err = DispatchError::from(PduError::InvalidLatitude(91.0));
        assert!(err.is_input_error());
    }
}
