//! The narrow "send bytes" contract between the dispatcher and the network.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Sends one complete PDU per call.
///
/// Implementations own destination and socket options. A send is
/// fire-and-forget: no acknowledgement, no retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, pdu: Bytes) -> Result<(), TransportError>;
}

/// In-memory transport that records every datagram.
///
/// Used by tests and by hosts that forward PDUs through their own I/O.
/// Queued failures are returned, oldest first, before recording resumes.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<Bytes>>,
    failures: Mutex<VecDeque<TransportError>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next send fail with `error`.
    pub fn fail_next(&self, error: TransportError) {
        self.failures.lock().push_back(error);
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, pdu: Bytes) -> Result<(), TransportError> {
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        self.sent.lock().push(pdu);
        Ok(())
    }
}
