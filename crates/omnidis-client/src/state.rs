use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Counters describing what a dispatcher has done
#[derive(Debug, Clone)]
pub struct DispatchMetrics {
    /// PDUs handed to the transport successfully
    pdus_sent: Arc<AtomicU64>,
    /// Bytes handed to the transport successfully
    bytes_sent: Arc<AtomicU64>,
    /// Sends rejected by the transport
    send_failures: Arc<AtomicU64>,
    /// Ticks where the scheduler decided no update was due
    suppressed_ticks: Arc<AtomicU64>,
    /// Ticks dropped because of invalid input
    skipped_ticks: Arc<AtomicU64>,
    /// Time of the last successful send
    last_send: Arc<parking_lot::RwLock<Option<SystemTime>>>,
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            pdus_sent: Arc::new(AtomicU64::new(0)),
            bytes_sent: Arc::new(AtomicU64::new(0)),
            send_failures: Arc::new(AtomicU64::new(0)),
            suppressed_ticks: Arc::new(AtomicU64::new(0)),
            skipped_ticks: Arc::new(AtomicU64::new(0)),
            last_send: Arc::new(parking_lot::RwLock::new(None)),
        }
    }

    /// Record a PDU sent
    pub fn record_sent(&self, bytes: u64) {
        self.pdus_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        *self.last_send.write() = Some(SystemTime::now());
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.suppressed_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pdus_sent(&self) -> u64 {
        self.pdus_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    pub fn suppressed_ticks(&self) -> u64 {
        self.suppressed_ticks.load(Ordering::Relaxed)
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::Relaxed)
    }

    pub fn last_send(&self) -> Option<SystemTime> {
        *self.last_send.read()
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pdus_sent: self.pdus_sent(),
            bytes_sent: self.bytes_sent(),
            send_failures: self.send_failures(),
            suppressed_ticks: self.suppressed_ticks(),
            skipped_ticks: self.skipped_ticks(),
            last_send: self.last_send(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.pdus_sent.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.send_failures.store(0, Ordering::Relaxed);
        self.suppressed_ticks.store(0, Ordering::Relaxed);
        self.skipped_ticks.store(0, Ordering::Relaxed);
        *self.last_send.write() = None;
    }
}

/// Point-in-time copy of [`DispatchMetrics`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub pdus_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
    pub suppressed_ticks: u64,
    pub skipped_ticks: u64,
    pub last_send: Option<SystemTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = DispatchMetrics::new();
        metrics.record_sent(144);
        metrics.record_sent(44);
        metrics.record_send_failure();
        metrics.record_suppressed();
        metrics.record_skipped();

        assert_eq!(metrics.pdus_sent(), 2);
        assert_eq!(metrics.bytes_sent(), 188);
        assert_eq!(metrics.send_failures(), 1);
        assert_eq!(metrics.suppressed_ticks(), 1);
        assert_eq!(metrics.skipped_ticks(), 1);
        assert!(metrics.last_send().is_some());
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = DispatchMetrics::new();
        let clone = metrics.clone();
        clone.record_sent(40);
        assert_eq!(metrics.pdus_sent(), 1);

        metrics.reset();
        assert_eq!(clone.snapshot().pdus_sent, 0);
        assert!(clone.last_send().is_none());
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = DispatchMetrics::new();
        metrics.record_suppressed();
        let json = serde_json::to_string(&metrics.snapshot()).unwrap();
        assert!(json.contains("\"suppressed_ticks\":1"));
    }
}
