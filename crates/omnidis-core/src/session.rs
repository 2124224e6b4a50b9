//! Exercise session state: identity, PDU sequence counter and DIS time.
//!
//! A [`SessionContext`] is created once per exercise join and shared (behind an
//! `Arc`) by every dispatcher of the hosting application. Its sequence counter
//! is the only state those dispatchers share.

use crate::error::ConfigError;
use crate::types::{ExerciseIdentity, TimestampKind};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

/// Number of timestamp units in one hour (2^31 - 1), IEEE 1278.1 §5.2.31.
pub const TIME_UNITS_PER_HOUR: u32 = 0x7FFF_FFFF;

const SECONDS_PER_HOUR: i64 = 3600;

/// Shared state for one exercise session.
#[derive(Debug)]
pub struct SessionContext {
    identity: ExerciseIdentity,
    timestamp_kind: TimestampKind,
    sequence: AtomicU32,
}

impl SessionContext {
    /// Creates a session with relative timestamps.
    ///
    /// Zero identity values are accepted but disable exercise partitioning on
    /// the receiving side, so they are logged.
    pub fn new(site_id: u16, application_id: u16, exercise_id: u8) -> Self {
        Self::with_timestamp_kind(site_id, application_id, exercise_id, TimestampKind::Relative)
    }

    /// Creates a session with an explicit timestamp kind.
    pub fn with_timestamp_kind(
        site_id: u16,
        application_id: u16,
        exercise_id: u8,
        timestamp_kind: TimestampKind,
    ) -> Self {
        let identity = ExerciseIdentity {
            site_id,
            application_id,
            exercise_id,
        };

        if identity.uses_reserved_values() {
            warn!(
                %identity,
                "Session identity uses reserved zero value; receivers cannot partition this exercise"
            );
        }

        Self {
            identity,
            timestamp_kind,
            sequence: AtomicU32::new(0),
        }
    }

    /// Creates a session from caller-supplied values of arbitrary width.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IdentityOutOfRange`] if a value does not fit the
    /// DIS field width (`u16` for site and application, `u8` for exercise).
    pub fn try_new(
        site_id: u64,
        application_id: u64,
        exercise_id: u64,
        timestamp_kind: TimestampKind,
    ) -> Result<Self, ConfigError> {
        let site_id = u16::try_from(site_id)
            .map_err(|_| ConfigError::identity_out_of_range("site_id", site_id, u16::MAX as u64))?;
        let application_id = u16::try_from(application_id).map_err(|_| {
            ConfigError::identity_out_of_range("application_id", application_id, u16::MAX as u64)
        })?;
        let exercise_id = u8::try_from(exercise_id).map_err(|_| {
            ConfigError::identity_out_of_range("exercise_id", exercise_id, u8::MAX as u64)
        })?;

        Ok(Self::with_timestamp_kind(
            site_id,
            application_id,
            exercise_id,
            timestamp_kind,
        ))
    }

    /// Returns the immutable session identity.
    pub fn identity(&self) -> ExerciseIdentity {
        self.identity
    }

    /// Returns the timestamp kind stamped on every header.
    pub fn timestamp_kind(&self) -> TimestampKind {
        self.timestamp_kind
    }

    /// Returns the current sequence number and advances the counter.
    ///
    /// One atomic increment; wraps to zero after `u32::MAX`.
    pub fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Peeks at the next sequence number without consuming it.
    pub fn peek_sequence(&self) -> u32 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Header timestamp for a PDU built at `now`.
    pub fn timestamp(&self, now: DateTime<Utc>) -> u32 {
        encode_timestamp(time_past_hour(now), self.timestamp_kind)
    }

    /// DIS clock time for `now`.
    pub fn clock_time(&self, now: DateTime<Utc>) -> ClockTime {
        ClockTime::from_datetime(now, self.timestamp_kind)
    }
}

/// DIS clock time: hours since the epoch plus a timestamp within the hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClockTime {
    /// Hours since 1970-01-01 00:00 UTC
    pub hour: i32,
    /// Time past the hour in DIS timestamp encoding
    pub time_past_hour: u32,
}

impl ClockTime {
    /// Wire size in bytes.
    pub const LENGTH: usize = 8;

    /// Converts a UTC instant into DIS clock time.
    pub fn from_datetime(dt: DateTime<Utc>, kind: TimestampKind) -> Self {
        Self {
            hour: dt.timestamp().div_euclid(SECONDS_PER_HOUR) as i32,
            time_past_hour: encode_timestamp(time_past_hour(dt), kind),
        }
    }

    /// Seconds elapsed in the hour encoded by this clock time.
    pub fn seconds_past_hour(&self) -> f64 {
        timestamp_seconds(self.time_past_hour)
    }
}

/// Time past the hour in units of 3600 / (2^31 - 1) seconds.
pub fn time_past_hour(dt: DateTime<Utc>) -> u32 {
    let whole = dt.timestamp().rem_euclid(SECONDS_PER_HOUR) as f64;
    let secs = whole + dt.nanosecond().min(999_999_999) as f64 * 1e-9;
    let units = (secs * TIME_UNITS_PER_HOUR as f64 / SECONDS_PER_HOUR as f64).floor();
    (units as u32).min(TIME_UNITS_PER_HOUR)
}

/// Packs time past the hour into the 31 high bits; bit 0 carries the kind.
pub fn encode_timestamp(time_past_hour: u32, kind: TimestampKind) -> u32 {
    (time_past_hour.min(TIME_UNITS_PER_HOUR) << 1) | kind.flag()
}

/// Splits a header timestamp into time past the hour and its kind.
pub fn decode_timestamp(timestamp: u32) -> (u32, TimestampKind) {
    let kind = if timestamp & 1 == 1 {
        TimestampKind::Absolute
    } else {
        TimestampKind::Relative
    };
    (timestamp >> 1, kind)
}

/// Seconds past the hour carried by a header timestamp.
pub fn timestamp_seconds(timestamp: u32) -> f64 {
    let (units, _) = decode_timestamp(timestamp);
    units as f64 * SECONDS_PER_HOUR as f64 / TIME_UNITS_PER_HOUR as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequence_increments_by_one() {
        let session = SessionContext::new(1, 1, 1);
        let first = session.next_sequence();
        let second = session.next_sequence();
        assert_eq!(second, first.wrapping_add(1));
    }

    #[test]
    fn test_sequence_wraps() {
        let session = SessionContext::new(1, 1, 1);
        session.sequence.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(session.next_sequence(), u32::MAX);
        assert_eq!(session.next_sequence(), 0);
    }

    #[test]
    fn test_sequence_shared_across_threads() {
        let session = Arc::new(SessionContext::new(1, 1, 1));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let session = Arc::clone(&session);
                thread::spawn(move || (0..250).map(|_| session.next_sequence()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
        assert_eq!(session.peek_sequence(), 1000);
    }

    #[test]
    fn test_try_new_rejects_out_of_range() {
        let err = SessionContext::try_new(70_000, 1, 1, TimestampKind::Relative).unwrap_err();
        assert!(matches!(err, ConfigError::IdentityOutOfRange { .. }));

        let err = SessionContext::try_new(1, 1, 256, TimestampKind::Relative).unwrap_err();
        assert!(err.to_string().contains("exercise_id"));

        let session = SessionContext::try_new(65535, 2, 255, TimestampKind::Absolute).unwrap();
        assert_eq!(session.identity().site_id, 65535);
        assert_eq!(session.identity().exercise_id, 255);
    }

    #[test]
    fn test_zero_identity_permitted() {
        let session = SessionContext::new(0, 0, 0);
        assert!(session.identity().uses_reserved_values());
    }

    #[test]
    fn test_timestamp_bit_layout() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let relative = SessionContext::new(1, 1, 1).timestamp(dt);
        let absolute =
            SessionContext::with_timestamp_kind(1, 1, 1, TimestampKind::Absolute).timestamp(dt);

        assert_eq!(relative & 1, 0);
        assert_eq!(absolute & 1, 1);
        assert_eq!(relative >> 1, absolute >> 1);
        assert!((timestamp_seconds(relative) - 1800.0).abs() < 1e-3);
    }

    #[test]
    fn test_time_past_hour_bounds() {
        let top = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        assert_eq!(time_past_hour(top), 0);

        let end = Utc.with_ymd_and_hms(2024, 1, 15, 10, 59, 59).unwrap();
        assert!(time_past_hour(end) < TIME_UNITS_PER_HOUR);
    }

    #[test]
    fn test_clock_time_hours_since_epoch() {
        let dt = Utc.with_ymd_and_hms(1970, 1, 2, 1, 15, 0).unwrap();
        let clock = ClockTime::from_datetime(dt, TimestampKind::Relative);
        assert_eq!(clock.hour, 25);
        assert!((clock.seconds_past_hour() - 900.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_timestamp_kind() {
        let (units, kind) = decode_timestamp(encode_timestamp(1234, TimestampKind::Absolute));
        assert_eq!(units, 1234);
        assert_eq!(kind, TimestampKind::Absolute);
    }
}
