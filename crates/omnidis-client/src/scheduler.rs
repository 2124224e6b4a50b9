//! Heartbeat and dead-reckoning gate for Entity State updates.
//!
//! While tracking, receivers are assumed to extrapolate the last announced
//! state at constant velocity with fixed orientation. A new update is due
//! when their estimate drifts past a threshold or the heartbeat expires.

use chrono::{DateTime, Utc};
use omnidis_core::config::DeadReckoningConfig;
use omnidis_pdu::entity_state::EntityKinematics;
use omnidis_pdu::geo::{self, GeocentricPosition, WorldOrientation};
use omnidis_pdu::PduError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Limits that force an Entity State update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeadReckoningThresholds {
    /// Position error in meters
    pub position_m: f64,
    /// Orientation error in radians
    pub orientation_rad: f64,
    /// Maximum time between updates
    pub heartbeat: Duration,
}

impl Default for DeadReckoningThresholds {
    fn default() -> Self {
        Self::from(&DeadReckoningConfig::default())
    }
}

impl From<&DeadReckoningConfig> for DeadReckoningThresholds {
    fn from(config: &DeadReckoningConfig) -> Self {
        Self {
            position_m: config.position_threshold_m,
            orientation_rad: config.orientation_threshold_rad(),
            heartbeat: config.heartbeat(),
        }
    }
}

/// Kinematic state in the frame receivers extrapolate in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicSnapshot {
    pub position: GeocentricPosition,
    /// ECEF velocity in m/s
    pub velocity: [f64; 3],
    pub orientation: WorldOrientation,
}

impl KinematicSnapshot {
    /// Converts SI kinematics to ECEF.
    pub fn from_kinematics(kinematics: &EntityKinematics) -> Result<Self, PduError> {
        kinematics.validate()?;

        Ok(Self {
            position: geo::geodetic_to_ecef(&kinematics.position)?,
            velocity: geo::body_to_world_velocity(
                &kinematics.position,
                &kinematics.orientation,
                &kinematics.velocity,
            ),
            orientation: geo::orientation_to_world(&kinematics.position, &kinematics.orientation),
        })
    }
}

/// Last state announced to the exercise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub snapshot: KinematicSnapshot,
    pub sent_at: DateTime<Utc>,
}

impl Baseline {
    fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.sent_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Position a receiver would extrapolate at `now`.
    pub fn predicted_position(&self, now: DateTime<Utc>) -> GeocentricPosition {
        self.snapshot
            .position
            .extrapolate(&self.snapshot.velocity, self.elapsed(now).as_secs_f64())
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulerState {
    /// Nothing announced since the exercise started or was stopped
    Idle,
    Tracking(Baseline),
}

/// Outcome of evaluating one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendDecision {
    /// First announcement of the entity
    Initial,
    Heartbeat,
    PositionThreshold,
    OrientationThreshold,
    Suppress,
}

impl SendDecision {
    pub fn should_send(&self) -> bool {
        !matches!(self, SendDecision::Suppress)
    }
}

impl fmt::Display for SendDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendDecision::Initial => write!(f, "initial"),
            SendDecision::Heartbeat => write!(f, "heartbeat"),
            SendDecision::PositionThreshold => write!(f, "position threshold"),
            SendDecision::OrientationThreshold => write!(f, "orientation threshold"),
            SendDecision::Suppress => write!(f, "suppress"),
        }
    }
}

/// Idle/Tracking state machine deciding whether an update is due.
#[derive(Debug, Clone)]
pub struct HeartbeatScheduler {
    thresholds: DeadReckoningThresholds,
    state: SchedulerState,
}

impl HeartbeatScheduler {
    pub fn new(thresholds: DeadReckoningThresholds) -> Self {
        Self {
            thresholds,
            state: SchedulerState::Idle,
        }
    }

    pub fn thresholds(&self) -> &DeadReckoningThresholds {
        &self.thresholds
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, SchedulerState::Tracking(_))
    }

    /// Decides whether `snapshot` must be announced at `now`.
    pub fn evaluate(&self, snapshot: &KinematicSnapshot, now: DateTime<Utc>) -> SendDecision {
        let baseline = match &self.state {
            SchedulerState::Idle => return SendDecision::Initial,
            SchedulerState::Tracking(baseline) => baseline,
        };

        if baseline.elapsed(now) >= self.thresholds.heartbeat {
            return SendDecision::Heartbeat;
        }

        let predicted = baseline.predicted_position(now);
        if snapshot.position.distance_to(&predicted) > self.thresholds.position_m {
            return SendDecision::PositionThreshold;
        }

        let rotation =
            geo::orientation_difference(&baseline.snapshot.orientation, &snapshot.orientation);
        if rotation > self.thresholds.orientation_rad {
            return SendDecision::OrientationThreshold;
        }

        SendDecision::Suppress
    }

    /// Records a successful send as the new dead-reckoning baseline.
    pub fn record_send(&mut self, snapshot: KinematicSnapshot, now: DateTime<Utc>) {
        self.state = SchedulerState::Tracking(Baseline {
            snapshot,
            sent_at: now,
        });
    }

    /// Back to Idle; the next evaluation announces the entity again.
    pub fn reset(&mut self) {
        self.state = SchedulerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use omnidis_pdu::geo::{GeodeticPosition, Orientation, VelocityVector};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn at(secs: f64) -> DateTime<Utc> {
        t0() + chrono::Duration::milliseconds((secs * 1000.0) as i64)
    }

    fn thresholds(position_m: f64, heartbeat_secs: u64) -> DeadReckoningThresholds {
        DeadReckoningThresholds {
            position_m,
            orientation_rad: 3f64.to_radians(),
            heartbeat: Duration::from_secs(heartbeat_secs),
        }
    }

    fn ship(lat: f64, lon: f64, yaw: f64, speed: f64) -> EntityKinematics {
        EntityKinematics::new(
            GeodeticPosition::new(lat, lon, 0.0),
            Orientation::new(yaw, 0.0, 0.0),
            VelocityVector::new(speed, 0.0, 0.0),
        )
    }

    fn snapshot(kinematics: &EntityKinematics) -> KinematicSnapshot {
        KinematicSnapshot::from_kinematics(kinematics).unwrap()
    }

    /// Moves a ship `distance` meters along its heading (yaw from north).
    fn advance(kinematics: &EntityKinematics, distance: f64) -> EntityKinematics {
        let yaw = kinematics.orientation.yaw;
        let lat = kinematics.position.latitude;
        let dlat = distance * yaw.cos() / 111_320.0;
        let dlon = distance * yaw.sin() / (111_320.0 * lat.to_radians().cos());
        let mut moved = *kinematics;
        moved.position.latitude += dlat;
        moved.position.longitude += dlon;
        moved
    }

    #[test]
    fn test_idle_sends_initial() {
        let scheduler = HeartbeatScheduler::new(thresholds(5.0, 5));
        let decision = scheduler.evaluate(&snapshot(&ship(57.66, 12.44, 0.3, 2.0)), t0());
        assert_eq!(decision, SendDecision::Initial);
        assert!(decision.should_send());
        assert!(!scheduler.is_tracking());
    }

    #[test]
    fn test_suppresses_within_threshold() {
        // 2 m/s for 1 s: ~2 m of travel, all of it predicted
        let mut scheduler = HeartbeatScheduler::new(thresholds(5.0, 5));
        let start = ship(57.66, 12.44, 0.3, 2.0);
        scheduler.record_send(snapshot(&start), t0());

        let later = advance(&start, 2.0);
        assert_eq!(
            scheduler.evaluate(&snapshot(&later), at(1.0)),
            SendDecision::Suppress
        );

        // Standing still is also within 5 m of the 2 m prediction
        assert_eq!(
            scheduler.evaluate(&snapshot(&start), at(1.0)),
            SendDecision::Suppress
        );
    }

    #[test]
    fn test_position_threshold() {
        let mut scheduler = HeartbeatScheduler::new(thresholds(5.0, 5));
        let start = ship(57.66, 12.44, 0.0, 2.0);
        scheduler.record_send(snapshot(&start), t0());

        // Ship stopped after the announcement; receivers expect 8 m of travel
        let mut stopped = start;
        stopped.velocity = VelocityVector::default();
        assert_eq!(
            scheduler.evaluate(&snapshot(&stopped), at(4.0)),
            SendDecision::PositionThreshold
        );
    }

    #[test]
    fn test_orientation_threshold() {
        let mut scheduler = HeartbeatScheduler::new(thresholds(5.0, 5));
        let start = ship(57.66, 12.44, 0.3, 0.0);
        scheduler.record_send(snapshot(&start), t0());

        let mut turned = start;
        turned.orientation.yaw += 5f64.to_radians();
        assert_eq!(
            scheduler.evaluate(&snapshot(&turned), at(0.5)),
            SendDecision::OrientationThreshold
        );

        turned.orientation.yaw = 0.3 + 1f64.to_radians();
        assert_eq!(
            scheduler.evaluate(&snapshot(&turned), at(0.5)),
            SendDecision::Suppress
        );
    }

    #[test]
    fn test_heartbeat_window() {
        let mut scheduler = HeartbeatScheduler::new(thresholds(5.0, 5));
        let moored = ship(57.66, 12.44, 0.3, 0.0);
        let snap = snapshot(&moored);

        let mut sends = Vec::new();
        for tick in 0..=60 {
            let now = at(tick as f64 * 0.25);
            let decision = scheduler.evaluate(&snap, now);
            if decision.should_send() {
                scheduler.record_send(snap, now);
                sends.push(tick as f64 * 0.25);
            }
        }

        assert_eq!(sends, vec![0.0, 5.0, 10.0, 15.0]);
        for pair in sends.windows(2) {
            assert!(pair[1] - pair[0] <= 5.0);
        }
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut scheduler = HeartbeatScheduler::new(thresholds(1.0, 5));
        let snap = snapshot(&ship(0.0, 0.0, 0.0, 1.0));
        scheduler.record_send(snap, t0());
        assert!(scheduler.is_tracking());

        scheduler.reset();
        assert_eq!(scheduler.state(), &SchedulerState::Idle);
        assert_eq!(scheduler.evaluate(&snap, at(0.1)), SendDecision::Initial);
    }

    #[test]
    fn test_predicted_position_follows_velocity() {
        // Heading north at the equator moves along +Z
        let snap = snapshot(&ship(0.0, 0.0, 0.0, 10.0));
        let baseline = Baseline {
            snapshot: snap,
            sent_at: t0(),
        };
        let predicted = baseline.predicted_position(at(2.0));
        assert!((predicted.z() - snap.position.z() - 20.0).abs() < 1e-6);
        assert!((predicted.x() - snap.position.x()).abs() < 1e-6);
    }

    #[test]
    fn test_thresholds_from_config() {
        let thresholds = DeadReckoningThresholds::default();
        assert_eq!(thresholds.position_m, 1.0);
        assert_eq!(thresholds.heartbeat, Duration::from_secs(5));
        assert!((thresholds.orientation_rad - 3f64.to_radians()).abs() < 1e-12);
    }
}
