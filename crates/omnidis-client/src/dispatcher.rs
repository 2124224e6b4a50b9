//! Per-entity PDU dispatcher.
//!
//! Ties together the session, the Entity State codec, the heartbeat
//! scheduler and a transport. One dispatcher owns one local entity; several
//! dispatchers may share a session (and so its sequence counter) and a
//! transport.

use crate::error::DispatchError;
use crate::scheduler::{
    DeadReckoningThresholds, HeartbeatScheduler, KinematicSnapshot, SendDecision,
};
use crate::state::DispatchMetrics;
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use omnidis_core::config::AppConfig;
use omnidis_core::{ConfigError, EntityId, SessionContext};
use omnidis_pdu::entity_state::{self, EntityDescriptor, EntityKinematics, EntityMarking};
use omnidis_pdu::entity_type::EntityTypeRegistry;
use omnidis_pdu::geo::KinematicUnits;
use omnidis_pdu::simulation::{self, FrozenBehavior, StopReason};
use omnidis_pdu::{EncodedPdu, PduError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the dispatcher knows about its entity besides per-tick kinematics
#[derive(Debug, Clone, PartialEq)]
pub struct EntityProfile {
    pub descriptor: EntityDescriptor,
    /// Units the telemetry source reports in
    pub units: KinematicUnits,
}

impl EntityProfile {
    pub fn new(descriptor: EntityDescriptor) -> Self {
        Self {
            descriptor,
            units: KinematicUnits::default(),
        }
    }

    pub fn with_units(mut self, units: KinematicUnits) -> Self {
        self.units = units;
        self
    }

    /// Resolves the `entity` and `units` sections against the session.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown entity type, a malformed type
    /// table entry, an out-of-range entity number or a non-ASCII marking.
    pub fn from_config(config: &AppConfig, session: &SessionContext) -> Result<Self, ConfigError> {
        let entity = &config.entity;
        let registry = EntityTypeRegistry::with_table(&entity.type_table)?;
        let entity_type = registry.resolve(&entity.entity_type)?;
        let marking = EntityMarking::new(&entity.marking)
            .map_err(|e| ConfigError::invalid_value("entity.marking", e.to_string()))?;

        let descriptor = EntityDescriptor::new(
            session.identity().entity(entity.entity_number()?),
            entity_type,
            marking,
        )
        .with_force(entity.force);

        Ok(Self::new(descriptor).with_units(KinematicUnits::new(
            config.units.angles,
            config.units.speed,
        )))
    }

    pub fn entity_id(&self) -> EntityId {
        self.descriptor.entity_id
    }
}

/// Result of a tick that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Sent { sequence: u32, reason: SendDecision },
    Suppressed,
}

impl TickOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, TickOutcome::Sent { .. })
    }
}

/// Emits the PDUs of one local entity.
pub struct PduDispatcher {
    session: Arc<SessionContext>,
    transport: Arc<dyn Transport>,
    profile: EntityProfile,
    scheduler: HeartbeatScheduler,
    metrics: DispatchMetrics,
}

impl PduDispatcher {
    pub fn new(
        session: Arc<SessionContext>,
        transport: Arc<dyn Transport>,
        profile: EntityProfile,
        thresholds: DeadReckoningThresholds,
    ) -> Self {
        info!(
            entity = %profile.entity_id(),
            entity_type = %profile.descriptor.entity_type,
            marking = %profile.descriptor.marking,
            "Created PDU dispatcher"
        );

        Self {
            session,
            transport,
            profile,
            scheduler: HeartbeatScheduler::new(thresholds),
            metrics: DispatchMetrics::new(),
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn profile(&self) -> &EntityProfile {
        &self.profile
    }

    pub fn scheduler(&self) -> &HeartbeatScheduler {
        &self.scheduler
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    /// Replaces the marking carried by subsequent Entity State PDUs.
    pub fn set_marking(&mut self, text: &str) -> Result<(), PduError> {
        self.profile.descriptor.marking = EntityMarking::new(text)?;
        Ok(())
    }

    /// Sends a Start/Resume PDU. Simulation time defaults to `now`.
    pub async fn start_exercise(
        &mut self,
        simulation_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<u32, DispatchError> {
        let pdu = simulation::build_start_resume(&self.session, Some(now), simulation_time, now);
        let sequence = pdu.sequence;
        self.transmit(pdu).await?;

        info!(
            identity = %self.session.identity(),
            sequence,
            "Sent Start/Resume PDU"
        );
        Ok(sequence)
    }

    /// Evaluates one tick and sends an Entity State PDU if one is due.
    ///
    /// Invalid input skips the tick; a transport failure is counted and
    /// returned without retry. Neither moves the dead-reckoning baseline.
    pub async fn tick(
        &mut self,
        kinematics: &EntityKinematics,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, DispatchError> {
        let kinematics = kinematics.normalized(&self.profile.units);
        let snapshot = match KinematicSnapshot::from_kinematics(&kinematics) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.metrics.record_skipped();
                warn!(entity = %self.profile.entity_id(), error = %e, "Skipping tick with invalid input");
                return Err(e.into());
            }
        };

        let decision = self.scheduler.evaluate(&snapshot, now);
        if !decision.should_send() {
            self.metrics.record_suppressed();
            return Ok(TickOutcome::Suppressed);
        }

        let sequence = self.emit_entity_state(&kinematics, snapshot, now).await?;
        debug!(entity = %self.profile.entity_id(), sequence, reason = %decision, "Sent Entity State PDU");

        Ok(TickOutcome::Sent {
            sequence,
            reason: decision,
        })
    }

    /// Sends an Entity State PDU now, bypassing the scheduler gate.
    pub async fn send_entity_state(
        &mut self,
        kinematics: &EntityKinematics,
        now: DateTime<Utc>,
    ) -> Result<u32, DispatchError> {
        let kinematics = kinematics.normalized(&self.profile.units);
        let snapshot = KinematicSnapshot::from_kinematics(&kinematics).inspect_err(|_| {
            self.metrics.record_skipped();
        })?;

        self.emit_entity_state(&kinematics, snapshot, now).await
    }

    /// Sends a Stop/Freeze PDU and returns the scheduler to Idle.
    pub async fn stop_exercise(
        &mut self,
        reason: StopReason,
        frozen_behavior: FrozenBehavior,
        now: DateTime<Utc>,
    ) -> Result<u32, DispatchError> {
        let pdu = simulation::build_stop_freeze(&self.session, reason, frozen_behavior, now);
        let sequence = pdu.sequence;
        self.scheduler.reset();
        self.transmit(pdu).await?;

        info!(
            identity = %self.session.identity(),
            sequence,
            ?reason,
            "Sent Stop/Freeze PDU"
        );
        Ok(sequence)
    }

    async fn emit_entity_state(
        &mut self,
        kinematics: &EntityKinematics,
        snapshot: KinematicSnapshot,
        now: DateTime<Utc>,
    ) -> Result<u32, DispatchError> {
        let pdu = entity_state::encode(&self.profile.descriptor, kinematics, &self.session, now)
            .inspect_err(|_| self.metrics.record_skipped())?;
        let sequence = pdu.sequence;

        self.transmit(pdu).await?;
        self.scheduler.record_send(snapshot, now);
        Ok(sequence)
    }

    async fn transmit(&self, pdu: EncodedPdu) -> Result<(), DispatchError> {
        let len = pdu.len() as u64;
        let pdu_type = pdu.pdu_type;

        match self.transport.send(pdu.data).await {
            Ok(()) => {
                self.metrics.record_sent(len);
                Ok(())
            }
            Err(e) => {
                self.metrics.record_send_failure();
                warn!(%pdu_type, sequence = pdu.sequence, error = %e, "Failed to send PDU");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::MemoryTransport;
    use chrono::TimeZone;
    use omnidis_core::types::{AngleUnit, SpeedUnit};
    use omnidis_pdu::entity_state::EntityStatePdu;
    use omnidis_pdu::geo::{GeodeticPosition, Orientation, VelocityVector};
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn at(secs: f64) -> DateTime<Utc> {
        t0() + chrono::Duration::milliseconds((secs * 1000.0) as i64)
    }

    fn dispatcher(transport: Arc<MemoryTransport>) -> PduDispatcher {
        let session = Arc::new(SessionContext::new(1, 1, 1));
        let mut config = AppConfig::default();
        config.entity.entity_type = "generic_ship_container_class_small".to_string();
        config.entity.marking = "Hi Reto".to_string();
        let profile = EntityProfile::from_config(&config, &session).unwrap();

        PduDispatcher::new(
            session,
            transport,
            profile,
            DeadReckoningThresholds {
                position_m: 5.0,
                orientation_rad: 3f64.to_radians(),
                heartbeat: Duration::from_secs(5),
            },
        )
    }

    fn ship() -> EntityKinematics {
        EntityKinematics::new(
            GeodeticPosition::new(57.66, 12.44, 0.0),
            Orientation::new(0.3, 0.0, 0.0),
            VelocityVector::new(2.0, 0.0, 0.0),
        )
    }

    #[test]
    fn test_profile_from_config() {
        let session = SessionContext::new(3, 4, 1);
        let mut config = AppConfig::default();
        config.entity.entity_id = 9;
        config.units.angles = AngleUnit::Degrees;

        let profile = EntityProfile::from_config(&config, &session).unwrap();
        assert_eq!(profile.entity_id(), EntityId::new(3, 4, 9));
        assert_eq!(profile.descriptor.entity_type.subcategory, 2);
        assert_eq!(profile.units.angles, AngleUnit::Degrees);

        config.entity.entity_type = "frigate".to_string();
        assert!(matches!(
            EntityProfile::from_config(&config, &session),
            Err(ConfigError::UnknownEntityType { .. })
        ));
    }

    #[tokio::test]
    async fn test_first_tick_announces_entity() {
        let transport = Arc::new(MemoryTransport::new());
        let mut dispatcher = dispatcher(transport.clone());

        let outcome = dispatcher.tick(&ship(), t0()).await.unwrap();
        assert!(matches!(
            outcome,
            TickOutcome::Sent {
                reason: SendDecision::Initial,
                ..
            }
        ));
        assert_eq!(transport.sent_count(), 1);
        assert!(dispatcher.scheduler().is_tracking());
    }

    #[tokio::test]
    async fn test_suppresses_predicted_motion() {
        let transport = Arc::new(MemoryTransport::new());
        let mut dispatcher = dispatcher(transport.clone());
        dispatcher.tick(&ship(), t0()).await.unwrap();

        // Standing still for 1 s: 2 m from the prediction, under 5 m
        let outcome = dispatcher.tick(&ship(), at(1.0)).await.unwrap();
        assert_eq!(outcome, TickOutcome::Suppressed);
        assert_eq!(transport.sent_count(), 1);
        assert_eq!(dispatcher.metrics().suppressed_ticks(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_skips_tick() {
        let transport = Arc::new(MemoryTransport::new());
        let mut dispatcher = dispatcher(transport.clone());

        let mut bad = ship();
        bad.position.longitude = 200.0;
        let err = dispatcher.tick(&bad, t0()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Pdu(PduError::InvalidLongitude(_))));
        assert_eq!(dispatcher.metrics().skipped_ticks(), 1);
        assert_eq!(dispatcher.session().peek_sequence(), 0);

        // Next good tick proceeds normally
        assert!(dispatcher.tick(&ship(), t0()).await.unwrap().is_sent());
    }

    #[tokio::test]
    async fn test_failed_send_keeps_scheduler_idle() {
        let transport = Arc::new(MemoryTransport::new());
        let mut dispatcher = dispatcher(transport.clone());
        transport.fail_next(TransportError::NotBound);

        let err = dispatcher.tick(&ship(), t0()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Transport(TransportError::NotBound)));
        assert_eq!(dispatcher.metrics().send_failures(), 1);
        assert!(!dispatcher.scheduler().is_tracking());

        // No retry; the next tick produces a fresh PDU
        assert_eq!(transport.sent_count(), 0);
        let outcome = dispatcher.tick(&ship(), at(0.25)).await.unwrap();
        assert!(outcome.is_sent());
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_resets_scheduler() {
        let transport = Arc::new(MemoryTransport::new());
        let mut dispatcher = dispatcher(transport.clone());

        dispatcher.start_exercise(None, t0()).await.unwrap();
        dispatcher.tick(&ship(), t0()).await.unwrap();
        assert!(dispatcher.scheduler().is_tracking());

        dispatcher
            .stop_exercise(StopReason::Termination, FrozenBehavior::default(), at(1.0))
            .await
            .unwrap();
        assert!(!dispatcher.scheduler().is_tracking());
        assert_eq!(dispatcher.metrics().pdus_sent(), 3);
    }

    #[tokio::test]
    async fn test_units_are_normalised_once() {
        let transport = Arc::new(MemoryTransport::new());
        let mut dispatcher = dispatcher(transport.clone());
        dispatcher.profile.units = KinematicUnits::new(AngleUnit::Degrees, SpeedUnit::Knots);

        let kinematics = EntityKinematics::new(
            GeodeticPosition::new(57.66, 12.44, 0.0),
            Orientation::new(0.3f64.to_degrees(), 0.0, 0.0),
            VelocityVector::new(10.0, 0.0, 0.0),
        );
        dispatcher.send_entity_state(&kinematics, t0()).await.unwrap();

        let pdu = EntityStatePdu::decode(&transport.sent()[0]).unwrap();
        assert!((pdu.linear_velocity[0] - 5.144_444).abs() < 1e-5);
        assert!((pdu.orientation[0] as f64 - 3.00774).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_set_marking() {
        let transport = Arc::new(MemoryTransport::new());
        let mut dispatcher = dispatcher(transport.clone());

        assert!(dispatcher.set_marking("Ärlig").is_err());
        dispatcher.set_marking("Hej Reto och Anna").unwrap();
        dispatcher.send_entity_state(&ship(), t0()).await.unwrap();

        let pdu = EntityStatePdu::decode(&transport.sent()[0]).unwrap();
        assert_eq!(pdu.marking.as_str(), "Hej Reto oc");
    }
}
