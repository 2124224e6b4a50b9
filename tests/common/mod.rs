//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use omnidis_client::Bytes;
use omnidis_core::AppConfig;
use omnidis_pdu::entity_state::EntityKinematics;
use omnidis_pdu::geo::{GeodeticPosition, Orientation, VelocityVector};
use omnidis_pdu::{decode_pdu, Pdu};
use std::path::PathBuf;

/// Get the path to the sample configuration shipped with the binary
pub fn sample_config_path() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir).join("config").join("omnidis.yaml")
}

/// Fixed start of a simulated exercise
pub fn exercise_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Time `ms` milliseconds into the exercise
pub fn at_ms(ms: i64) -> DateTime<Utc> {
    exercise_start() + Duration::milliseconds(ms)
}

/// Configuration for the small container ship "Hi Reto" in exercise 1
pub fn hi_reto_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.exercise.site_id = 1;
    config.exercise.application_id = 1;
    config.exercise.exercise_id = 1;
    config.entity.entity_id = 1;
    config.entity.entity_type = "generic_ship_container_class_small".to_string();
    config.entity.marking = "Hi Reto".to_string();
    config
}

/// Ship at 57.66N 12.44E heading 0.3 rad, moving 2 m/s along its heading
pub fn hi_reto_kinematics() -> EntityKinematics {
    EntityKinematics::new(
        GeodeticPosition::new(57.66, 12.44, 0.0),
        Orientation::new(0.3, 0.0, 0.0),
        VelocityVector::new(2.0, 0.0, 0.0),
    )
}

/// Decode every recorded datagram, panicking on malformed output
pub fn decode_all(datagrams: &[Bytes]) -> Vec<Pdu> {
    datagrams
        .iter()
        .map(|datagram| decode_pdu(datagram).expect("Dispatcher emitted a malformed PDU"))
        .collect()
}

/// Request id of a simulation management PDU
pub fn request_id(pdu: &Pdu) -> Option<u32> {
    match pdu {
        Pdu::StartResume(start) => Some(start.request_id),
        Pdu::StopFreeze(stop) => Some(stop.request_id),
        Pdu::EntityState(_) => None,
    }
}
