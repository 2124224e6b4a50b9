//! omnidis - announce a simulated ship to a DIS exercise
//!
//! Sends a Start/Resume PDU, then Entity State PDUs for a ship moving at
//! constant speed and heading (gated by the heartbeat scheduler), and a
//! Stop/Freeze PDU on Ctrl-C or when the run time ends.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use omnidis_client::{
    DeadReckoningThresholds, EntityProfile, PduDispatcher, TickOutcome, UdpTransport,
    UdpTransportConfig,
};
use omnidis_core::config::LogFormat;
use omnidis_core::AppConfig;
use omnidis_pdu::entity_state::EntityKinematics;
use omnidis_pdu::geo::{
    GeodeticPosition, KinematicUnits, Orientation, VelocityVector, WGS84_A, WGS84_E2,
};
use omnidis_pdu::simulation::{FrozenBehavior, StopReason};
use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// OmniDIS - DIS Entity State and simulation management PDU dispatcher
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (built-in defaults if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override site id
    #[arg(long)]
    site_id: Option<u32>,

    /// Override application id
    #[arg(long)]
    application_id: Option<u32>,

    /// Override exercise id
    #[arg(long)]
    exercise_id: Option<u32>,

    /// Override entity number
    #[arg(long)]
    entity_id: Option<u32>,

    /// Entity type name or code (e.g. generic_ship_container_class_small)
    #[arg(long)]
    entity_type: Option<String>,

    /// Entity marking (truncated to 11 characters)
    #[arg(long)]
    marking: Option<String>,

    /// Latitude in decimal degrees
    #[arg(long, default_value = "57.66")]
    lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, default_value = "12.44")]
    lon: f64,

    /// Altitude in meters (Height Above Ellipsoid)
    #[arg(long, default_value = "0.0")]
    alt: f64,

    /// Heading in degrees clockwise from north
    #[arg(long, default_value = "0.0")]
    heading: f64,

    /// Speed in meters per second
    #[arg(long, default_value = "0.0")]
    speed: f64,

    /// Run time in seconds (0 runs until Ctrl-C)
    #[arg(long, default_value = "0")]
    run_time: u64,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long, env = "OMNIDIS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(site_id) = self.site_id {
            config.exercise.site_id = site_id;
        }
        if let Some(application_id) = self.application_id {
            config.exercise.application_id = application_id;
        }
        if let Some(exercise_id) = self.exercise_id {
            config.exercise.exercise_id = exercise_id;
        }
        if let Some(entity_id) = self.entity_id {
            config.entity.entity_id = entity_id;
        }
        if let Some(entity_type) = &self.entity_type {
            config.entity.entity_type = entity_type.clone();
        }
        if let Some(marking) = &self.marking {
            config.entity.marking = marking.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.format = LogFormat::Json;
        }
    }

    fn run_time(&self) -> Option<Duration> {
        (self.run_time > 0).then(|| Duration::from_secs(self.run_time))
    }
}

/// Ship moving at constant speed and heading from a starting position.
#[derive(Debug, Clone, Copy)]
struct ShipTrack {
    origin: GeodeticPosition,
    /// Radians clockwise from north
    heading: f64,
    /// Meters per second
    speed: f64,
}

impl ShipTrack {
    fn new(origin: GeodeticPosition, heading_deg: f64, speed: f64) -> Self {
        Self {
            origin,
            heading: heading_deg.to_radians(),
            speed,
        }
    }

    /// Kinematics after `elapsed` seconds, in SI units.
    fn at(&self, elapsed: f64) -> EntityKinematics {
        let lat = self.origin.latitude.to_radians();
        let s = lat.sin();
        let w = (1.0 - WGS84_E2 * s * s).sqrt();
        let meridian_radius = WGS84_A * (1.0 - WGS84_E2) / (w * w * w);
        let parallel_radius = (WGS84_A / w * lat.cos()).max(1.0);

        let distance = self.speed * elapsed;
        let north = distance * self.heading.cos();
        let east = distance * self.heading.sin();

        let latitude = self.origin.latitude + (north / meridian_radius).to_degrees();
        let mut longitude = self.origin.longitude + (east / parallel_radius).to_degrees();
        let mut heading = self.heading;

        // Past a pole the track comes back down the opposite meridian
        let folded = (latitude + 90.0).rem_euclid(360.0);
        let latitude = if folded <= 180.0 {
            folded - 90.0
        } else {
            longitude += 180.0;
            heading = PI - heading;
            270.0 - folded
        };
        let longitude = (longitude + 540.0).rem_euclid(360.0) - 180.0;

        EntityKinematics::new(
            GeodeticPosition::new(latitude, longitude, self.origin.altitude),
            Orientation::new(heading, 0.0, 0.0),
            VelocityVector::new(self.speed, 0.0, 0.0),
        )
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let level = config.logging.parse_level()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    match config.logging.format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    Ok(())
}

fn elapsed_secs(started: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    now.signed_duration_since(started)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => AppConfig::from_config_builder(path)
            .with_context(|| format!("Failed to load config file: {:?}", path))?,
        None => AppConfig::default(),
    };
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging(&config)?;

    let session = Arc::new(config.session()?);
    info!("Exercise identity: {}", session.identity());
    info!(
        "Destination: {}:{}",
        config.network.group, config.network.port
    );

    let transport = UdpTransport::bind(UdpTransportConfig::from_network(&config.network)?)
        .await
        .context("Failed to open DIS socket")?;
    let transport = Arc::new(transport);

    // The simulated track reports SI units regardless of the configured telemetry units
    let profile = EntityProfile::from_config(&config, &session)
        .context("Failed to resolve entity")?
        .with_units(KinematicUnits::default());

    let mut dispatcher = PduDispatcher::new(
        session.clone(),
        transport.clone(),
        profile,
        DeadReckoningThresholds::from(&config.dead_reckoning),
    );

    let origin = GeodeticPosition::new(args.lat, args.lon, args.alt);
    origin.validate().context("Invalid starting position")?;
    let track = ShipTrack::new(origin, args.heading, args.speed);

    let started = Utc::now();
    dispatcher
        .start_exercise(None, started)
        .await
        .context("Failed to send Start/Resume PDU")?;

    let mut interval = tokio::time::interval(config.dead_reckoning.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let run_time = args.run_time();
    let deadline = async move {
        match run_time {
            Some(run_time) => tokio::time::sleep(run_time).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Utc::now();
                let kinematics = track.at(elapsed_secs(started, now));
                match dispatcher.tick(&kinematics, now).await {
                    Ok(TickOutcome::Sent { sequence, reason }) => {
                        debug!(sequence, %reason, "Entity State update");
                    }
                    Ok(TickOutcome::Suppressed) => {}
                    Err(e) if e.is_input_error() => warn!("Skipped tick: {}", e),
                    Err(e) => warn!("Tick failed: {}", e),
                }
            }
            _ = &mut deadline => {
                info!("Run time elapsed, stopping exercise...");
                break;
            }
            _ = &mut ctrl_c => {
                info!("Received shutdown signal, stopping exercise...");
                break;
            }
        }
    }

    if let Err(e) = dispatcher
        .stop_exercise(StopReason::Termination, FrozenBehavior::default(), Utc::now())
        .await
    {
        error!("Failed to send Stop/Freeze PDU: {}", e);
    }
    if let Err(e) = transport.leave() {
        warn!("Failed to leave multicast group: {}", e);
    }

    let metrics = dispatcher.metrics().snapshot();
    info!(
        "Sent {} PDUs ({} bytes), {} send failures, {} suppressed ticks",
        metrics.pdus_sent, metrics.bytes_sent, metrics.send_failures, metrics.suppressed_ticks
    );
    debug!("Final metrics: {}", serde_json::to_string(&metrics)?);

    Ok(())
}
