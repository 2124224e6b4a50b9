//! Configuration management for the OmniDIS PDU dispatcher.
//!
//! This module provides the configuration surface exposed to the hosting
//! application:
//! - Loading from YAML files
//! - Environment variable overrides (`OMNIDIS__SECTION__KEY`)
//! - Validation of identity, timing policy and network settings

use crate::error::{ConfigError, Result};
use crate::session::SessionContext;
use crate::types::{AngleUnit, ForceId, SpeedUnit, TimestampKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Maximum marking length carried by an Entity State PDU.
pub const MARKING_CAPACITY: usize = 11;

/// Main application configuration.
///
/// # Examples
///
/// ```no_run
/// use omnidis_core::config::AppConfig;
///
/// let config = AppConfig::from_file("config/omnidis.yaml").unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Exercise identity
    #[serde(default)]
    pub exercise: ExerciseConfig,

    /// Local entity description
    #[serde(default)]
    pub entity: EntityConfig,

    /// Heartbeat and dead-reckoning policy
    #[serde(default)]
    pub dead_reckoning: DeadReckoningConfig,

    /// Units of the telemetry fed to the dispatcher
    #[serde(default)]
    pub units: UnitsConfig,

    /// Multicast/broadcast transport settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate, layering environment
    /// variables (`OMNIDIS__EXERCISE__SITE_ID=2`) over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or merged.
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("OMNIDIS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates the configuration.
    ///
    /// Entity type names are resolved later by the PDU layer's registry; here
    /// only structural constraints are checked.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self) -> Result<()> {
        self.exercise.validate()?;
        self.entity.validate()?;
        self.dead_reckoning.validate()?;
        self.network.validate()?;
        self.logging.parse_level()?;
        Ok(())
    }

    /// Builds the session context described by the `exercise` section.
    pub fn session(&self) -> Result<SessionContext> {
        self.exercise.session().map_err(Into::into)
    }
}

/// Exercise identity settings.
///
/// Values are held wider than their wire width so out-of-range input is
/// reported instead of silently truncated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseConfig {
    #[serde(default = "default_one")]
    pub site_id: u32,

    #[serde(default = "default_one")]
    pub application_id: u32,

    #[serde(default = "default_one")]
    pub exercise_id: u32,

    /// Relative or absolute header timestamps
    #[serde(default)]
    pub timestamp: TimestampKind,
}

fn default_one() -> u32 {
    1
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            site_id: 1,
            application_id: 1,
            exercise_id: 1,
            timestamp: TimestampKind::Relative,
        }
    }
}

impl ExerciseConfig {
    /// Validates identity ranges.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.session().map(|_| ())
    }

    /// Builds the session context.
    pub fn session(&self) -> std::result::Result<SessionContext, ConfigError> {
        SessionContext::try_new(
            self.site_id.into(),
            self.application_id.into(),
            self.exercise_id.into(),
            self.timestamp,
        )
        .map_err(|e| match e {
            ConfigError::IdentityOutOfRange { field, value, max } => {
                ConfigError::identity_out_of_range(format!("exercise.{field}"), value, max)
            }
            other => other,
        })
    }
}

/// Description of the local entity announced by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Entity number within this site/application
    #[serde(default = "default_one")]
    pub entity_id: u32,

    /// Entity type name or raw `kind:domain:country:category:subcategory:specific:extra` code
    #[serde(default = "default_entity_type")]
    pub entity_type: String,

    /// Marking text (ASCII, truncated to 11 characters)
    #[serde(default)]
    pub marking: String,

    /// Force the entity belongs to
    #[serde(default)]
    pub force: ForceId,

    /// Additional name → raw code entries for the entity type lookup table
    #[serde(default)]
    pub type_table: HashMap<String, String>,
}

fn default_entity_type() -> String {
    "generic_ship_container_class_medium".to_string()
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            entity_id: 1,
            entity_type: default_entity_type(),
            marking: String::new(),
            force: ForceId::Friendly,
            type_table: HashMap::new(),
        }
    }
}

impl EntityConfig {
    /// Validates the entity description.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.entity_number()?;

        if self.entity_type.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "entity.entity_type",
                "Entity type cannot be empty",
            ));
        }

        if !self.marking.is_ascii() {
            return Err(ConfigError::invalid_value(
                "entity.marking",
                "Marking must be ASCII text",
            ));
        }

        if self.marking.len() > MARKING_CAPACITY {
            tracing::debug!(
                marking = %self.marking,
                "Marking longer than {} characters will be truncated",
                MARKING_CAPACITY
            );
        }

        Ok(())
    }

    /// Entity number narrowed to its wire width.
    pub fn entity_number(&self) -> std::result::Result<u16, ConfigError> {
        u16::try_from(self.entity_id).map_err(|_| {
            ConfigError::identity_out_of_range(
                "entity.entity_id",
                self.entity_id.into(),
                u16::MAX as u64,
            )
        })
    }
}

/// Heartbeat and dead-reckoning policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadReckoningConfig {
    /// Maximum interval between Entity State PDUs in seconds
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: f64,

    /// Position error in meters that forces an update
    #[serde(default = "default_position_threshold")]
    pub position_threshold_m: f64,

    /// Orientation error in degrees that forces an update
    #[serde(default = "default_orientation_threshold")]
    pub orientation_threshold_deg: f64,

    /// Interval between scheduler evaluations in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_heartbeat_secs() -> f64 {
    5.0
}

fn default_position_threshold() -> f64 {
    1.0
}

fn default_orientation_threshold() -> f64 {
    3.0
}

fn default_tick_interval() -> u64 {
    250
}

impl Default for DeadReckoningConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            position_threshold_m: default_position_threshold(),
            orientation_threshold_deg: default_orientation_threshold(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl DeadReckoningConfig {
    /// Validates the timing policy.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.heartbeat_secs.is_finite() && self.heartbeat_secs > 0.0) {
            return Err(ConfigError::invalid_value(
                "dead_reckoning.heartbeat_secs",
                "Heartbeat timeout must be a positive number of seconds",
            ));
        }

        if Duration::try_from_secs_f64(self.heartbeat_secs).is_err() {
            return Err(ConfigError::invalid_value(
                "dead_reckoning.heartbeat_secs",
                format!("Heartbeat timeout of {} s is too large", self.heartbeat_secs),
            ));
        }

        if !(self.position_threshold_m.is_finite() && self.position_threshold_m > 0.0) {
            return Err(ConfigError::invalid_value(
                "dead_reckoning.position_threshold_m",
                "Position threshold must be a positive distance",
            ));
        }

        if !(self.orientation_threshold_deg.is_finite() && self.orientation_threshold_deg > 0.0) {
            return Err(ConfigError::invalid_value(
                "dead_reckoning.orientation_threshold_deg",
                "Orientation threshold must be a positive angle",
            ));
        }

        if self.tick_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "dead_reckoning.tick_interval_ms",
                "Tick interval cannot be 0",
            ));
        }

        if self.tick_interval() >= self.heartbeat() {
            return Err(ConfigError::validation_failed(format!(
                "Tick interval ({} ms) must be shorter than the heartbeat timeout ({} s)",
                self.tick_interval_ms, self.heartbeat_secs
            )));
        }

        Ok(())
    }

    /// Heartbeat timeout as a Duration, saturating for values `validate` rejects.
    pub fn heartbeat(&self) -> Duration {
        if self.heartbeat_secs.is_nan() || self.heartbeat_secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.heartbeat_secs).unwrap_or(Duration::MAX)
    }

    /// Tick interval as a Duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Orientation threshold in radians.
    pub fn orientation_threshold_rad(&self) -> f64 {
        self.orientation_threshold_deg.to_radians()
    }
}

/// Units of the telemetry supplied each tick.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UnitsConfig {
    #[serde(default)]
    pub angles: AngleUnit,

    #[serde(default)]
    pub speed: SpeedUnit,
}

/// Multicast/broadcast transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Destination group or broadcast address
    #[serde(default = "default_group")]
    pub group: String,

    /// Destination UDP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Local interface used for multicast membership
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Multicast TTL
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Whether our own datagrams are looped back to local listeners
    #[serde(default = "default_true")]
    pub loopback: bool,
}

fn default_group() -> String {
    "239.239.239.239".to_string()
}

fn default_port() -> u16 {
    20000
}

fn default_interface() -> String {
    Ipv4Addr::UNSPECIFIED.to_string()
}

fn default_ttl() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            group: default_group(),
            port: default_port(),
            interface: default_interface(),
            ttl: default_ttl(),
            loopback: true,
        }
    }
}

impl NetworkConfig {
    /// Validates the network settings.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.group_addr()?;
        self.interface_addr()?;

        if self.port == 0 {
            return Err(ConfigError::invalid_value(
                "network.port",
                "Port cannot be 0",
            ));
        }

        if self.ttl > u8::MAX as u32 {
            return Err(ConfigError::invalid_value(
                "network.ttl",
                format!("Multicast TTL {} exceeds {}", self.ttl, u8::MAX),
            ));
        }

        Ok(())
    }

    /// Parsed destination address.
    pub fn group_addr(&self) -> std::result::Result<IpAddr, ConfigError> {
        self.group.parse().map_err(|_| {
            ConfigError::invalid_value("network.group", format!("Invalid address: {}", self.group))
        })
    }

    /// Parsed local interface address.
    pub fn interface_addr(&self) -> std::result::Result<Ipv4Addr, ConfigError> {
        self.interface.parse().map_err(|_| {
            ConfigError::invalid_value(
                "network.interface",
                format!("Invalid IPv4 interface: {}", self.interface),
            )
        })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("Invalid log level: {}", self.level),
            }
            .into()
        })
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
}
