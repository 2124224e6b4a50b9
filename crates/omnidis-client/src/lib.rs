//! # omnidis-client
//!
//! Sending side of the OmniDIS PDU dispatcher.
//!
//! - **Dispatcher**: [`PduDispatcher`] announces one local entity, gating
//!   Entity State updates through the heartbeat scheduler
//! - **Scheduler**: [`HeartbeatScheduler`] decides per tick whether an update
//!   is due (heartbeat timeout or dead-reckoning threshold)
//! - **Transport**: the [`Transport`] trait, with a UDP multicast/broadcast
//!   implementation and an in-memory recorder
//! - **Metrics**: sent, failed, suppressed and skipped counters
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use omnidis_client::{
//!     DeadReckoningThresholds, EntityProfile, PduDispatcher, UdpTransport, UdpTransportConfig,
//! };
//! use omnidis_core::AppConfig;
//! use omnidis_pdu::simulation::{FrozenBehavior, StopReason};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::default();
//!     let session = Arc::new(config.session()?);
//!     let transport = UdpTransport::bind(UdpTransportConfig::from_network(&config.network)?).await?;
//!     let profile = EntityProfile::from_config(&config, &session)?;
//!
//!     let mut dispatcher = PduDispatcher::new(
//!         session,
//!         Arc::new(transport),
//!         profile,
//!         DeadReckoningThresholds::from(&config.dead_reckoning),
//!     );
//!
//!     dispatcher.start_exercise(None, Utc::now()).await?;
//!     // dispatcher.tick(&kinematics, Utc::now()).await?;
//!     dispatcher
//!         .stop_exercise(StopReason::Termination, FrozenBehavior::default(), Utc::now())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod scheduler;
pub mod state;
pub mod transport;
pub mod udp;

// Re-export commonly used types
pub use dispatcher::{EntityProfile, PduDispatcher, TickOutcome};
pub use error::{DispatchError, TransportError};
pub use scheduler::{DeadReckoningThresholds, HeartbeatScheduler, SchedulerState, SendDecision};
pub use state::{DispatchMetrics, MetricsSnapshot};
pub use transport::{MemoryTransport, Transport};
pub use udp::{UdpTransport, UdpTransportConfig};

// Re-export bytes for convenience
pub use bytes::Bytes;
