//! # OmniDIS Core
//!
//! Core types, session state, error handling, and configuration for the OmniDIS
//! PDU dispatcher.
//!
//! - **Session**: [`SessionContext`] holds the exercise identity and the
//!   exercise-wide PDU sequence counter, and produces DIS timestamps.
//! - **Types**: entity identifiers, force ids and telemetry units.
//! - **Errors**: `thiserror` based error types; configuration problems are
//!   reported as [`error::ConfigError`].
//! - **Configuration**: YAML files with environment variable overrides.
//!
//! ## Example
//!
//! ```
//! use omnidis_core::SessionContext;
//!
//! let session = SessionContext::new(1, 1, 1);
//! let first = session.next_sequence();
//! assert_eq!(session.next_sequence(), first + 1);
//! ```

pub mod config;
pub mod error;
pub mod session;
pub mod types;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use error::{ConfigError, OmniDisError, Result};
pub use session::{ClockTime, SessionContext};
pub use types::{EntityId, ExerciseIdentity, ForceId, TimestampKind};
