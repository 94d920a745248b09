//! Vigil Telemetry - logging setup for processes embedding the auditor.
//!
//! The audit crates only emit `tracing` events and spans; this crate turns
//! them into output. Every audit pass runs inside an `audit` span carrying
//! the group id, so a `json` subscriber yields one correlated record stream
//! per group.
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), vigil_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("vigil_audit=debug");
//! setup_logging(&config)?;
//! tracing::info!("auditor starting");
//! # Ok(())
//! # }
//! ```
//!
//! With the **`config`** feature, [`LogConfig`] converts from
//! `vigil_config::LoggingSection`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging,
};
