//! Logging for Mochi.
//!
//! Mochi logs through the `tracing` macros. This crate installs a
//! `tracing-subscriber` registry configured from [`LoggingConfig`] and
//! exports the field names the framework uses, so application logs line up
//! with the built-in request log.
//!
//! # Example
//!
//! ```rust,no_run
//! use mochi_telemetry::{init_logging, LogFormat, LoggingConfig};
//!
//! let config = LoggingConfig {
//!     level: "mochi=debug,info".to_string(),
//!     format: LogFormat::Compact,
//!     ..LoggingConfig::default()
//! };
//! init_logging(&config).expect("logging already initialised");
//!
//! tracing::info!(operation = "show", "handled");
//! ```

#![doc(html_root_url = "https://docs.rs/mochi-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
pub mod logging;

pub use config::{LogFormat, LoggingConfig};
pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
