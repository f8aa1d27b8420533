//! Configuration for Mochi applications.
//!
//! [`MochiConfig`] groups the server, logging and view settings.
//! [`ConfigLoader`] builds one in layers, later layers winning:
//!
//! 1. defaults (or the [`development`](ConfigLoader::with_development) /
//!    [`production`](ConfigLoader::with_production) presets)
//! 2. a TOML or JSON file, chosen by extension
//! 3. a `.env` file
//! 4. environment variables named `PREFIX__SECTION__KEY`
//!
//! The result is validated before it is returned.
//!
//! # Example
//!
//! ```no_run
//! use mochi_config::ConfigLoader;
//!
//! # fn main() -> Result<(), mochi_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("mochi.toml")?
//!     .with_dotenv()
//!     .with_env_prefix("MOCHI")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/mochi-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{MochiConfig, ServerConfig, ViewsConfig};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use mochi_telemetry::{LogFormat, LoggingConfig};
