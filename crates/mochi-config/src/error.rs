//! Errors raised while assembling a [`MochiConfig`](crate::MochiConfig).

use std::path::PathBuf;
use thiserror::Error;

/// Why configuration could not be loaded or validated.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required file does not exist.
    #[error("config file {} does not exist", path.display())]
    Missing {
        /// The path that was tried.
        path: PathBuf,
    },

    /// A file exists but reading it failed.
    #[error("cannot read config file {}", path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Neither TOML nor JSON.
    #[error("unsupported config format `{0}`")]
    UnsupportedFormat(String),

    /// Malformed TOML.
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON, or a merged document that no longer fits the schema.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A variable under the prefix maps to no setting.
    #[error("{var} does not name a setting")]
    UnknownVariable {
        /// The variable name.
        var: String,
    },

    /// A variable maps to a setting but its value does not parse.
    #[error("{var}: {reason}")]
    Env {
        /// The variable name.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// A `.env` file exists but could not be loaded.
    #[error("cannot load .env: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// A value parsed but is out of range.
    #[error("{field}: {reason}")]
    Invalid {
        /// Dotted setting path, e.g. `server.http_addr`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn missing(path: impl Into<PathBuf>) -> Self {
        Self::Missing { path: path.into() }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            reason: reason.into(),
        }
    }
}
