//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::tiers::TierError;

/// Errors raised while loading or resolving stack configuration.
///
/// Every variant is fatal to the configuration run: nothing is declared
/// once one of these surfaces.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse stack config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render stack config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("'containerConfig' context variable is required")]
    MissingContainerConfig,

    #[error("invalid value '{value}' for context key '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("context override must be key=value, got '{0}'")]
    MalformedOverride(String),

    #[error("taskMinCapacity ({min}) exceeds taskMaxCapacity ({max})")]
    InvalidCapacity { min: u32, max: u32 },

    #[error("hostedZoneId '{0}' given without hostedZoneName")]
    MissingHostedZoneName(String),

    #[error("'domain' is required to issue a certificate in hosted zone '{0}'")]
    MissingDomain(String),

    #[error(transparent)]
    Tier(#[from] TierError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
