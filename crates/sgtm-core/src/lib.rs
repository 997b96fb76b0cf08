pub mod config;
pub mod context;
pub mod error;
pub mod settings;
pub mod tiers;

pub use config::StackFile;
pub use context::Context;
pub use error::{ConfigError, ConfigResult};
pub use settings::{CertificateSource, Environment, HostedZone, ScalingSettings, StackSettings};
pub use tiers::{TierError, validate};
