pub mod init;
pub mod synth;
pub mod tiers;
pub mod validate;

/// Default config file name, looked up relative to the working directory.
pub const CONFIG_FILE: &str = "sgtm.toml";
