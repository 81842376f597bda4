//! Configuration management for the sidecar supervisor
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > file > defaults. The TOML file has `[service]`, `[network]`,
//! `[shutdown]`, `[credentials]`, `[readiness]`, `[output]` and `[env]` sections.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::{CONFIG_DIR, CONFIG_FILE, HOME_ENV};
pub use model::{
    Config, CredentialsSection, EnvNames, NetworkSection, OutputSection, PortStrategy,
    ReadinessSection, ServiceSection, ShutdownSection,
};
pub use model::{
    DEFAULT_CAPTURE_BYTES, DEFAULT_COMMAND, DEFAULT_HOST, DEFAULT_KEY_LENGTH, DEFAULT_PORT,
    DEFAULT_READINESS_PATH, DEFAULT_SHUTDOWN_PATH, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use sidecar_utils::types::ConfigSource;
pub use validation::{MAX_KEY_LENGTH, MIN_KEY_LENGTH, is_loopback_host};
