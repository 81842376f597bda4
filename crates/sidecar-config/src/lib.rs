//! Configuration model, discovery, and validation for the sidecar supervisor

pub mod config;

pub use config::{CliArgs, Config, ConfigBuilder, ConfigSource, EnvNames, PortStrategy};
