//! Foundation utilities shared by the sidecar crates

pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod types;

pub use error::{ConfigError, ErrorCategory, SidecarError, UserFriendlyError};
pub use exit_codes::ExitCode;
pub use types::{ConfigSource, RunMode};
