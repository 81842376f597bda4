use std::fmt;
use thiserror::Error;

pub use sidecar_runner::{LaunchError, RunnerError};

use crate::exit_codes::ExitCode;

/// Library-level error type for supervisor operations.
///
/// Only `start()`, `base_url()`, readiness waits and configuration loading
/// return errors. Shutdown never does: its failures are logged and swallowed.
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration errors, invalid service settings |
/// | 3 | Supervisor already running |
/// | 4 | No free port found |
/// | 5 | Service not ready / exited early / not running |
/// | 70 | Child process could not be launched |
/// | 1 | Other errors |
#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    #[error("No free loopback port found after {attempts} attempts starting at {start}")]
    PortUnavailable { start: u16, attempts: u32 },

    #[error("Supervisor is already {state}; stop it before starting again")]
    AlreadyRunning { state: String },

    #[error("Supervisor is not running")]
    NotRunning,

    #[error("Invalid service settings: {reason}")]
    InvalidService { reason: String },

    #[error("Service at {url} not ready after {waited_ms} ms")]
    NotReady { url: String, waited_ms: u128 },

    #[error("Service exited before becoming ready ({status})")]
    ChildExited { status: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    fn user_message(&self) -> String;

    fn context(&self) -> Option<String>;

    fn suggestions(&self) -> Vec<String>;

    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for grouping in CLI output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Launch,
    Lifecycle,
    Network,
    FileSystem,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Launch => write!(f, "Launch"),
            Self::Lifecycle => write!(f, "Lifecycle"),
            Self::Network => write!(f, "Network"),
            Self::FileSystem => write!(f, "File System"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

impl ConfigError {
    /// Shorthand for the most common variant.
    #[must_use]
    pub fn invalid(key: &str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::MissingRequired(key) => {
                format!("Required configuration '{key}' is missing")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => {
                format!("Configuration file not found: {path}")
            }
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [service], [network] and [shutdown] sections."
                    .to_string(),
            ),
            Self::MissingRequired(_) => None,
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' option has specific format requirements."
            )),
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => Some(
                "sidecar looks for $SIDECAR_HOME/config.toml, then .sidecar/config.toml upward from the current directory."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of the configuration file".to_string(),
                "Run 'sidecar config' to see the effective configuration".to_string(),
            ],
            Self::MissingRequired(key) => vec![
                format!("Set '{key}' in .sidecar/config.toml"),
                "Pass the value on the command line instead".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "port" => vec![
                    "Use a port between 1 and 65535".to_string(),
                    "Use port_strategy = \"probe\" to pick a free port automatically".to_string(),
                ],
                "host" => vec![
                    "Use a loopback address such as 127.0.0.1".to_string(),
                    "Set allow_non_loopback = true only if the control channel is protected"
                        .to_string(),
                ],
                "command" => vec![
                    "Provide the runtime argv, e.g. [\"python\", \"-m\", \"flask\", \"run\"]"
                        .to_string(),
                ],
                _ => vec![
                    "Remove the option to use the default value".to_string(),
                ],
            },
            Self::NotFound { .. } => vec![
                "Create .sidecar/config.toml in your project root".to_string(),
                "Use --config <path> to point at an existing file".to_string(),
            ],
            Self::DiscoveryFailed { .. } => vec![
                "Check read permissions on the current directory and its parents".to_string(),
                "Use --config <path> to specify the configuration file explicitly".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

impl UserFriendlyError for SidecarError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Launch(LaunchError::ProgramNotFound { program, .. }) => {
                format!("Could not find '{program}' to launch the service")
            }
            Self::Launch(err) => format!("Could not launch the service: {err}"),
            Self::PortUnavailable { start, attempts } => {
                format!("No free port found ({attempts} ports tried from {start})")
            }
            Self::AlreadyRunning { state } => format!("The service is already {state}"),
            Self::NotRunning => "The service is not running".to_string(),
            Self::InvalidService { reason } => format!("Invalid service settings: {reason}"),
            Self::NotReady { url, waited_ms } => {
                format!("The service at {url} did not answer within {waited_ms} ms")
            }
            Self::ChildExited { status } => {
                format!("The service exited before it was ready ({status})")
            }
            Self::Io(err) => format!("I/O error: {err}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Launch(_) => Some(
                "The service is started with the configured [service].command and inherits this environment."
                    .to_string(),
            ),
            Self::PortUnavailable { .. } => Some(
                "Ports are probed on the loopback interface before the service is launched."
                    .to_string(),
            ),
            Self::ChildExited { .. } | Self::NotReady { .. } => Some(
                "Readiness is checked against [readiness].path on the service.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Launch(_) => vec![
                "Check that the runtime is installed and on PATH".to_string(),
                "Check [service].command and [service].working_dir".to_string(),
            ],
            Self::PortUnavailable { .. } => vec![
                "Stop other local services using nearby ports".to_string(),
                "Raise [network].probe_attempts or choose another [network].port".to_string(),
            ],
            Self::NotReady { .. } => vec![
                "Raise [readiness].timeout_secs for slow-starting services".to_string(),
                "Run with --verbose to see the service output".to_string(),
            ],
            Self::ChildExited { .. } => vec![
                "Run with --verbose to see the service output".to_string(),
                "Check that [service].entry_point points at the service module".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) | Self::InvalidService { .. } => ErrorCategory::Configuration,
            Self::Launch(_) => ErrorCategory::Launch,
            Self::AlreadyRunning { .. } | Self::NotRunning | Self::ChildExited { .. } => {
                ErrorCategory::Lifecycle
            }
            Self::PortUnavailable { .. } | Self::NotReady { .. } => ErrorCategory::Network,
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl SidecarError {
    /// Error message with context and suggestions, for terminal output.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }

    /// Map to the CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::InvalidService { .. } => ExitCode::CLI_ARGS,
            Self::AlreadyRunning { .. } => ExitCode::ALREADY_RUNNING,
            Self::PortUnavailable { .. } => ExitCode::PORT_UNAVAILABLE,
            Self::NotRunning | Self::NotReady { .. } | Self::ChildExited { .. } => {
                ExitCode::NOT_READY
            }
            Self::Launch(_) => ExitCode::LAUNCH_FAILURE,
            Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}
