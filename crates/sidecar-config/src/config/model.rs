use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use sidecar_utils::types::{ConfigSource, RunMode};

pub const DEFAULT_COMMAND: [&str; 4] = ["python", "-m", "flask", "run"];
pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 20;
pub const DEFAULT_PROBE_BACKOFF_MS: u64 = 50;
pub const DEFAULT_SHUTDOWN_PATH: &str = "/api/v1/server/shutdown";
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_KEY_LENGTH: usize = 10;
pub const DEFAULT_READINESS_PATH: &str = "/api/v1/server/hello/sidecar";
pub const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_READINESS_INTERVAL_MS: u64 = 200;
pub const DEFAULT_CAPTURE_BYTES: usize = 64 * 1024;

/// How the supervisor picks the service port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStrategy {
    /// Probe loopback bindability, walking upward from the configured port
    #[default]
    Probe,
    /// Use the configured port as-is, without a collision check
    Fixed,
}

impl PortStrategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::Fixed => "fixed",
        }
    }
}

/// `[service]`: what to launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSection {
    /// Launch module of the child service; required before `start()`
    pub entry_point: Option<PathBuf>,
    /// Runtime argv, never passed through a shell
    pub command: Vec<String>,
    pub run_mode: RunMode,
    pub working_dir: Option<PathBuf>,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            entry_point: None,
            command: DEFAULT_COMMAND.iter().map(ToString::to_string).collect(),
            run_mode: RunMode::Development,
            working_dir: None,
        }
    }
}

/// `[network]`: where the service listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSection {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub port_strategy: PortStrategy,
    pub probe_attempts: u32,
    pub probe_backoff_ms: u64,
    /// The admin key travels in a query string; only loopback is safe by default
    pub allow_non_loopback: bool,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            port_strategy: PortStrategy::Probe,
            probe_attempts: DEFAULT_PROBE_ATTEMPTS,
            probe_backoff_ms: DEFAULT_PROBE_BACKOFF_MS,
            allow_non_loopback: false,
        }
    }
}

/// `[shutdown]`: the graceful-shutdown protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownSection {
    pub path: String,
    /// Wait for voluntary exit before the forced kill
    pub timeout_secs: u64,
    /// Total budget of the shutdown HTTP request
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self {
            path: DEFAULT_SHUTDOWN_PATH.to_string(),
            timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

/// `[credentials]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialsSection {
    pub key_length: usize,
}

impl Default for CredentialsSection {
    fn default() -> Self {
        Self {
            key_length: DEFAULT_KEY_LENGTH,
        }
    }
}

/// `[readiness]`: how to tell the service is answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessSection {
    pub path: String,
    pub timeout_secs: u64,
    pub interval_ms: u64,
}

impl Default for ReadinessSection {
    fn default() -> Self {
        Self {
            path: DEFAULT_READINESS_PATH.to_string(),
            timeout_secs: DEFAULT_READINESS_TIMEOUT_SECS,
            interval_ms: DEFAULT_READINESS_INTERVAL_MS,
        }
    }
}

/// `[output]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSection {
    pub capture_bytes: usize,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            capture_bytes: DEFAULT_CAPTURE_BYTES,
        }
    }
}

/// `[env]`: variable names the child runtime reads.
///
/// Defaults follow the Flask runtime's conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvNames {
    pub entry_point: String,
    pub debug: String,
    pub environment: String,
    pub port: String,
    pub admin_key: String,
}

impl Default for EnvNames {
    fn default() -> Self {
        Self {
            entry_point: "FLASK_APP".to_string(),
            debug: "FLASK_DEBUG".to_string(),
            environment: "FLASK_ENV".to_string(),
            port: "FLASK_RUN_PORT".to_string(),
            admin_key: "FLASK_SERVER_ADMIN_KEY".to_string(),
        }
    }
}

/// Effective supervisor configuration.
///
/// Built from CLI arguments > config file > built-in defaults (see
/// [`Config::discover`]) or programmatically with [`Config::builder`].
/// Each value's origin is kept in `source_attribution`.
///
/// # Configuration File Format
///
/// ```toml
/// [service]
/// entry_point = "api"
/// command = ["python", "-m", "flask", "run"]
/// run_mode = "development"
///
/// [network]
/// port = 5000
/// port_strategy = "probe"
///
/// [shutdown]
/// timeout_secs = 10
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub service: ServiceSection,
    pub network: NetworkSection,
    pub shutdown: ShutdownSection,
    pub credentials: CredentialsSection,
    pub readiness: ReadinessSection,
    pub output: OutputSection,
    pub env: EnvNames,
    /// File the configuration was loaded from, if any
    pub config_path: Option<PathBuf>,
    #[serde(skip)]
    pub source_attribution: BTreeMap<String, ConfigSource>,
}

impl Config {
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown.timeout_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown.request_timeout_ms)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown.connect_timeout_ms)
    }

    #[must_use]
    pub fn probe_backoff(&self) -> Duration {
        Duration::from_millis(self.network.probe_backoff_ms)
    }

    #[must_use]
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness.timeout_secs)
    }

    #[must_use]
    pub fn readiness_interval(&self) -> Duration {
        Duration::from_millis(self.readiness.interval_ms)
    }

    /// Where a setting came from; unknown keys report `Default`.
    #[must_use]
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.source_attribution
            .get(key)
            .copied()
            .unwrap_or(ConfigSource::Default)
    }
}

// ============================================================================
// File model: every field optional, merged over the defaults
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlConfig {
    pub service: Option<TomlService>,
    pub network: Option<TomlNetwork>,
    pub shutdown: Option<TomlShutdown>,
    pub credentials: Option<TomlCredentials>,
    pub readiness: Option<TomlReadiness>,
    pub output: Option<TomlOutput>,
    pub env: Option<EnvNames>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlService {
    pub entry_point: Option<PathBuf>,
    pub command: Option<Vec<String>>,
    pub run_mode: Option<RunMode>,
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlNetwork {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub port_strategy: Option<PortStrategy>,
    pub probe_attempts: Option<u32>,
    pub probe_backoff_ms: Option<u64>,
    pub allow_non_loopback: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlShutdown {
    pub path: Option<String>,
    pub timeout_secs: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlCredentials {
    pub key_length: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlReadiness {
    pub path: Option<String>,
    pub timeout_secs: Option<u64>,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TomlOutput {
    pub capture_bytes: Option<usize>,
}
