use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use sidecar_utils::error::ConfigError;
use sidecar_utils::types::{ConfigSource, RunMode};

use super::{Config, EnvNames, PortStrategy};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding the supervisor without config files or
    /// environment variables.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use sidecar_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .entry_point("/srv/app/api")
    ///     .port(5000)
    ///     .shutdown_timeout(Duration::from_secs(10))
    ///     .build()
    ///     .expect("Failed to build config");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent constructor for [`Config`].
///
/// # Source Attribution
///
/// All values set via the builder are attributed to `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    entry_point: Option<PathBuf>,
    command: Option<Vec<String>>,
    working_dir: Option<PathBuf>,
    run_mode: Option<RunMode>,
    host: Option<String>,
    port: Option<u16>,
    port_strategy: Option<PortStrategy>,
    probe_attempts: Option<u32>,
    probe_backoff: Option<Duration>,
    allow_non_loopback: Option<bool>,
    shutdown_path: Option<String>,
    shutdown_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    key_length: Option<usize>,
    readiness_path: Option<String>,
    readiness_timeout: Option<Duration>,
    readiness_interval: Option<Duration>,
    capture_bytes: Option<usize>,
    env_names: Option<EnvNames>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch module of the service.
    #[must_use]
    pub fn entry_point(mut self, path: impl Into<PathBuf>) -> Self {
        self.entry_point = Some(path.into());
        self
    }

    /// Runtime argv (program first). Never run through a shell.
    #[must_use]
    pub fn command<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = Some(argv.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn run_mode(mut self, mode: RunMode) -> Self {
        self.run_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Preferred port; with the probe strategy this is where the search starts.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn port_strategy(mut self, strategy: PortStrategy) -> Self {
        self.port_strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn probe_attempts(mut self, attempts: u32) -> Self {
        self.probe_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn probe_backoff(mut self, backoff: Duration) -> Self {
        self.probe_backoff = Some(backoff);
        self
    }

    #[must_use]
    pub fn allow_non_loopback(mut self, allow: bool) -> Self {
        self.allow_non_loopback = Some(allow);
        self
    }

    #[must_use]
    pub fn shutdown_path(mut self, path: impl Into<String>) -> Self {
        self.shutdown_path = Some(path.into());
        self
    }

    /// How long `stop()` waits for a voluntary exit before force-killing.
    ///
    /// Sub-second precision is truncated to whole seconds.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn key_length(mut self, length: usize) -> Self {
        self.key_length = Some(length);
        self
    }

    #[must_use]
    pub fn readiness_path(mut self, path: impl Into<String>) -> Self {
        self.readiness_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn readiness_interval(mut self, interval: Duration) -> Self {
        self.readiness_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn capture_bytes(mut self, bytes: usize) -> Self {
        self.capture_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn env_names(mut self, names: EnvNames) -> Self {
        self.env_names = Some(names);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        let mut attribution = BTreeMap::new();
        let mut mark = |key: &str| {
            attribution.insert(key.to_string(), ConfigSource::Programmatic);
        };

        if let Some(entry_point) = self.entry_point {
            config.service.entry_point = Some(entry_point);
            mark("entry_point");
        }
        if let Some(command) = self.command {
            config.service.command = command;
            mark("command");
        }
        if let Some(working_dir) = self.working_dir {
            config.service.working_dir = Some(working_dir);
            mark("working_dir");
        }
        if let Some(run_mode) = self.run_mode {
            config.service.run_mode = run_mode;
            mark("run_mode");
        }
        if let Some(host) = self.host {
            config.network.host = host;
            mark("host");
        }
        if let Some(port) = self.port {
            config.network.port = port;
            mark("port");
        }
        if let Some(strategy) = self.port_strategy {
            config.network.port_strategy = strategy;
            mark("port_strategy");
        }
        if let Some(attempts) = self.probe_attempts {
            config.network.probe_attempts = attempts;
            mark("probe_attempts");
        }
        if let Some(backoff) = self.probe_backoff {
            config.network.probe_backoff_ms = millis(backoff);
            mark("probe_backoff_ms");
        }
        if let Some(allow) = self.allow_non_loopback {
            config.network.allow_non_loopback = allow;
            mark("allow_non_loopback");
        }
        if let Some(path) = self.shutdown_path {
            config.shutdown.path = path;
            mark("shutdown_path");
        }
        if let Some(timeout) = self.shutdown_timeout {
            config.shutdown.timeout_secs = timeout.as_secs();
            mark("shutdown_timeout_secs");
        }
        if let Some(timeout) = self.request_timeout {
            config.shutdown.request_timeout_ms = millis(timeout);
            mark("request_timeout_ms");
        }
        if let Some(timeout) = self.connect_timeout {
            config.shutdown.connect_timeout_ms = millis(timeout);
            mark("connect_timeout_ms");
        }
        if let Some(length) = self.key_length {
            config.credentials.key_length = length;
            mark("key_length");
        }
        if let Some(path) = self.readiness_path {
            config.readiness.path = path;
            mark("readiness_path");
        }
        if let Some(timeout) = self.readiness_timeout {
            config.readiness.timeout_secs = timeout.as_secs();
            mark("readiness_timeout_secs");
        }
        if let Some(interval) = self.readiness_interval {
            config.readiness.interval_ms = millis(interval);
            mark("readiness_interval_ms");
        }
        if let Some(bytes) = self.capture_bytes {
            config.output.capture_bytes = bytes;
            mark("capture_bytes");
        }
        if let Some(names) = self.env_names {
            config.env = names;
            mark("env");
        }

        config.source_attribution = attribution;
        config.validate()?;
        Ok(config)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
