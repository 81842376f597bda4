use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sidecar_utils::error::ConfigError;
use sidecar_utils::types::ConfigSource;

use super::model::TomlConfig;
use super::{CliArgs, Config, PortStrategy};

/// Environment variable naming a directory that holds `config.toml`.
pub const HOME_ENV: &str = "SIDECAR_HOME";

/// Directory searched for upward from the working directory.
pub const CONFIG_DIR: &str = ".sidecar";

pub const CONFIG_FILE: &str = "config.toml";

/// Overwrite `target` when `value` is present and record where it came from.
fn apply<T>(
    target: &mut T,
    value: Option<T>,
    key: &str,
    source: ConfigSource,
    attribution: &mut BTreeMap<String, ConfigSource>,
) {
    if let Some(value) = value {
        *target = value;
        attribution.insert(key.to_string(), source);
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// The file is taken from `--config`, else `$SIDECAR_HOME/config.toml`,
    /// else the nearest `.sidecar/config.toml` above the current directory.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("cannot determine current directory: {e}"),
        })?;
        let home = std::env::var_os(HOME_ENV).map(PathBuf::from);
        Self::discover_from(&start_dir, home.as_deref(), cli_args)
    }

    /// Path-driven variant of [`Config::discover`] that reads no process-global state.
    pub fn discover_from(
        start_dir: &Path,
        home: Option<&Path>,
        cli_args: &CliArgs,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        let mut attribution = BTreeMap::new();

        let config_path = match (&cli_args.config_path, home) {
            (Some(explicit), _) => {
                if !explicit.is_file() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            (None, Some(home)) => {
                let candidate = home.join(CONFIG_FILE);
                candidate.is_file().then_some(candidate)
            }
            (None, None) => Self::discover_config_file_from(start_dir)?,
        };

        if let Some(path) = &config_path {
            let file = Self::load_config_file(path)?;
            let base = project_root_of(path);
            config.merge_file(file, &base, &mut attribution);
            config.config_path = Some(path.clone());
        }

        config.merge_cli(cli_args, &mut attribution);
        config.source_attribution = attribution;
        config.validate()?;

        tracing::debug!(
            config_path = ?config.config_path,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Walk up from `start_dir` looking for `.sidecar/config.toml`, stopping at
    /// a repository root (`.git`, `.hg`, `.svn`) or the filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
        let mut current_dir = start_dir.to_path_buf();

        loop {
            let config_path = current_dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.is_file() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound {
                path: path.display().to_string(),
            },
            _ => ConfigError::DiscoveryFailed {
                reason: format!("cannot read {}: {e}", path.display()),
            },
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())))
    }

    fn merge_file(
        &mut self,
        file: TomlConfig,
        base: &Path,
        attribution: &mut BTreeMap<String, ConfigSource>,
    ) {
        let src = ConfigSource::Config;

        if let Some(service) = file.service {
            apply(
                &mut self.service.entry_point,
                service.entry_point.map(|p| Some(resolve(base, p))),
                "entry_point",
                src,
                attribution,
            );
            apply(&mut self.service.command, service.command, "command", src, attribution);
            apply(&mut self.service.run_mode, service.run_mode, "run_mode", src, attribution);
            apply(
                &mut self.service.working_dir,
                service.working_dir.map(|p| Some(resolve(base, p))),
                "working_dir",
                src,
                attribution,
            );
        }

        if let Some(network) = file.network {
            let net = &mut self.network;
            apply(&mut net.scheme, network.scheme, "scheme", src, attribution);
            apply(&mut net.host, network.host, "host", src, attribution);
            apply(&mut net.port, network.port, "port", src, attribution);
            apply(
                &mut net.port_strategy,
                network.port_strategy,
                "port_strategy",
                src,
                attribution,
            );
            apply(
                &mut net.probe_attempts,
                network.probe_attempts,
                "probe_attempts",
                src,
                attribution,
            );
            apply(
                &mut net.probe_backoff_ms,
                network.probe_backoff_ms,
                "probe_backoff_ms",
                src,
                attribution,
            );
            apply(
                &mut net.allow_non_loopback,
                network.allow_non_loopback,
                "allow_non_loopback",
                src,
                attribution,
            );
        }

        if let Some(shutdown) = file.shutdown {
            let sd = &mut self.shutdown;
            apply(&mut sd.path, shutdown.path, "shutdown_path", src, attribution);
            apply(
                &mut sd.timeout_secs,
                shutdown.timeout_secs,
                "shutdown_timeout_secs",
                src,
                attribution,
            );
            apply(
                &mut sd.request_timeout_ms,
                shutdown.request_timeout_ms,
                "request_timeout_ms",
                src,
                attribution,
            );
            apply(
                &mut sd.connect_timeout_ms,
                shutdown.connect_timeout_ms,
                "connect_timeout_ms",
                src,
                attribution,
            );
        }

        if let Some(credentials) = file.credentials {
            apply(
                &mut self.credentials.key_length,
                credentials.key_length,
                "key_length",
                src,
                attribution,
            );
        }

        if let Some(readiness) = file.readiness {
            let rd = &mut self.readiness;
            apply(&mut rd.path, readiness.path, "readiness_path", src, attribution);
            apply(
                &mut rd.timeout_secs,
                readiness.timeout_secs,
                "readiness_timeout_secs",
                src,
                attribution,
            );
            apply(
                &mut rd.interval_ms,
                readiness.interval_ms,
                "readiness_interval_ms",
                src,
                attribution,
            );
        }

        if let Some(output) = file.output {
            apply(
                &mut self.output.capture_bytes,
                output.capture_bytes,
                "capture_bytes",
                src,
                attribution,
            );
        }

        apply(&mut self.env, file.env, "env", src, attribution);
    }

    fn merge_cli(&mut self, cli: &CliArgs, attribution: &mut BTreeMap<String, ConfigSource>) {
        let src = ConfigSource::Cli;

        apply(
            &mut self.service.entry_point,
            cli.entry_point.clone().map(Some),
            "entry_point",
            src,
            attribution,
        );
        apply(&mut self.network.port, cli.port, "port", src, attribution);
        apply(
            &mut self.network.port_strategy,
            cli.fixed_port.then_some(PortStrategy::Fixed),
            "port_strategy",
            src,
            attribution,
        );
        apply(&mut self.service.run_mode, cli.run_mode, "run_mode", src, attribution);
        apply(
            &mut self.shutdown.timeout_secs,
            cli.shutdown_timeout_secs,
            "shutdown_timeout_secs",
            src,
            attribution,
        );
        apply(
            &mut self.credentials.key_length,
            cli.key_length,
            "key_length",
            src,
            attribution,
        );
    }
}

/// Directory relative file paths resolve against: the project root for
/// `<root>/.sidecar/config.toml`, otherwise the file's own directory.
fn project_root_of(config_path: &Path) -> PathBuf {
    let dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    match (dir.file_name(), dir.parent()) {
        (Some(name), Some(root)) if name == CONFIG_DIR => root.to_path_buf(),
        _ => dir.to_path_buf(),
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
