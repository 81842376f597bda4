//! Configuration discovery through the process environment and working directory
//!
//! These tests mutate `SIDECAR_HOME` and the current directory, so they run
//! serially.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use sidecar::{CliArgs, Config, ConfigError, ConfigSource, PortStrategy, RunMode};
use tempfile::TempDir;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Restores the working directory and `SIDECAR_HOME` when dropped.
struct EnvGuard {
    cwd: PathBuf,
    home: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn enter(dir: &Path, home: Option<&Path>) -> Self {
        let guard = Self {
            cwd: env::current_dir().unwrap(),
            home: env::var_os("SIDECAR_HOME"),
        };
        env::set_current_dir(dir).unwrap();
        unsafe {
            match home {
                Some(home) => env::set_var("SIDECAR_HOME", home),
                None => env::remove_var("SIDECAR_HOME"),
            }
        }
        guard
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.cwd);
        unsafe {
            match &self.home {
                Some(home) => env::set_var("SIDECAR_HOME", home),
                None => env::remove_var("SIDECAR_HOME"),
            }
        }
    }
}

fn project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    fs::create_dir(dir.path().join(".sidecar")).unwrap();
    fs::write(dir.path().join(".sidecar").join("config.toml"), config).unwrap();
    dir
}

#[test]
#[serial]
fn test_discover_from_nested_working_directory() -> Result<()> {
    let root = project(
        r#"
[service]
entry_point = "api"
run_mode = "production"

[network]
port = 6100
port_strategy = "fixed"
"#,
    );
    let nested = root.path().join("src").join("deep");
    fs::create_dir_all(&nested)?;
    let _guard = EnvGuard::enter(&nested, None);

    let config = Config::discover(&CliArgs::default())?;

    assert_eq!(
        config.service.entry_point,
        Some(root.path().join("api"))
    );
    assert_eq!(config.service.run_mode, RunMode::Production);
    assert_eq!(config.network.port, 6100);
    assert_eq!(config.network.port_strategy, PortStrategy::Fixed);
    assert_eq!(config.source_of("port"), ConfigSource::Config);
    assert_eq!(config.source_of("shutdown_timeout_secs"), ConfigSource::Default);
    Ok(())
}

#[test]
#[serial]
fn test_sidecar_home_wins_over_working_directory() -> Result<()> {
    let root = project("[network]\nport = 6100\n");
    let home = TempDir::new()?;
    fs::write(home.path().join("config.toml"), "[network]\nport = 6200\n")?;
    let _guard = EnvGuard::enter(root.path(), Some(home.path()));

    let config = Config::discover(&CliArgs::default())?;

    assert_eq!(config.network.port, 6200);
    assert_eq!(config.config_path, Some(home.path().join("config.toml")));
    Ok(())
}

#[test]
#[serial]
fn test_cli_flags_override_discovered_file() -> Result<()> {
    let root = project(
        r#"
[network]
port = 6100

[shutdown]
timeout_secs = 30
"#,
    );
    let _guard = EnvGuard::enter(root.path(), None);

    let config = Config::discover(&CliArgs {
        port: Some(7100),
        fixed_port: true,
        shutdown_timeout_secs: Some(2),
        ..CliArgs::default()
    })?;

    assert_eq!(config.network.port, 7100);
    assert_eq!(config.network.port_strategy, PortStrategy::Fixed);
    assert_eq!(config.shutdown.timeout_secs, 2);
    assert_eq!(config.source_of("port"), ConfigSource::Cli);
    assert_eq!(config.source_of("shutdown_timeout_secs"), ConfigSource::Cli);
    Ok(())
}

#[test]
#[serial]
fn test_invalid_file_value_is_reported() {
    let root = project("[network]\nhost = \"0.0.0.0\"\n");
    let _guard = EnvGuard::enter(root.path(), None);

    let err = Config::discover(&CliArgs::default()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "host"));
}

#[test]
#[serial]
fn test_no_config_anywhere_yields_defaults() -> Result<()> {
    let root = TempDir::new()?;
    fs::create_dir(root.path().join(".git"))?;
    let _guard = EnvGuard::enter(root.path(), None);

    let config = Config::discover(&CliArgs::default())?;

    assert!(config.config_path.is_none());
    assert_eq!(config.service.entry_point, None);
    assert_eq!(config.network.port, 5000);
    assert_eq!(config.credentials.key_length, 10);
    assert!(config.source_attribution.is_empty());
    Ok(())
}
