//! Shared value types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the child service should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Development environment with the debugger off
    #[default]
    Development,
    /// Debugger and auto-reload enabled; development environment
    Debug,
    Production,
}

impl RunMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Debug => "debug",
            Self::Production => "production",
        }
    }

    /// Value of the debug flag variable (`1`/`0`).
    #[must_use]
    pub const fn debug_flag(&self) -> &'static str {
        match self {
            Self::Debug => "1",
            Self::Development | Self::Production => "0",
        }
    }

    /// Value of the environment-name variable.
    #[must_use]
    pub const fn environment_name(&self) -> &'static str {
        match self {
            Self::Development | Self::Debug => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Self::Development),
            "debug" => Ok(Self::Debug),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "'{other}' is not valid. Must be 'development', 'debug' or 'production'"
            )),
        }
    }
}

/// Source of a configuration value.
///
/// Precedence: CLI arguments > config file > programmatic > built-in defaults.
/// Serializes to `"cli"`, `"config"`, `"programmatic"`, `"default"`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Cli,
    Config,
    Programmatic,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cli => "cli",
            Self::Config => "config",
            Self::Programmatic => "programmatic",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_flags() {
        assert_eq!(RunMode::Development.debug_flag(), "0");
        assert_eq!(RunMode::Development.environment_name(), "development");
        assert_eq!(RunMode::Debug.debug_flag(), "1");
        assert_eq!(RunMode::Debug.environment_name(), "development");
        assert_eq!(RunMode::Production.debug_flag(), "0");
        assert_eq!(RunMode::Production.environment_name(), "production");
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("debug".parse::<RunMode>(), Ok(RunMode::Debug));
        assert_eq!("development".parse::<RunMode>(), Ok(RunMode::Development));
        assert_eq!("production".parse::<RunMode>(), Ok(RunMode::Production));
        assert!("staging".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_default_run_mode_keeps_debugger_off() {
        assert_eq!(RunMode::default(), RunMode::Development);
        assert_eq!(RunMode::default().debug_flag(), "0");
    }

    #[test]
    fn test_config_source_serialization() {
        assert_eq!(serde_json::to_string(&ConfigSource::Cli).unwrap(), r#""cli""#);
        assert_eq!(
            serde_json::to_string(&ConfigSource::Default).unwrap(),
            r#""default""#
        );
        assert_eq!(ConfigSource::Config.to_string(), "config");
    }
}
