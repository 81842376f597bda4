use std::net::IpAddr;

use sidecar_utils::error::ConfigError;

use super::Config;

pub const MIN_KEY_LENGTH: usize = 8;
pub const MAX_KEY_LENGTH: usize = 128;
pub const MAX_SHUTDOWN_TIMEOUT_SECS: u64 = 600;
pub const MIN_CAPTURE_BYTES: usize = 1024;

/// Whether `host` names the loopback interface.
#[must_use]
pub fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    let trimmed = host.trim_start_matches('[').trim_end_matches(']');
    trimmed
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.command.is_empty() || self.service.command[0].trim().is_empty() {
            return Err(ConfigError::invalid(
                "command",
                "must name the program to run",
            ));
        }

        if let Some(entry_point) = &self.service.entry_point
            && entry_point.as_os_str().is_empty()
        {
            return Err(ConfigError::invalid("entry_point", "must not be empty"));
        }

        match self.network.scheme.as_str() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::invalid(
                    "scheme",
                    format!("'{other}' is not supported; use http or https"),
                ));
            }
        }

        if self.network.host.trim().is_empty() {
            return Err(ConfigError::invalid("host", "must not be empty"));
        }
        if !self.network.allow_non_loopback && !is_loopback_host(&self.network.host) {
            return Err(ConfigError::invalid(
                "host",
                format!(
                    "'{}' is not a loopback address; the admin key would cross the network",
                    self.network.host
                ),
            ));
        }

        if self.network.port == 0 {
            return Err(ConfigError::invalid("port", "must be between 1 and 65535"));
        }
        if self.network.probe_attempts == 0 {
            return Err(ConfigError::invalid("probe_attempts", "must be at least 1"));
        }

        if !self.shutdown.path.starts_with('/') {
            return Err(ConfigError::invalid("shutdown_path", "must start with '/'"));
        }
        if self.shutdown.timeout_secs == 0 || self.shutdown.timeout_secs > MAX_SHUTDOWN_TIMEOUT_SECS
        {
            return Err(ConfigError::invalid(
                "shutdown_timeout_secs",
                format!("must be between 1 and {MAX_SHUTDOWN_TIMEOUT_SECS} seconds"),
            ));
        }
        if self.shutdown.request_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "request_timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.shutdown.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "connect_timeout_ms",
                "must be greater than 0",
            ));
        }

        let key_length = self.credentials.key_length;
        if !(MIN_KEY_LENGTH..=MAX_KEY_LENGTH).contains(&key_length) {
            return Err(ConfigError::invalid(
                "key_length",
                format!("{key_length} is outside {MIN_KEY_LENGTH}..={MAX_KEY_LENGTH}"),
            ));
        }

        if !self.readiness.path.starts_with('/') {
            return Err(ConfigError::invalid("readiness_path", "must start with '/'"));
        }
        if self.readiness.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "readiness_timeout_secs",
                "must be at least 1 second",
            ));
        }
        if self.readiness.interval_ms == 0 {
            return Err(ConfigError::invalid(
                "readiness_interval_ms",
                "must be greater than 0",
            ));
        }

        if self.output.capture_bytes < MIN_CAPTURE_BYTES {
            return Err(ConfigError::invalid(
                "capture_bytes",
                "must be at least 1024 bytes (1 KiB)",
            ));
        }

        let names = [
            ("env.entry_point", &self.env.entry_point),
            ("env.debug", &self.env.debug),
            ("env.environment", &self.env.environment),
            ("env.port", &self.env.port),
            ("env.admin_key", &self.env.admin_key),
        ];
        for (key, name) in names {
            if name.is_empty() || name.contains('=') || name.contains('\0') {
                return Err(ConfigError::invalid(
                    key,
                    format!("'{name}' is not a valid environment variable name"),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_of(err: ConfigError) -> String {
        match err {
            ConfigError::InvalidValue { key, .. } => key,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_loopback_hosts() {
        assert!(is_loopback_host("127.0.0.1"));
        assert!(is_loopback_host("127.1.2.3"));
        assert!(is_loopback_host("localhost"));
        assert!(is_loopback_host("::1"));
        assert!(is_loopback_host("[::1]"));
        assert!(!is_loopback_host("0.0.0.0"));
        assert!(!is_loopback_host("192.168.1.10"));
        assert!(!is_loopback_host("example.com"));
    }

    #[test]
    fn test_non_loopback_host_needs_opt_in() {
        let mut config = Config::default();
        config.network.host = "10.0.0.5".to_string();
        assert_eq!(key_of(config.validate().unwrap_err()), "host");

        config.network.allow_non_loopback = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let cases: Vec<(&str, Box<dyn Fn(&mut Config)>)> = vec![
            ("port", Box::new(|c| c.network.port = 0)),
            ("key_length", Box::new(|c| c.credentials.key_length = 7)),
            ("key_length", Box::new(|c| c.credentials.key_length = 129)),
            ("shutdown_timeout_secs", Box::new(|c| c.shutdown.timeout_secs = 0)),
            ("shutdown_timeout_secs", Box::new(|c| c.shutdown.timeout_secs = 601)),
            ("request_timeout_ms", Box::new(|c| c.shutdown.request_timeout_ms = 0)),
            ("shutdown_path", Box::new(|c| c.shutdown.path = "api/stop".to_string())),
            ("readiness_path", Box::new(|c| c.readiness.path = "hello".to_string())),
            ("command", Box::new(|c| c.service.command.clear())),
            ("scheme", Box::new(|c| c.network.scheme = "ftp".to_string())),
            ("capture_bytes", Box::new(|c| c.output.capture_bytes = 512)),
            ("env.port", Box::new(|c| c.env.port = "A=B".to_string())),
        ];

        for (expected, mutate) in cases {
            let mut config = Config::default();
            mutate(&mut config);
            assert_eq!(key_of(config.validate().unwrap_err()), expected);
        }
    }
}
