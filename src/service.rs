//! Per-launch service parameters and the child's address

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use sidecar_utils::types::RunMode;

use crate::credential::AdminKey;

/// Everything the child is launched with. Built fresh by every `start()`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub entry_point: PathBuf,
    pub port: u16,
    pub run_mode: RunMode,
    pub admin_key: AdminKey,
}

/// Where the running child listens, rendered as `scheme://host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceAddress {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl ServiceAddress {
    #[must_use]
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// Base URL followed by `path` (which starts with `/`).
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{self}{path}")
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_format() {
        let address = ServiceAddress::new("http", "127.0.0.1", 5000);
        assert_eq!(address.to_string(), "http://127.0.0.1:5000");
        assert_eq!(
            address.endpoint("/api/v1/server/shutdown"),
            "http://127.0.0.1:5000/api/v1/server/shutdown"
        );
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let address = ServiceAddress::new("http", "::1", 8080);
        assert_eq!(address.to_string(), "http://[::1]:8080");
        assert_eq!(
            ServiceAddress::new("http", "[::1]", 8080).to_string(),
            "http://[::1]:8080"
        );
    }
}
