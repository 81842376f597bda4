use std::collections::BTreeMap;

use super::Config;

impl Config {
    /// Effective configuration as `key -> (value, source)`, for `sidecar config`.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut out = BTreeMap::new();
        let mut add = |key: &str, value: String| {
            out.insert(key.to_string(), (value, self.source_of(key).to_string()));
        };

        add(
            "entry_point",
            self.service
                .entry_point
                .as_ref()
                .map_or_else(|| "(unset)".to_string(), |p| p.display().to_string()),
        );
        add("command", self.service.command.join(" "));
        add("run_mode", self.service.run_mode.to_string());
        if let Some(dir) = &self.service.working_dir {
            add("working_dir", dir.display().to_string());
        }

        add("scheme", self.network.scheme.clone());
        add("host", self.network.host.clone());
        add("port", self.network.port.to_string());
        add("port_strategy", self.network.port_strategy.as_str().to_string());
        add("probe_attempts", self.network.probe_attempts.to_string());
        add("probe_backoff_ms", self.network.probe_backoff_ms.to_string());
        add(
            "allow_non_loopback",
            self.network.allow_non_loopback.to_string(),
        );

        add("shutdown_path", self.shutdown.path.clone());
        add("shutdown_timeout_secs", self.shutdown.timeout_secs.to_string());
        add("request_timeout_ms", self.shutdown.request_timeout_ms.to_string());
        add("connect_timeout_ms", self.shutdown.connect_timeout_ms.to_string());

        add("key_length", self.credentials.key_length.to_string());

        add("readiness_path", self.readiness.path.clone());
        add(
            "readiness_timeout_secs",
            self.readiness.timeout_secs.to_string(),
        );
        add("readiness_interval_ms", self.readiness.interval_ms.to_string());

        add("capture_bytes", self.output.capture_bytes.to_string());

        add(
            "env",
            format!(
                "{},{},{},{},{}",
                self.env.entry_point,
                self.env.debug,
                self.env.environment,
                self.env.port,
                self.env.admin_key
            ),
        );

        out
    }
}
