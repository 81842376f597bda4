use std::path::PathBuf;

use sidecar_utils::types::RunMode;

/// Command-line overrides, highest precedence during discovery.
///
/// `None` / `false` means "not given on the command line".
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit configuration file (skips `SIDECAR_HOME` and upward search)
    pub config_path: Option<PathBuf>,
    pub entry_point: Option<PathBuf>,
    pub port: Option<u16>,
    /// Force the fixed port strategy
    pub fixed_port: bool,
    pub run_mode: Option<RunMode>,
    pub shutdown_timeout_secs: Option<u64>,
    pub key_length: Option<usize>,
}
