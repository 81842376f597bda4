//! Error types for the runner crate

use std::io;
use thiserror::Error;

/// The child process could not be created.
///
/// Launch failures are reported to the caller as-is and never retried here;
/// the embedding component decides whether to surface them.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Program '{program}' not found: {reason}")]
    ProgramNotFound { program: String, reason: String },

    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to capture {stream} of '{program}'")]
    OutputUnavailable {
        program: String,
        stream: &'static str,
    },

    #[error("Failed to set up process containment for '{program}': {reason}")]
    Containment { program: String, reason: String },
}

/// Failures while observing or terminating a running child.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to query status of process {pid}: {source}")]
    StatusFailed {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for process {pid}: {source}")]
    WaitFailed {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("Failed to kill process {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },

    #[error("Process {pid} was still running {timeout_ms} ms after being killed")]
    ReapTimeout { pid: u32, timeout_ms: u128 },
}
