use crate::command_spec::CommandSpec;
use crate::error::LaunchError;
use crate::handle::{OutputTail, ProcessHandle, Stream, spawn_drain};
use crate::platform::{self, Containment};
use std::ffi::OsStr;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tracing::{debug, info};

// ============================================================================
// ProcessLauncher Trait
// ============================================================================

/// Spawns child processes from a [`CommandSpec`].
///
/// Implementations MUST use argv-style APIs only and MUST apply the command's
/// environment as an overlay on the current environment. Launch failures are
/// returned, never retried.
///
/// `launch` is synchronous but must be called from within a Tokio runtime:
/// the returned handle drains the child's output on runtime tasks.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, spec: &CommandSpec) -> Result<ProcessHandle, LaunchError>;
}

/// Launches the command directly on the host.
#[derive(Debug, Clone, Copy)]
pub struct NativeLauncher {
    output_capacity: usize,
}

impl NativeLauncher {
    /// Default size of the retained output tail (64 KiB).
    pub const DEFAULT_OUTPUT_CAPACITY: usize = 64 * 1024;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            output_capacity: Self::DEFAULT_OUTPUT_CAPACITY,
        }
    }

    #[must_use]
    pub const fn with_output_capacity(output_capacity: usize) -> Self {
        Self { output_capacity }
    }

    #[must_use]
    pub const fn output_capacity(&self) -> usize {
        self.output_capacity
    }

    /// Resolve the program against `PATH` (the overlay's, if it sets one)
    /// relative to the command's working directory.
    fn resolve_program(spec: &CommandSpec) -> Result<PathBuf, LaunchError> {
        let search_path = spec
            .env_value("PATH")
            .map(OsStr::to_os_string)
            .or_else(|| std::env::var_os("PATH"));
        let cwd = match &spec.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir().map_err(|source| LaunchError::SpawnFailed {
                program: spec.program_display(),
                source,
            })?,
        };

        which::which_in(&spec.program, search_path, &cwd).map_err(|e| {
            LaunchError::ProgramNotFound {
                program: spec.program_display(),
                reason: e.to_string(),
            }
        })
    }
}

impl Default for NativeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher for NativeLauncher {
    fn launch(&self, spec: &CommandSpec) -> Result<ProcessHandle, LaunchError> {
        let program = spec.program_display();
        let resolved = Self::resolve_program(spec)?;
        debug!(program = %program, resolved = %resolved.display(), "Resolved sidecar program");

        let mut cmd = CommandSpec {
            program: resolved.into_os_string(),
            ..spec.clone()
        }
        .to_tokio_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        platform::prepare(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| LaunchError::SpawnFailed {
            program: program.clone(),
            source,
        })?;

        // The child is killed on drop if any of the steps below fail
        let pid = child.id().ok_or_else(|| LaunchError::SpawnFailed {
            program: program.clone(),
            source: io::Error::other("child exited before its pid could be read"),
        })?;
        let containment = Containment::attach(pid, &program)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LaunchError::OutputUnavailable {
                program: program.clone(),
                stream: Stream::Stdout.as_str(),
            })?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| LaunchError::OutputUnavailable {
                program: program.clone(),
                stream: Stream::Stderr.as_str(),
            })?;

        let output = OutputTail::new(self.output_capacity);
        let drains = vec![
            spawn_drain(stdout, Stream::Stdout, pid, output.clone()),
            spawn_drain(stderr, Stream::Stderr, pid, output.clone()),
        ];

        info!(pid, program = %program, "Launched child process");
        Ok(ProcessHandle::new(
            child,
            pid,
            program,
            containment,
            output,
            drains,
        ))
    }
}
