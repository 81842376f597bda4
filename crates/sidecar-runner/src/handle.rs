use crate::error::RunnerError;
use crate::platform::Containment;
use crate::ring_buffer::RingBuffer;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long to wait for the OS to reap a child after a forced kill.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Which pipe a chunk of child output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Shared view of the child's merged stdout/stderr.
///
/// Both pipes are drained into the same bounded buffer, in arrival order.
#[derive(Debug, Clone)]
pub struct OutputTail {
    buffer: Arc<Mutex<RingBuffer>>,
}

impl OutputTail {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(RingBuffer::new(capacity))),
        }
    }

    fn append(&self, data: &[u8]) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(data);
    }

    /// Everything currently retained, lossily decoded.
    #[must_use]
    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_string()
    }

    #[must_use]
    pub fn last_lines(&self, count: usize) -> Vec<String> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_lines(count)
    }

    /// Bytes received from the child so far, including discarded ones.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total_bytes_written()
    }
}

/// Continuously read one pipe so the child never blocks on a full buffer.
pub(crate) fn spawn_drain<R>(mut reader: R, stream: Stream, pid: u32, tail: OutputTail) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = vec![0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    tail.append(&chunk[..n]);
                    for line in String::from_utf8_lossy(&chunk[..n]).lines() {
                        debug!(target: "sidecar::child", pid, stream = stream.as_str(), "{line}");
                    }
                }
                Err(e) => {
                    warn!(pid, stream = stream.as_str(), error = %e, "Stopped draining child output");
                    break;
                }
            }
        }
    })
}

// ============================================================================
// ProcessHandle
// ============================================================================

/// Exclusive handle on a launched child process.
///
/// The handle observes real process exit (`wait`), not an unrelated signal.
/// Dropping a handle whose child is still running kills the child's whole
/// containment unit, so every exit path of the owner releases the process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: u32,
    program: String,
    containment: Containment,
    output: OutputTail,
    drains: Vec<JoinHandle<()>>,
    exit_status: Option<ExitStatus>,
}

impl ProcessHandle {
    pub(crate) fn new(
        child: Child,
        pid: u32,
        program: String,
        containment: Containment,
        output: OutputTail,
        drains: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            child,
            pid,
            program,
            containment,
            output,
            drains,
            exit_status: None,
        }
    }

    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn output(&self) -> &OutputTail {
        &self.output
    }

    /// Exit status, if the child has already been reaped.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Non-blocking exit check.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, RunnerError> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                Ok(Some(status))
            }
            Ok(None) => Ok(None),
            Err(source) => Err(RunnerError::StatusFailed {
                pid: self.pid,
                source,
            }),
        }
    }

    /// `true` while the child has not exited. Status errors count as running.
    pub fn is_running(&mut self) -> bool {
        !matches!(self.try_wait(), Ok(Some(_)))
    }

    /// Wait for the child to exit, up to `timeout`.
    ///
    /// Returns `Ok(None)` if the child was still running when the timeout elapsed.
    pub async fn wait_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ExitStatus>, RunnerError> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.exit_status = Some(status);
                Ok(Some(status))
            }
            Ok(Err(source)) => Err(RunnerError::WaitFailed {
                pid: self.pid,
                source,
            }),
            Err(_) => Ok(None),
        }
    }

    /// Forcibly terminate the child and everything in its containment unit,
    /// then reap it.
    pub async fn kill(&mut self) -> Result<ExitStatus, RunnerError> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }

        if let Err(reason) = self.containment.kill() {
            warn!(pid = self.pid, %reason, "Group kill failed, killing the child directly");
            self.child
                .start_kill()
                .map_err(|e| RunnerError::KillFailed {
                    pid: self.pid,
                    reason: format!("{reason}; {e}"),
                })?;
        }

        self.wait_timeout(REAP_TIMEOUT)
            .await?
            .ok_or(RunnerError::ReapTimeout {
                pid: self.pid,
                timeout_ms: REAP_TIMEOUT.as_millis(),
            })
    }

    /// Wait up to `timeout` for the output drains to reach end-of-file.
    ///
    /// Drains still blocked afterwards (a grandchild holding the pipe open)
    /// are aborted.
    pub async fn finish_output(&mut self, timeout: Duration) {
        for mut drain in self.drains.drain(..) {
            if tokio::time::timeout(timeout, &mut drain).await.is_err() {
                drain.abort();
            }
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.exit_status.is_some() || matches!(self.child.try_wait(), Ok(Some(_))) {
            return;
        }

        warn!(
            pid = self.pid,
            program = %self.program,
            "Process handle dropped while the child was running; killing it"
        );
        if self.containment.kill().is_err() {
            let _ = self.child.start_kill();
        }
    }
}
