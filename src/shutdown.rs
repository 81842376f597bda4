//! Graceful shutdown protocol
//!
//! 1. Nothing to do if there is no handle or the child already exited.
//! 2. One keyed `GET {base_url}{path}?key={admin_key}`.
//! 3. Wait for the child to actually exit, up to the exit timeout.
//! 4. Force-kill the child's process group if it is still running.
//! 5. Release the handle.
//!
//! No step can abort the sequence; failures are logged and recorded in the
//! [`ShutdownReport`].

use reqwest::Client;
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, warn};

use sidecar_config::Config;
use sidecar_runner::ProcessHandle;
use sidecar_utils::logging::shutdown_span;

use crate::credential::AdminKey;
use crate::service::ServiceAddress;

/// Upper bound on collecting the last child output after exit.
const OUTPUT_FLUSH_TIMEOUT: Duration = Duration::from_millis(250);

/// Timing and routing of the shutdown protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownSettings {
    pub path: String,
    /// Wait for voluntary exit before the forced kill
    pub exit_timeout: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ShutdownSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            path: config.shutdown.path.clone(),
            exit_timeout: config.shutdown_timeout(),
            request_timeout: config.request_timeout(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened to the shutdown request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The child answered with a non-error status
    Accepted { status: u16, body: String },
    /// The child answered with an error status (403 for a wrong key)
    Rejected { status: u16, body: String },
    /// No HTTP response: refused, timed out, or the client could not be built
    Unreachable(String),
    /// No request was needed
    Skipped,
}

/// How the child ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// There was no process to stop
    NotRunning,
    /// Exited before the protocol started
    AlreadyExited(ExitStatus),
    /// Exited on its own within the exit timeout
    Voluntary(ExitStatus),
    /// Killed after the exit timeout elapsed
    ForceKilled(ExitStatus),
    /// The kill itself failed; the handle was released anyway
    KillFailed(String),
}

/// Result of one protocol run.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub pid: Option<u32>,
    pub request: RequestOutcome,
    pub exit: ExitOutcome,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Report for a shutdown with no process behind it.
    #[must_use]
    pub fn not_running() -> Self {
        Self {
            pid: None,
            request: RequestOutcome::Skipped,
            exit: ExitOutcome::NotRunning,
            elapsed: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn was_forced(&self) -> bool {
        matches!(
            self.exit,
            ExitOutcome::ForceKilled(_) | ExitOutcome::KillFailed(_)
        )
    }
}

/// Runs the shutdown protocol against a child process.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    settings: ShutdownSettings,
}

impl ShutdownCoordinator {
    #[must_use]
    pub fn new(settings: ShutdownSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &ShutdownSettings {
        &self.settings
    }

    /// Stop the child behind `handle`, consuming the handle.
    ///
    /// Never fails. Returns within roughly `exit_timeout` plus the kill/reap
    /// time, because the request budget is capped at the exit timeout and
    /// runs concurrently with the exit wait.
    pub async fn shutdown(
        &self,
        handle: Option<ProcessHandle>,
        address: &ServiceAddress,
        admin_key: &AdminKey,
    ) -> ShutdownReport {
        let started = Instant::now();

        let Some(mut handle) = handle else {
            debug!("No process handle; nothing to shut down");
            return ShutdownReport::not_running();
        };

        let pid = handle.pid();
        let span = shutdown_span(pid);

        async move {
            let (request, exit) = match handle.try_wait() {
                Ok(Some(status)) => {
                    info!(%status, "Child already exited; skipping shutdown request");
                    (RequestOutcome::Skipped, ExitOutcome::AlreadyExited(status))
                }
                other => {
                    if let Err(err) = other {
                        warn!(error = %err, "Could not query child status; proceeding");
                    }
                    self.request_and_wait(&mut handle, address, admin_key).await
                }
            };

            handle.finish_output(OUTPUT_FLUSH_TIMEOUT).await;
            drop(handle);

            let elapsed = started.elapsed();
            let report = ShutdownReport {
                pid: Some(pid),
                request,
                exit,
                elapsed,
            };
            info!(
                elapsed_ms = elapsed.as_millis() as u64,
                forced = report.was_forced(),
                "Shutdown complete"
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn request_and_wait(
        &self,
        handle: &mut ProcessHandle,
        address: &ServiceAddress,
        admin_key: &AdminKey,
    ) -> (RequestOutcome, ExitOutcome) {
        let endpoint = address.endpoint(&self.settings.path);
        let exit_timeout = self.settings.exit_timeout;

        let (request, waited) = tokio::join!(
            self.send_request(&endpoint, admin_key),
            handle.wait_timeout(exit_timeout)
        );

        let exit = match waited {
            Ok(Some(status)) => {
                info!(%status, "Child exited voluntarily");
                ExitOutcome::Voluntary(status)
            }
            Ok(None) => {
                warn!(
                    timeout_ms = exit_timeout.as_millis() as u64,
                    "Child did not exit in time; force-killing"
                );
                force_kill(handle).await
            }
            Err(err) => {
                warn!(error = %err, "Waiting for exit failed; force-killing");
                force_kill(handle).await
            }
        };

        (request, exit)
    }

    async fn send_request(&self, endpoint: &str, admin_key: &AdminKey) -> RequestOutcome {
        let client = match Client::builder()
            .no_proxy()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout.min(self.settings.exit_timeout))
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, "Failed to build HTTP client for shutdown request");
                return RequestOutcome::Unreachable(format!("client unavailable: {err}"));
            }
        };

        debug!(%endpoint, "Sending shutdown request");
        let url = format!("{endpoint}?key={}", admin_key.expose());

        match client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(err) => {
                        debug!(error = %err, "Shutdown response body unreadable");
                        String::new()
                    }
                };

                if status.is_client_error() || status.is_server_error() {
                    warn!(status = status.as_u16(), %body, "Shutdown request rejected");
                    RequestOutcome::Rejected {
                        status: status.as_u16(),
                        body,
                    }
                } else {
                    info!(status = status.as_u16(), %body, "Shutdown request accepted");
                    RequestOutcome::Accepted {
                        status: status.as_u16(),
                        body,
                    }
                }
            }
            Err(err) => {
                // reqwest errors carry the URL, which includes the key
                let reason = err.without_url().to_string();
                warn!(%endpoint, error = %reason, "Shutdown request failed");
                RequestOutcome::Unreachable(reason)
            }
        }
    }
}

async fn force_kill(handle: &mut ProcessHandle) -> ExitOutcome {
    match handle.kill().await {
        Ok(status) => {
            info!(%status, "Child force-killed");
            ExitOutcome::ForceKilled(status)
        }
        Err(err) => {
            tracing::error!(error = %err, "Force kill failed; releasing handle anyway");
            ExitOutcome::KillFailed(err.to_string())
        }
    }
}
