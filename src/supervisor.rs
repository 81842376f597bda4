//! The supervisor: owns at most one child service at a time.
//!
//! ```text
//! Idle --start()--> Running --stop()--> ShuttingDown --> Idle
//! ```
//!
//! `start()` and `stop()` are serialized by an async mutex. The shutdown
//! protocol runs on a detached task, so dropping a `stop()` future does not
//! abandon a half-stopped child. Embedders observe transitions through
//! [`Supervisor::subscribe`].

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{Instrument, debug, error, info};

use sidecar_config::Config;
use sidecar_runner::{CommandSpec, NativeLauncher, OutputTail, ProcessHandle, ProcessLauncher};
use sidecar_utils::error::SidecarError;
use sidecar_utils::logging::service_span;
use sidecar_utils::types::RunMode;

use crate::credential::AdminKey;
use crate::environment;
use crate::port::{PortAllocator, allocator_for};
use crate::readiness::ReadinessProbe;
use crate::service::{ServiceAddress, ServiceConfig};
use crate::shutdown::{ShutdownCoordinator, ShutdownReport, ShutdownSettings};

/// Lifecycle state. `Idle` is both initial and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Idle,
    Running,
    ShuttingDown,
}

impl SupervisorState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::ShuttingDown => "shutting down",
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot published on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    /// Present while Running or ShuttingDown
    pub address: Option<ServiceAddress>,
    pub pid: Option<u32>,
}

impl SupervisorStatus {
    const IDLE: Self = Self {
        state: SupervisorState::Idle,
        address: None,
        pid: None,
    };
}

/// Per-call overrides for [`Supervisor::start_with`]; unset fields fall back
/// to the supervisor's [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub entry_point: Option<PathBuf>,
    pub run_mode: Option<RunMode>,
    pub preferred_port: Option<u16>,
}

#[derive(Debug)]
struct RunningService {
    handle: ProcessHandle,
    address: ServiceAddress,
    admin_key: AdminKey,
    output: OutputTail,
    span: tracing::Span,
}

pub struct Supervisor {
    config: Config,
    launcher: Arc<dyn ProcessLauncher>,
    allocator: Arc<dyn PortAllocator>,
    coordinator: ShutdownCoordinator,
    readiness: ReadinessProbe,
    running: Arc<Mutex<Option<RunningService>>>,
    status: Arc<watch::Sender<SupervisorStatus>>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Supervisor launching real processes with the configured port strategy.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let launcher = Arc::new(NativeLauncher::with_output_capacity(
            config.output.capture_bytes,
        ));
        let allocator: Arc<dyn PortAllocator> = Arc::from(allocator_for(&config));
        let (status, _) = watch::channel(SupervisorStatus::IDLE);

        Self {
            coordinator: ShutdownCoordinator::new(ShutdownSettings::from_config(&config)),
            readiness: ReadinessProbe::from_config(&config),
            launcher,
            allocator,
            running: Arc::new(Mutex::new(None)),
            status: Arc::new(status),
            config,
        }
    }

    /// Replace the process launcher.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Replace the port allocator.
    #[must_use]
    pub fn with_port_allocator(mut self, allocator: Arc<dyn PortAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.status.borrow().state
    }

    #[must_use]
    pub fn status(&self) -> SupervisorStatus {
        self.status.borrow().clone()
    }

    /// Receiver that sees every state transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.subscribe()
    }

    /// Base URL of the running child, `scheme://host:port`.
    pub fn base_url(&self) -> Result<String, SidecarError> {
        self.status
            .borrow()
            .address
            .as_ref()
            .map(ToString::to_string)
            .ok_or(SidecarError::NotRunning)
    }

    /// Start the service with the configured settings.
    pub async fn start(&self) -> Result<ServiceAddress, SidecarError> {
        self.start_with(ServiceOptions::default()).await
    }

    /// Start the service. Only valid from `Idle`.
    ///
    /// Allocates a port, generates a fresh admin key, builds the child
    /// environment and launches the configured command. A failed start leaves
    /// the supervisor `Idle`.
    pub async fn start_with(&self, options: ServiceOptions) -> Result<ServiceAddress, SidecarError> {
        self.ensure_idle()?;
        let mut running = self.running.lock().await;
        self.ensure_idle()?;
        if running.is_some() {
            return Err(SidecarError::AlreadyRunning {
                state: SupervisorState::Running.to_string(),
            });
        }

        let service = self.service_config(options).await?;

        let mut spec = CommandSpec::from_argv(self.config.service.command.as_slice())
            .ok_or_else(|| SidecarError::InvalidService {
                reason: "command is empty".to_string(),
            })?;
        spec = spec.envs(environment::build(&service, &self.config.env));
        if let Some(dir) = &self.config.service.working_dir {
            spec = spec.cwd(dir);
        }

        let span = service_span(&spec.program_display(), service.port);
        let handle = span.in_scope(|| self.launcher.launch(&spec))?;

        let address = ServiceAddress::new(
            self.config.network.scheme.clone(),
            self.config.network.host.clone(),
            service.port,
        );
        let pid = handle.pid();
        span.in_scope(|| {
            info!(
                pid,
                base_url = %address,
                run_mode = %service.run_mode,
                entry_point = %service.entry_point.display(),
                "Service started"
            );
        });

        *running = Some(RunningService {
            output: handle.output().clone(),
            handle,
            address: address.clone(),
            admin_key: service.admin_key,
            span,
        });
        self.status.send_replace(SupervisorStatus {
            state: SupervisorState::Running,
            address: Some(address.clone()),
            pid: Some(pid),
        });

        Ok(address)
    }

    fn ensure_idle(&self) -> Result<(), SidecarError> {
        match self.state() {
            SupervisorState::Idle => Ok(()),
            state => Err(SidecarError::AlreadyRunning {
                state: state.to_string(),
            }),
        }
    }

    async fn service_config(&self, options: ServiceOptions) -> Result<ServiceConfig, SidecarError> {
        let entry_point = options
            .entry_point
            .or_else(|| self.config.service.entry_point.clone())
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| SidecarError::InvalidService {
                reason: "entry point is not set".to_string(),
            })?;

        let preferred = options.preferred_port.unwrap_or(self.config.network.port);
        if preferred == 0 {
            return Err(SidecarError::InvalidService {
                reason: "port must be between 1 and 65535".to_string(),
            });
        }
        let port = self.allocator.allocate(preferred).await?;

        Ok(ServiceConfig {
            entry_point,
            port,
            run_mode: options.run_mode.unwrap_or(self.config.service.run_mode),
            admin_key: AdminKey::generate(self.config.credentials.key_length),
        })
    }

    /// Stop the service. Valid from any state and never fails.
    ///
    /// A no-op when `Idle`. Otherwise runs the shutdown protocol and returns
    /// to `Idle` whatever its outcome.
    pub async fn stop(&self) -> ShutdownReport {
        let running = Arc::clone(&self.running);
        let status = Arc::clone(&self.status);
        let coordinator = self.coordinator.clone();

        let task = tokio::spawn(async move {
            let mut guard = running.lock().await;
            let Some(service) = guard.take() else {
                debug!("stop() while idle; nothing to do");
                return ShutdownReport::not_running();
            };

            status.send_modify(|s| s.state = SupervisorState::ShuttingDown);
            let span = service.span.clone();
            let report = coordinator
                .shutdown(Some(service.handle), &service.address, &service.admin_key)
                .instrument(span)
                .await;
            status.send_replace(SupervisorStatus::IDLE);
            report
        });

        match task.await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "Shutdown task failed");
                self.status.send_replace(SupervisorStatus::IDLE);
                ShutdownReport::not_running()
            }
        }
    }

    /// Wait until the service answers on the readiness path.
    ///
    /// Fails with `ChildExited` when the child dies first and `NotReady` when
    /// the readiness timeout elapses. The supervisor stays `Running` either
    /// way; call [`Supervisor::stop`] to clean up.
    pub async fn wait_ready(&self) -> Result<Duration, SidecarError> {
        let address = self.status().address.ok_or(SidecarError::NotRunning)?;
        self.readiness
            .wait(&address, || self.child_exit())
            .await
    }

    /// Exit description once the child has exited on its own, or when no
    /// child is held. `None` while it runs.
    pub async fn child_exit(&self) -> Option<String> {
        let mut running = self.running.lock().await;
        match running.as_mut() {
            None => Some("service was stopped".to_string()),
            Some(service) => match service.handle.try_wait() {
                Ok(Some(status)) => Some(status.to_string()),
                _ => None,
            },
        }
    }

    /// Bounded merged stdout/stderr of the running child.
    pub async fn output_tail(&self) -> Option<OutputTail> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|service| service.output.clone())
    }
}
