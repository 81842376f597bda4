//! sidecar - local service supervisor
//!
//! Launches a local HTTP service as a child process, hands it a per-launch
//! admin key through its environment, and stops it with an authenticated
//! HTTP shutdown request followed by a bounded wait and a forced kill.
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use sidecar::{Config, Supervisor};
//!
//! # async fn demo() -> Result<(), sidecar::SidecarError> {
//! let config = Config::builder().entry_point("/srv/app/api").build()?;
//! let supervisor = Supervisor::new(config);
//!
//! let address = supervisor.start().await?;
//! supervisor.wait_ready().await?;
//! println!("service at {address}");
//!
//! supervisor.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! sidecar run --entry-point ./api
//! sidecar config
//! ```

pub mod cli;
pub mod credential;
pub mod environment;
pub mod port;
pub mod readiness;
pub mod service;
pub mod shutdown;
pub mod supervisor;

pub use credential::AdminKey;
pub use port::{FixedPort, LoopbackProbe, PortAllocator};
pub use readiness::ReadinessProbe;
pub use service::{ServiceAddress, ServiceConfig};
pub use shutdown::{
    ExitOutcome, RequestOutcome, ShutdownCoordinator, ShutdownReport, ShutdownSettings,
};
pub use supervisor::{ServiceOptions, Supervisor, SupervisorState, SupervisorStatus};

pub use sidecar_config::{CliArgs, Config, ConfigBuilder, ConfigSource, EnvNames, PortStrategy};
pub use sidecar_runner::{
    CommandSpec, LaunchError, NativeLauncher, OutputTail, ProcessHandle, ProcessLauncher,
};
pub use sidecar_utils::{ConfigError, ExitCode, RunMode, SidecarError};
