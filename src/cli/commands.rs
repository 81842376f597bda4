//! Command implementations

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use sidecar_config::Config;
use sidecar_utils::error::SidecarError;

use crate::credential::AdminKey;
use crate::port::{LoopbackProbe, PortAllocator};
use crate::shutdown::ShutdownReport;
use crate::supervisor::Supervisor;

/// How often `run` checks whether the child died on its own.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Lines of child output shown when the service fails to come up.
const FAILURE_TAIL_LINES: usize = 20;

#[derive(Debug, Serialize)]
struct RunOutput<'a> {
    base_url: String,
    pid: Option<u32>,
    port: u16,
    run_mode: &'a str,
    ready_after_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct StopOutput {
    pid: Option<u32>,
    forced: bool,
    elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
struct EffectiveValue {
    value: String,
    source: String,
}

/// `sidecar run`: start, optionally wait for readiness, then hold the
/// service until interrupted or until it exits by itself.
pub async fn execute_run(config: Config, wait_ready: bool, json: bool) -> Result<()> {
    let run_mode = config.service.run_mode;
    let supervisor = Supervisor::new(config);
    let address = supervisor.start().await?;

    let ready_after = if wait_ready {
        match supervisor.wait_ready().await {
            Ok(waited) => Some(waited),
            Err(err) => {
                print_output_tail(&supervisor).await;
                supervisor.stop().await;
                return Err(err.into());
            }
        }
    } else {
        None
    };

    let status = supervisor.status();
    if json {
        let output = RunOutput {
            base_url: address.to_string(),
            pid: status.pid,
            port: address.port,
            run_mode: run_mode.as_str(),
            ready_after_ms: ready_after.map(|d| d.as_millis() as u64),
        };
        println!(
            "{}",
            serde_json::to_string(&output).context("Failed to emit run JSON")?
        );
    } else {
        println!("{address}");
    }

    let exited = tokio::select! {
        () = shutdown_signal() => {
            info!("Interrupt received; stopping service");
            None
        }
        status = wait_for_child_exit(&supervisor) => Some(status),
    };

    if let Some(status) = &exited {
        warn!(%status, "Service exited on its own");
        print_output_tail(&supervisor).await;
    }

    let report = supervisor.stop().await;
    if json {
        println!(
            "{}",
            serde_json::to_string(&stop_output(&report)).context("Failed to emit stop JSON")?
        );
    }

    match exited {
        Some(status) => Err(SidecarError::ChildExited { status }.into()),
        None => Ok(()),
    }
}

fn stop_output(report: &ShutdownReport) -> StopOutput {
    StopOutput {
        pid: report.pid,
        forced: report.was_forced(),
        elapsed_ms: report.elapsed.as_millis() as u64,
    }
}

async fn wait_for_child_exit(supervisor: &Supervisor) -> String {
    loop {
        if let Some(status) = supervisor.child_exit().await {
            return status;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
}

async fn print_output_tail(supervisor: &Supervisor) {
    let Some(tail) = supervisor.output_tail().await else {
        return;
    };
    let lines = tail.last_lines(FAILURE_TAIL_LINES);
    if lines.is_empty() {
        return;
    }
    eprintln!("Last service output:");
    for line in lines {
        eprintln!("  | {line}");
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {err}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// `sidecar keygen`
pub fn execute_keygen(config: &Config) -> Result<()> {
    let key = AdminKey::generate(config.credentials.key_length);
    println!("{}", key.expose());
    Ok(())
}

/// `sidecar port`
pub async fn execute_port(config: &Config, start: Option<u16>, attempts: Option<u32>) -> Result<()> {
    let start = start.unwrap_or(config.network.port);
    if start == 0 {
        return Err(SidecarError::InvalidService {
            reason: "--start must be between 1 and 65535".to_string(),
        }
        .into());
    }

    let mut probe = LoopbackProbe::from_config(config);
    if let Some(attempts) = attempts {
        probe = probe.with_attempts(attempts);
    }
    let port = probe.allocate(start).await?;
    println!("{port}");
    Ok(())
}

/// `sidecar config`
pub fn execute_config(config: &Config, json: bool) -> Result<()> {
    let effective = config.effective_config();

    if json {
        let output: BTreeMap<String, EffectiveValue> = effective
            .into_iter()
            .map(|(key, (value, source))| (key, EffectiveValue { value, source }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to emit config JSON")?
        );
        return Ok(());
    }

    match &config.config_path {
        Some(path) => println!("# config file: {}", path.display()),
        None => println!("# config file: (none, using defaults)"),
    }
    let width = effective.keys().map(String::len).max().unwrap_or(0);
    for (key, (value, source)) in effective {
        println!("{key:<width$}  {value}  [{source}]");
    }
    Ok(())
}
