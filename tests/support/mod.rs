//! Shared helpers for integration tests

#![allow(dead_code)]

use std::net::{Ipv4Addr, TcpListener};
use std::time::{Duration, Instant};

use sidecar::{Config, PortStrategy};

pub(crate) type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Path of the compiled stub service.
pub(crate) fn stub_path() -> &'static str {
    env!("CARGO_BIN_EXE_sidecar-stub")
}

/// A loopback port that was free a moment ago.
pub(crate) fn free_port() -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

/// Configuration launching `argv` on a fixed free port with short timeouts.
pub(crate) fn config_for(argv: &[&str]) -> Config {
    Config::builder()
        .command(argv.iter().copied())
        .entry_point("/svc/app")
        .port(free_port())
        .port_strategy(PortStrategy::Fixed)
        .shutdown_timeout(Duration::from_secs(1))
        .request_timeout(Duration::from_millis(500))
        .readiness_timeout(Duration::from_secs(10))
        .readiness_interval(Duration::from_millis(25))
        .build()
        .expect("valid test config")
}

/// Configuration launching the stub service with extra stub flags.
pub(crate) fn stub_config(flags: &[&str]) -> Config {
    let mut argv = vec![stub_path()];
    argv.extend_from_slice(flags);
    config_for(&argv)
}

/// Poll `check` until it returns true or `timeout` elapses.
pub(crate) async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Whether a process with `pid` still exists and is not a zombie.
#[cfg(unix)]
pub(crate) fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if kill(Pid::from_raw(raw), None).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        // Third field is the state; `Z` marks a zombie awaiting its reaper
        Ok(stat) => !stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}
