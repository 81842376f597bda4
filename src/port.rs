//! Port allocation for the child service
//!
//! Two strategies: [`FixedPort`] hands back the configured port unchecked,
//! [`LoopbackProbe`] walks upward from the preferred port until a bind succeeds.

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::time::Duration;
use tracing::{debug, info};

use sidecar_config::{Config, PortStrategy};
use sidecar_utils::error::SidecarError;

/// Picks the TCP port the child listens on.
#[async_trait]
pub trait PortAllocator: Send + Sync {
    async fn allocate(&self, preferred: u16) -> Result<u16, SidecarError>;
}

/// Returns the preferred port without a collision check.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPort;

#[async_trait]
impl PortAllocator for FixedPort {
    async fn allocate(&self, preferred: u16) -> Result<u16, SidecarError> {
        Ok(preferred)
    }
}

/// Returns the first port at or above the preferred one that is bindable on
/// the loopback interface at allocation time.
///
/// The port is released again before the child starts, so another process
/// can still claim it in between.
#[derive(Debug, Clone)]
pub struct LoopbackProbe {
    host: IpAddr,
    attempts: u32,
    backoff: Duration,
}

impl LoopbackProbe {
    #[must_use]
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Probe configured by `[network]`: attempts, backoff and host.
    ///
    /// A host that is not an IP literal (`localhost`) probes `127.0.0.1`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let probe = Self::new(config.network.probe_attempts, config.probe_backoff());
        match config.network.host.parse::<IpAddr>() {
            Ok(host) => probe.with_host(host),
            Err(_) => probe,
        }
    }

    /// Same probe with a different number of attempts.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Probe on `host` instead of `127.0.0.1`.
    #[must_use]
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }
}

/// Whether `port` can be bound on `host` right now.
#[must_use]
pub fn is_bindable(host: IpAddr, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}

#[async_trait]
impl PortAllocator for LoopbackProbe {
    async fn allocate(&self, preferred: u16) -> Result<u16, SidecarError> {
        let mut probed: u32 = 0;
        for attempt in 0..self.attempts {
            // Stop at the top of the port range rather than wrapping
            let Some(port) = u16::try_from(attempt)
                .ok()
                .and_then(|offset| preferred.checked_add(offset))
            else {
                break;
            };

            probed += 1;
            if is_bindable(self.host, port) {
                if port != preferred {
                    info!(preferred, port, "Preferred port busy, using next free port");
                }
                return Ok(port);
            }

            debug!(port, attempt, "Port busy");
            if attempt + 1 < self.attempts && !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
        }

        Err(SidecarError::PortUnavailable {
            start: preferred,
            attempts: probed,
        })
    }
}

/// Allocator for the configured `[network].port_strategy`.
#[must_use]
pub fn allocator_for(config: &Config) -> Box<dyn PortAllocator> {
    match config.network.port_strategy {
        PortStrategy::Fixed => Box::new(FixedPort),
        PortStrategy::Probe => Box::new(LoopbackProbe::from_config(config)),
    }
}
