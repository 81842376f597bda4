//! Readiness polling against the service's hello endpoint

use reqwest::Client;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use sidecar_config::Config;
use sidecar_utils::error::SidecarError;

use crate::service::ServiceAddress;

/// Per-attempt HTTP budget; clamped to the time left before the deadline.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    path: String,
    timeout: Duration,
    interval: Duration,
}

impl ReadinessProbe {
    #[must_use]
    pub fn new(path: impl Into<String>, timeout: Duration, interval: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
            interval,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.readiness.path.clone(),
            config.readiness_timeout(),
            config.readiness_interval(),
        )
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll until the service answers with a non-error status.
    ///
    /// `exited` is consulted before every attempt and returns the exit
    /// description once the child is gone. Returns the time it took.
    pub async fn wait<F, Fut>(
        &self,
        address: &ServiceAddress,
        mut exited: F,
    ) -> Result<Duration, SidecarError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        let url = address.endpoint(&self.path);
        let started = Instant::now();
        let deadline = started + self.timeout;
        let client = Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| SidecarError::NotReady {
                url: format!("{url} (client unavailable: {e})"),
                waited_ms: 0,
            })?;

        let mut attempt: u32 = 0;
        loop {
            if let Some(status) = exited().await {
                return Err(SidecarError::ChildExited { status });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SidecarError::NotReady {
                    url,
                    waited_ms: started.elapsed().as_millis(),
                });
            }

            attempt += 1;
            let budget = ATTEMPT_TIMEOUT.min(deadline - now);
            match client.get(&url).timeout(budget).send().await {
                Ok(response)
                    if !response.status().is_client_error()
                        && !response.status().is_server_error() =>
                {
                    let waited = started.elapsed();
                    info!(
                        %url,
                        attempt,
                        elapsed_ms = waited.as_millis() as u64,
                        "Service is ready"
                    );
                    return Ok(waited);
                }
                Ok(response) => {
                    debug!(%url, attempt, status = response.status().as_u16(), "Not ready yet");
                }
                Err(err) => {
                    debug!(%url, attempt, error = %err, "Not reachable yet");
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.interval.min(remaining)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, TcpListener};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn closed_port() -> u16 {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn serve_once_then(status_line: &'static str) -> u16 {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response =
                    format!("{status_line}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok");
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
        port
    }

    #[tokio::test]
    async fn test_ready_on_success_status() {
        let port = serve_once_then("HTTP/1.1 200 OK").await;
        let probe = ReadinessProbe::new("/hello", Duration::from_secs(5), Duration::from_millis(20));
        let address = ServiceAddress::new("http", "127.0.0.1", port);

        let waited = probe.wait(&address, || async { None }).await.unwrap();
        assert!(waited < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_error_status_is_not_ready() {
        let port = serve_once_then("HTTP/1.1 503 Service Unavailable").await;
        let probe = ReadinessProbe::new(
            "/hello",
            Duration::from_millis(300),
            Duration::from_millis(20),
        );
        let address = ServiceAddress::new("http", "127.0.0.1", port);

        let err = probe.wait(&address, || async { None }).await.unwrap_err();
        assert!(matches!(err, SidecarError::NotReady { .. }));
    }

    #[tokio::test]
    async fn test_times_out_when_unreachable() {
        let probe = ReadinessProbe::new(
            "/hello",
            Duration::from_millis(300),
            Duration::from_millis(50),
        );
        let address = ServiceAddress::new("http", "127.0.0.1", closed_port());

        let started = Instant::now();
        let err = probe.wait(&address, || async { None }).await.unwrap_err();

        assert!(matches!(err, SidecarError::NotReady { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_child_exit_ends_wait() {
        let probe = ReadinessProbe::new("/hello", Duration::from_secs(10), Duration::from_millis(10));
        let address = ServiceAddress::new("http", "127.0.0.1", closed_port());
        let checks = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&checks);
        let err = probe
            .wait(&address, move || {
                let counter = Arc::clone(&counter);
                async move {
                    (counter.fetch_add(1, Ordering::SeqCst) >= 2)
                        .then(|| "exit status: 1".to_string())
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SidecarError::ChildExited { ref status } if status == "exit status: 1"));
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }
}
