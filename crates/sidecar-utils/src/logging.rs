//! Tracing setup and lifecycle spans
//!
//! Logs go to stderr so that `--json` output on stdout stays machine-readable.

use tracing::{Level, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `sidecar=info` (or `sidecar=debug`
/// plus child output when `verbose`).
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("sidecar=debug,sidecar_runner=debug,info")
            } else {
                EnvFilter::try_new("sidecar=info,sidecar_runner=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span covering one service lifetime, from `start()` to the end of `stop()`.
pub fn service_span(program: &str, port: u16) -> tracing::Span {
    span!(Level::INFO, "sidecar_service", program = %program, port)
}

/// Span covering one shutdown protocol run.
pub fn shutdown_span(pid: u32) -> tracing::Span {
    span!(Level::INFO, "sidecar_shutdown", pid)
}
