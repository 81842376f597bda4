//! Shutdown protocol against the stub service and unresponsive children

mod support;

use std::time::{Duration, Instant};

use sidecar::{
    AdminKey, CommandSpec, ExitOutcome, NativeLauncher, ProcessLauncher, RequestOutcome,
    ServiceAddress, ShutdownCoordinator, ShutdownSettings, Supervisor, SupervisorState,
};
use support::{Result, config_for, eventually, free_port, stub_config, stub_path};

#[tokio::test]
async fn test_voluntary_exit_fast_path() -> Result<()> {
    let supervisor = Supervisor::new(stub_config(&[]));
    supervisor.start().await?;
    supervisor.wait_ready().await?;

    let started = Instant::now();
    let report = supervisor.stop().await;

    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());
    assert!(!report.was_forced());
    assert!(matches!(report.exit, ExitOutcome::Voluntary(status) if status.success()));
    match &report.request {
        RequestOutcome::Accepted { status, body } => {
            assert_eq!(*status, 200);
            assert!(body.contains("shutting down"));
        }
        other => panic!("expected Accepted, got {other:?}"),
    }
    assert_eq!(supervisor.state(), SupervisorState::Idle);
    Ok(())
}

#[tokio::test]
async fn test_delayed_exit_within_timeout_is_voluntary() -> Result<()> {
    let supervisor = Supervisor::new(stub_config(&["--exit-delay-ms", "300"]));
    supervisor.start().await?;
    supervisor.wait_ready().await?;

    let report = supervisor.stop().await;

    assert!(matches!(report.exit, ExitOutcome::Voluntary(_)));
    assert!(report.elapsed >= Duration::from_millis(300));
    Ok(())
}

#[tokio::test]
async fn test_ignored_shutdown_is_force_killed_after_timeout() -> Result<()> {
    let supervisor = Supervisor::new(stub_config(&["--ignore-shutdown"]));
    supervisor.start().await?;
    supervisor.wait_ready().await?;

    let report = supervisor.stop().await;

    assert!(matches!(report.request, RequestOutcome::Accepted { .. }));
    assert!(matches!(report.exit, ExitOutcome::ForceKilled(_)));
    assert!(report.elapsed >= Duration::from_secs(1));
    assert!(report.elapsed < Duration::from_secs(3), "{:?}", report.elapsed);
    assert_eq!(supervisor.state(), SupervisorState::Idle);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreachable_endpoint_respects_timeout_bound() -> Result<()> {
    // `sleep` never listens, so the shutdown request is refused
    let supervisor = Supervisor::new(config_for(&["sleep", "30"]));
    supervisor.start().await?;
    let pid = supervisor.status().pid.expect("pid while running");

    let started = Instant::now();
    let report = supervisor.stop().await;
    let elapsed = started.elapsed();

    assert!(matches!(report.request, RequestOutcome::Unreachable(_)));
    assert!(matches!(report.exit, ExitOutcome::ForceKilled(_)));
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_millis(2500), "{elapsed:?}");
    assert_eq!(report.pid, Some(pid));

    assert!(eventually(Duration::from_secs(2), || !support::process_alive(pid)).await);
    Ok(())
}

#[tokio::test]
async fn test_wrong_key_is_rejected_with_403() -> Result<()> {
    let port = free_port();
    let spec = CommandSpec::new(stub_path())
        .env("FLASK_RUN_PORT", port.to_string())
        .env("FLASK_SERVER_ADMIN_KEY", "CorrectKey42");
    let handle = NativeLauncher::new().launch(&spec)?;
    let address = ServiceAddress::new("http", "127.0.0.1", port);

    // Wait for the stub to listen before asking it to stop
    let hello = address.endpoint("/api/v1/server/hello/test");
    let listening = {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if reqwest::get(&hello).await.is_ok() {
                break true;
            }
            if Instant::now() >= deadline {
                break false;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    };
    assert!(listening, "stub never started listening");

    let coordinator = ShutdownCoordinator::new(ShutdownSettings {
        exit_timeout: Duration::from_secs(1),
        ..ShutdownSettings::default()
    });
    let report = coordinator
        .shutdown(Some(handle), &address, &AdminKey::generate(12))
        .await;

    assert!(matches!(report.request, RequestOutcome::Rejected { status: 403, .. }));
    assert!(report.was_forced());
    Ok(())
}

#[tokio::test]
async fn test_child_that_already_exited_skips_request() -> Result<()> {
    let supervisor = Supervisor::new(stub_config(&["--crash"]));
    supervisor.start().await?;

    let exited = supervisor.wait_ready().await.unwrap_err();
    assert!(matches!(exited, sidecar::SidecarError::ChildExited { .. }));

    let report = supervisor.stop().await;
    assert_eq!(report.request, RequestOutcome::Skipped);
    assert!(matches!(report.exit, ExitOutcome::AlreadyExited(status) if status.code() == Some(3)));
    assert_eq!(supervisor.state(), SupervisorState::Idle);
    Ok(())
}
