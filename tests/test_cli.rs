//! Integration tests for the sidecar CLI binary
//!
//! Each test runs in its own temporary project (a directory with `.git`) so
//! discovery never picks up configuration from the surrounding checkout.

use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    dir
}

fn write_config(dir: &Path, content: &str) {
    let config_dir = dir.join(".sidecar");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), content).unwrap();
}

fn sidecar_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sidecar"));
    cmd.current_dir(dir)
        .env_remove("SIDECAR_HOME")
        .env_remove("RUST_LOG")
        .stdin(Stdio::null());
    cmd
}

fn toml_string(value: &str) -> String {
    format!("{value:?}")
}

#[test]
fn version_output() {
    let dir = project();
    sidecar_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sidecar"));
}

#[test]
fn keygen_prints_default_length_key() {
    let dir = project();
    sidecar_cmd(dir.path())
        .arg("keygen")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^[A-Za-z0-9]{10}\n$").unwrap());
}

#[test]
fn keygen_honours_length_flag() {
    let dir = project();
    sidecar_cmd(dir.path())
        .args(["keygen", "--length", "32"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^[A-Za-z0-9]{32}\n$").unwrap());
}

#[test]
fn keygen_rejects_short_length() {
    let dir = project();
    sidecar_cmd(dir.path())
        .args(["keygen", "--length", "4"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("key_length"));
}

#[test]
fn port_prints_bindable_port() {
    let dir = project();
    let output = sidecar_cmd(dir.path())
        .args(["port", "--start", "20000", "--attempts", "200"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let port: u16 = String::from_utf8_lossy(&output.stdout).trim().parse().unwrap();
    assert!((20000..20200).contains(&port));
}

// 127.0.0.0/8 beyond 127.0.0.1 is only routable by default on Linux
#[cfg(target_os = "linux")]
#[test]
fn port_probes_configured_host() {
    let dir = project();
    write_config(dir.path(), "[network]\nhost = \"127.0.0.2\"\n");
    let held = std::net::TcpListener::bind(("127.0.0.2", 0)).unwrap();
    let busy = held.local_addr().unwrap().port();

    let output = sidecar_cmd(dir.path())
        .args(["port", "--start", &busy.to_string(), "--attempts", "50"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let port: u16 = String::from_utf8_lossy(&output.stdout).trim().parse().unwrap();
    assert!(port > busy, "port {busy} is held on 127.0.0.2 and must be skipped");
}

#[test]
fn port_rejects_zero_start() {
    let dir = project();
    sidecar_cmd(dir.path())
        .args(["port", "--start", "0"])
        .assert()
        .code(2);
}

#[test]
fn config_json_reports_sources() {
    let dir = project();
    write_config(dir.path(), "[network]\nport = 6123\n");

    let output = sidecar_cmd(dir.path())
        .args(["config", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["port"]["value"], "6123");
    assert_eq!(json["port"]["source"], "config");
    assert_eq!(json["key_length"]["source"], "default");
    assert_eq!(json["entry_point"]["value"], "(unset)");
}

#[test]
fn config_table_lists_file_and_values() {
    let dir = project();
    write_config(dir.path(), "[shutdown]\ntimeout_secs = 3\n");

    sidecar_cmd(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("# config file:"))
        .stdout(predicate::str::contains("shutdown_timeout_secs"))
        .stdout(predicate::str::contains("[config]"));
}

#[test]
fn invalid_config_file_exits_with_config_error() {
    let dir = project();
    write_config(dir.path(), "[network]\nbogus = 1\n");

    sidecar_cmd(dir.path()).arg("config").assert().code(2);
}

#[test]
fn run_without_entry_point_is_a_config_error() {
    let dir = project();
    sidecar_cmd(dir.path())
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("entry"));
}

#[test]
fn run_with_missing_program_is_a_launch_failure() {
    let dir = project();
    write_config(
        dir.path(),
        r#"
[service]
entry_point = "api"
command = ["definitely-not-a-real-program-4821"]
"#,
    );

    sidecar_cmd(dir.path())
        .arg("run")
        .assert()
        .code(70)
        .stderr(predicate::str::contains("definitely-not-a-real-program-4821"));
}

#[test]
fn run_with_crashing_service_reports_not_ready() {
    let dir = project();
    let stub = toml_string(env!("CARGO_BIN_EXE_sidecar-stub"));
    write_config(
        dir.path(),
        &format!(
            r#"
[service]
entry_point = "api"
command = [{stub}, "--crash"]

[readiness]
timeout_secs = 10
interval_ms = 25
"#
        ),
    );

    sidecar_cmd(dir.path())
        .arg("run")
        .assert()
        .code(5)
        .stderr(predicate::str::contains("exited"));
}
