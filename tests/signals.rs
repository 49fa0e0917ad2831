// tests/signals.rs
#![cfg(unix)]

mod common;
use crate::common::{pid_exits, read_pid_file, with_timeout};

use std::path::Path;
use std::process::Stdio;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Command;

// The app traps TERM, leaves a marker and exits with its own code.
const PLAN: &str = r#"
[environment]
create = ["mkdir", "-p", ".venv"]

[sync]
cmd = ["true"]

[deps]
cmd = ["true"]

[service]
cmd = ["sh", "-c", "echo $$ > service.pid; exec sleep 300"]
readiness = { mode = "delay", grace = "50ms" }
stop_grace = "2s"

[app]
cmd = ["sh", "-c", "trap 'touch stopped; exit 3' TERM; echo $$ > app.pid; while :; do sleep 0.05; done"]
stop_grace = "3s"
"#;

/// Start the launcher, wait for the app, deliver `signal`, and return the
/// launcher's exit code with the service pid.
async fn launch_and_signal(dir: &Path, signal: Signal) -> (Option<i32>, u32) {
    std::fs::write(dir.join("Launchpad.toml"), PLAN).unwrap();

    let mut launcher = Command::new(env!("CARGO_BIN_EXE_launchpad"))
        .arg("--plan")
        .arg(dir.join("Launchpad.toml"))
        .arg("app.yml")
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let service = read_pid_file(&dir.join("service.pid")).await;
    read_pid_file(&dir.join("app.pid")).await;

    let pid = Pid::from_raw(launcher.id().unwrap() as i32);
    kill(pid, signal).unwrap();

    let status = with_timeout(launcher.wait()).await.unwrap();
    (status.code(), service)
}

#[tokio::test]
async fn sigterm_stops_the_app_gracefully_and_releases_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let (code, service) = launch_and_signal(dir.path(), Signal::SIGTERM).await;

    assert_eq!(code, Some(3));
    assert!(dir.path().join("stopped").exists());
    assert!(pid_exits(service).await, "service {service} outlived the launcher");
}

#[tokio::test]
async fn sigint_is_handled_like_sigterm() {
    let dir = tempfile::tempdir().unwrap();
    let (code, service) = launch_and_signal(dir.path(), Signal::SIGINT).await;

    assert_eq!(code, Some(3));
    assert!(dir.path().join("stopped").exists());
    assert!(pid_exits(service).await, "service {service} outlived the launcher");
}
