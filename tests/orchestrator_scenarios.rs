// tests/orchestrator_scenarios.rs

mod common;
use crate::common::builders::{PlanBuilder, StageBuilder};
use crate::common::{
    fake_orchestrator, init_tracing, with_timeout, Call, FakeBackend, FakeProbe, BASE_DIR, MARKER,
};

use std::path::Path;
use std::sync::atomic::Ordering;

use launchpad::engine::{Phase, RunOutcome};
use launchpad::errors::StageFailure;
use launchpad::fs::mock::MockFileSystem;
use launchpad::fs::FileSystem;

fn pipeline() -> launchpad::engine::Pipeline {
    PlanBuilder::new().pipeline(BASE_DIR, "config.yml")
}

fn spawn_failure(program: &str) -> StageFailure {
    StageFailure::SpawnFailure {
        program: program.to_string(),
        reason: "No such file or directory (os error 2)".to_string(),
    }
}

#[tokio::test]
async fn fresh_checkout_runs_every_stage_and_exits_zero() {
    init_tracing();
    let fs = MockFileSystem::new();
    let backend = FakeBackend::new().creates_marker(fs.clone(), MARKER);
    let log = backend.log();
    let probe = FakeProbe::ready();
    let probe_calls = probe.calls();

    let outcome = with_timeout(fake_orchestrator(pipeline(), backend, &fs, probe).run()).await;

    assert_eq!(outcome, RunOutcome::Success);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(probe_calls.load(Ordering::SeqCst), 1);
    assert!(fs.exists(Path::new(MARKER)));
    assert_eq!(
        log.calls(),
        vec![
            Call::Stage("provision".into()),
            Call::Stage("sync".into()),
            Call::Stage("deps".into()),
            Call::StartService("redis-server".into()),
            Call::Foreground(vec!["python".into(), "run.py".into(), "config.yml".into()]),
            Call::Terminate("redis-server".into()),
        ]
    );
}

#[tokio::test]
async fn sync_failure_stops_before_dependencies() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir(MARKER);
    let backend = FakeBackend::new().fail_stage("sync", StageFailure::exit(1));
    let log = backend.log();
    let probe = FakeProbe::ready();
    let probe_calls = probe.calls();

    let outcome = with_timeout(fake_orchestrator(pipeline(), backend, &fs, probe).run()).await;

    assert_eq!(
        outcome,
        RunOutcome::Aborted {
            phase: Phase::Syncing,
            failure: StageFailure::exit(1),
        }
    );
    assert_eq!(outcome.exit_code(), 11);
    assert_eq!(log.stage_runs("sync"), 1);
    assert_eq!(log.stage_runs("deps"), 0);
    assert_eq!(log.service_starts(), 0);
    assert_eq!(log.foreground_runs(), 0);
    assert_eq!(log.terminations(), 0);
    assert_eq!(probe_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn service_spawn_failure_skips_readiness_and_app() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir(MARKER);
    let backend = FakeBackend::new().fail_service_start(spawn_failure("redis-server"));
    let log = backend.log();
    let probe = FakeProbe::ready();
    let probe_calls = probe.calls();

    let outcome = with_timeout(fake_orchestrator(pipeline(), backend, &fs, probe).run()).await;

    assert_eq!(outcome.exit_code(), 13);
    assert!(matches!(
        outcome,
        RunOutcome::Aborted {
            phase: Phase::StartingService,
            failure: StageFailure::SpawnFailure { .. },
        }
    ));
    assert_eq!(log.service_starts(), 1);
    assert_eq!(probe_calls.load(Ordering::SeqCst), 0);
    assert_eq!(log.foreground_runs(), 0);
    assert_eq!(log.terminations(), 0, "nothing was started, nothing to terminate");
}

#[tokio::test]
async fn provisioning_failure_aborts_with_its_own_code() {
    init_tracing();
    let fs = MockFileSystem::new();
    let backend = FakeBackend::new().fail_stage("provision", StageFailure::exit(1));
    let log = backend.log();

    let outcome =
        with_timeout(fake_orchestrator(pipeline(), backend, &fs, FakeProbe::ready()).run()).await;

    assert_eq!(outcome.exit_code(), 10);
    assert_eq!(log.calls(), vec![Call::Stage("provision".into())]);
}

#[tokio::test]
async fn existing_environment_is_not_recreated() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir(MARKER);
    let backend = FakeBackend::new();
    let log = backend.log();

    let outcome =
        with_timeout(fake_orchestrator(pipeline(), backend, &fs, FakeProbe::ready()).run()).await;

    assert_eq!(outcome, RunOutcome::Success);
    assert_eq!(log.stage_runs("provision"), 0);
    assert_eq!(log.stage_runs("sync"), 1);
}

#[tokio::test]
async fn foreground_exit_code_is_propagated_verbatim() {
    init_tracing();
    for code in [0, 1, 137, 255] {
        let fs = MockFileSystem::new();
        fs.add_dir(MARKER);
        let backend = FakeBackend::new().foreground_exit(code);
        let log = backend.log();

        let outcome =
            with_timeout(fake_orchestrator(pipeline(), backend, &fs, FakeProbe::ready()).run())
                .await;

        assert_eq!(outcome.exit_code(), code, "app exited with {code}");
        assert_eq!(outcome.summary(), None);
        assert_eq!(log.terminations(), 1, "service released after app exit {code}");
    }
}

#[tokio::test]
async fn app_that_cannot_start_aborts_and_releases_service() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir(MARKER);
    let backend = FakeBackend::new().foreground_failure(spawn_failure("python"));
    let log = backend.log();

    let outcome =
        with_timeout(fake_orchestrator(pipeline(), backend, &fs, FakeProbe::ready()).run()).await;

    assert_eq!(outcome.exit_code(), 15);
    assert_eq!(log.terminations(), 1);
}

#[tokio::test]
async fn strict_policy_aborts_when_service_is_not_ready() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir(MARKER);
    let backend = FakeBackend::new();
    let log = backend.log();
    let pipeline = PlanBuilder::new().strict().pipeline(BASE_DIR, "config.yml");

    let outcome = with_timeout(
        fake_orchestrator(pipeline, backend, &fs, FakeProbe::not_ready("port closed")).run(),
    )
    .await;

    assert_eq!(
        outcome,
        RunOutcome::Aborted {
            phase: Phase::AwaitingReadiness,
            failure: StageFailure::NotReady("port closed".into()),
        }
    );
    assert_eq!(outcome.exit_code(), 14);
    assert_eq!(log.foreground_runs(), 0);
    assert_eq!(log.terminations(), 1);
}

#[tokio::test]
async fn optimistic_policy_launches_app_despite_not_ready() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir(MARKER);
    let backend = FakeBackend::new();
    let log = backend.log();

    let outcome = with_timeout(
        fake_orchestrator(pipeline(), backend, &fs, FakeProbe::not_ready("slow start")).run(),
    )
    .await;

    assert_eq!(outcome, RunOutcome::Success);
    assert_eq!(log.foreground_runs(), 1);
    assert_eq!(log.terminations(), 1);
}

#[tokio::test]
async fn non_fatal_stage_failure_continues() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir(MARKER);
    let backend = FakeBackend::new().fail_stage("sync", StageFailure::exit(128));
    let log = backend.log();
    let pipeline = PlanBuilder::new()
        .sync(StageBuilder::new(&["git", "pull"]).fatal(false).build())
        .pipeline(BASE_DIR, "config.yml");

    let outcome =
        with_timeout(fake_orchestrator(pipeline, backend, &fs, FakeProbe::ready()).run()).await;

    assert_eq!(outcome, RunOutcome::Success);
    assert_eq!(log.stage_runs("sync"), 1);
    assert_eq!(log.stage_runs("deps"), 1);
    assert_eq!(log.foreground_runs(), 1);
}
