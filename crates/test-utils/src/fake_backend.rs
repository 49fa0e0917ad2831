use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use launchpad::config::ServicePlan;
use launchpad::engine::{Phase, Stage};
use launchpad::errors::StageFailure;
use launchpad::exec::{
    BackgroundProcess, BoxFuture, CommandEnv, Operation, ProcessBackend, StageOutcome,
    StageResult,
};
use launchpad::fs::mock::MockFileSystem;
use tokio::sync::watch;

/// One interaction the orchestrator had with the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Stage(String),
    StartService(String),
    Foreground(Vec<String>),
    /// The application was asked to stop, with the grace it was given.
    StopForeground(Duration),
    Terminate(String),
}

/// Shared, clonable record of backend calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn stage_runs(&self, name: &str) -> usize {
        self.count(|c| matches!(c, Call::Stage(n) if n == name))
    }

    pub fn service_starts(&self) -> usize {
        self.count(|c| matches!(c, Call::StartService(_)))
    }

    pub fn foreground_runs(&self) -> usize {
        self.count(|c| matches!(c, Call::Foreground(_)))
    }

    pub fn foreground_stops(&self) -> usize {
        self.count(|c| matches!(c, Call::StopForeground(_)))
    }

    pub fn terminations(&self) -> usize {
        self.count(|c| matches!(c, Call::Terminate(_)))
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

/// A backend that never spawns anything:
/// - every call is recorded in a [`CallLog`]
/// - stages succeed unless scripted otherwise
/// - the service is a detached handle
/// - the application "exits" with a scripted code, either at once or only
///   after being asked to stop
pub struct FakeBackend {
    log: CallLog,
    always_fail: HashMap<String, StageFailure>,
    scripts: HashMap<String, VecDeque<StageOutcome>>,
    service_failure: Option<StageFailure>,
    foreground: Result<i32, StageFailure>,
    foreground_waits_for_stop: bool,
    marker: Option<(MockFileSystem, PathBuf)>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            always_fail: HashMap::new(),
            scripts: HashMap::new(),
            service_failure: None,
            foreground: Ok(0),
            foreground_waits_for_stop: false,
            marker: None,
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Every run of stage `name` fails with `failure`.
    pub fn fail_stage(mut self, name: &str, failure: StageFailure) -> Self {
        self.always_fail.insert(name.to_string(), failure);
        self
    }

    /// Runs of stage `name` take `outcomes` in order, then succeed.
    pub fn script_stage(mut self, name: &str, outcomes: Vec<StageOutcome>) -> Self {
        self.scripts.insert(name.to_string(), outcomes.into());
        self
    }

    pub fn fail_service_start(mut self, failure: StageFailure) -> Self {
        self.service_failure = Some(failure);
        self
    }

    pub fn foreground_exit(mut self, code: i32) -> Self {
        self.foreground = Ok(code);
        self
    }

    /// The application keeps running until shutdown is requested, then
    /// exits with `code`.
    pub fn foreground_until_shutdown(mut self, code: i32) -> Self {
        self.foreground = Ok(code);
        self.foreground_waits_for_stop = true;
        self
    }

    pub fn foreground_failure(mut self, failure: StageFailure) -> Self {
        self.foreground = Err(failure);
        self
    }

    /// A successful provisioning run creates `marker` in `fs`, like a real
    /// environment creation command would.
    pub fn creates_marker(mut self, fs: MockFileSystem, marker: impl Into<PathBuf>) -> Self {
        self.marker = Some((fs, marker.into()));
        self
    }

    fn outcome_for(&mut self, name: &str) -> StageOutcome {
        if let Some(failure) = self.always_fail.get(name) {
            return StageOutcome::Failed(failure.clone());
        }
        self.scripts
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(StageOutcome::Success)
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessBackend for FakeBackend {
    fn run_stage<'a>(
        &'a mut self,
        stage: &'a Stage,
        _env: &'a CommandEnv,
    ) -> BoxFuture<'a, StageResult> {
        self.log.push(Call::Stage(stage.name.clone()));
        let outcome = self.outcome_for(&stage.name);

        if outcome == StageOutcome::Success && stage.phase == Phase::Provisioning {
            if let Some((fs, marker)) = &self.marker {
                fs.add_file(marker, "");
            }
        }

        let result = match outcome {
            StageOutcome::Success => StageResult::success(&stage.name, Duration::ZERO),
            StageOutcome::Failed(failure) => {
                StageResult::failed(&stage.name, failure, Duration::ZERO)
            }
        };
        Box::pin(async move { result })
    }

    fn start_service<'a>(
        &'a mut self,
        service: &'a ServicePlan,
        _env: &'a CommandEnv,
    ) -> BoxFuture<'a, Result<BackgroundProcess, StageFailure>> {
        self.log
            .push(Call::StartService(service.operation.program.clone()));
        let result = match &self.service_failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(BackgroundProcess::detached(
                service.operation.program.clone(),
                service.readiness.window(),
            )),
        };
        Box::pin(async move { result })
    }

    fn run_foreground<'a>(
        &'a mut self,
        app: &'a Operation,
        _env: &'a CommandEnv,
        shutdown: Option<watch::Receiver<bool>>,
        stop_grace: Duration,
    ) -> BoxFuture<'a, Result<i32, StageFailure>> {
        let mut argv = vec![app.program.clone()];
        argv.extend(app.args.iter().cloned());
        self.log.push(Call::Foreground(argv));
        let result = self.foreground.clone();
        if !self.foreground_waits_for_stop {
            return Box::pin(async move { result });
        }

        let log = self.log.clone();
        Box::pin(async move {
            let stopped = match shutdown {
                Some(mut rx) => rx.wait_for(|stop| *stop).await.is_ok(),
                None => false,
            };
            if !stopped {
                std::future::pending::<()>().await;
            }
            log.push(Call::StopForeground(stop_grace));
            result
        })
    }

    fn terminate_service<'a>(&'a mut self, process: &'a mut BackgroundProcess) -> BoxFuture<'a, ()> {
        self.log.push(Call::Terminate(process.name().to_string()));
        Box::pin(async {})
    }
}
