// src/exec/command.rs

//! Single-command runner used by every finite stage.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::StageFailure;
use crate::exec::signal::{own_process_group, signal_group, GroupGuard, StopSignal};
use crate::types::OutputMode;

/// How long to keep draining captured output after the child is gone.
/// Grandchildren can hold the pipes open indefinitely.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// An external program plus its arguments. Never run through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub program: String,
    pub args: Vec<String>,
}

impl Operation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Build from `[program, args...]`; `None` when there is no program.
    pub fn from_argv(argv: Vec<String>) -> Option<Self> {
        let mut iter = argv.into_iter();
        let program = iter.next()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program,
            args: iter.collect(),
        })
    }

    /// Tokio command with the environment applied. Streams are left at their
    /// defaults (inherited); callers pipe what they need.
    pub fn command(&self, env: &CommandEnv) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &env.working_dir {
            cmd.current_dir(dir);
        }
        cmd.envs(&env.vars);
        cmd.kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Explicit per-command environment.
///
/// Every child gets this instead of the orchestrator mutating its own
/// process-wide `PATH` or working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandEnv {
    pub working_dir: Option<PathBuf>,
    pub vars: BTreeMap<String, String>,
}

impl CommandEnv {
    /// `PATH` puts `<env_root>/bin` ahead of `fallback`; `VIRTUAL_ENV`
    /// points at `env_root`. `overrides` are applied last.
    pub fn for_environment(
        env_root: &Path,
        fallback: &[String],
        overrides: &BTreeMap<String, String>,
    ) -> Self {
        let mut entries = vec![env_root.join("bin").to_string_lossy().into_owned()];
        entries.extend(fallback.iter().cloned());

        let mut vars = BTreeMap::new();
        vars.insert("PATH".to_string(), entries.join(":"));
        vars.insert(
            "VIRTUAL_ENV".to_string(),
            env_root.to_string_lossy().into_owned(),
        );
        vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        Self {
            working_dir: None,
            vars,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn search_path(&self) -> Option<&str> {
        self.vars.get("PATH").map(String::as_str)
    }
}

/// Terminal status of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    Failed(StageFailure),
}

/// What the runner reports back for a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: String,
    pub outcome: StageOutcome,
    /// Combined stdout/stderr lines, only in [`OutputMode::Capture`].
    pub output: Option<String>,
    pub duration: Duration,
    pub attempts: u32,
    /// The stage had nothing to do (e.g. environment already present).
    pub skipped: bool,
}

impl StageResult {
    pub fn success(stage: impl Into<String>, duration: Duration) -> Self {
        Self::new(stage, StageOutcome::Success, duration)
    }

    pub fn failed(stage: impl Into<String>, failure: StageFailure, duration: Duration) -> Self {
        Self::new(stage, StageOutcome::Failed(failure), duration)
    }

    pub fn skipped(stage: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::new(stage, StageOutcome::Success, Duration::ZERO)
        }
    }

    fn new(stage: impl Into<String>, outcome: StageOutcome, duration: Duration) -> Self {
        Self {
            stage: stage.into(),
            outcome,
            output: None,
            duration,
            attempts: 1,
            skipped: false,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StageOutcome::Success)
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.outcome {
            StageOutcome::Success => None,
            StageOutcome::Failed(f) => Some(f),
        }
    }
}

/// Run one operation to completion.
///
/// Always yields a result: success, nonzero exit, spawn failure or timeout.
/// No retries here.
///
/// A stage with a timeout runs in its own process group. On timeout, or if
/// the future is dropped before the stage finishes, the whole group is
/// killed. Stages without a timeout stay in the launcher's group so they
/// can still prompt on the terminal.
pub async fn run_command(
    stage: &str,
    operation: &Operation,
    env: &CommandEnv,
    timeout: Option<Duration>,
    output: OutputMode,
) -> StageResult {
    let started = Instant::now();
    info!(stage, cmd = %operation, "starting stage command");

    let mut cmd = operation.command(env);
    if timeout.is_some() {
        own_process_group(&mut cmd);
    }
    if output == OutputMode::Capture {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(stage, program = %operation.program, error = %e, "failed to spawn stage command");
            return StageResult::failed(
                stage,
                StageFailure::spawn(&operation.program, &e),
                started.elapsed(),
            );
        }
    };

    let pgid = timeout.and(child.id());
    let mut group = GroupGuard::new(pgid);

    let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        spawn_line_reader(stage, "stdout", stdout, line_tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_reader(stage, "stderr", stderr, line_tx.clone());
    }
    drop(line_tx);

    let outcome = match timeout {
        Some(limit) => tokio::select! {
            status = child.wait() => outcome_from_wait(stage, status),
            _ = tokio::time::sleep(limit) => {
                warn!(stage, timeout = ?limit, pgid = ?pgid, "stage command timed out; killing process group");
                if let Some(pgid) = pgid {
                    signal_group(pgid, StopSignal::Kill);
                }
                if let Err(e) = child.kill().await {
                    warn!(stage, error = %e, "failed to kill timed-out process");
                }
                StageOutcome::Failed(StageFailure::Timeout(limit))
            }
        },
        None => outcome_from_wait(stage, child.wait().await),
    };
    group.disarm();

    let mut result = StageResult::new(stage, outcome, started.elapsed());
    if output == OutputMode::Capture {
        result.output = Some(drain_lines(line_rx).await);
    }

    info!(
        stage,
        success = result.is_success(),
        duration_ms = result.duration.as_millis() as u64,
        "stage command finished"
    );
    result
}

fn outcome_from_wait(stage: &str, status: std::io::Result<ExitStatus>) -> StageOutcome {
    match status {
        Ok(status) if status.success() => StageOutcome::Success,
        Ok(status) => StageOutcome::Failed(StageFailure::NonZeroExit {
            code: exit_code(&status),
            signal: exit_signal(&status),
        }),
        Err(e) => {
            warn!(stage, error = %e, "waiting for stage process failed");
            StageOutcome::Failed(StageFailure::exit(-1))
        }
    }
}

/// Exit code as a shell would report it: signal deaths become `128 + signal`.
pub fn exit_code(status: &ExitStatus) -> i32 {
    match (status.code(), exit_signal(status)) {
        (Some(code), _) => code,
        (None, Some(sig)) => 128 + sig,
        (None, None) => -1,
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

fn spawn_line_reader<R>(stage: &str, stream: &'static str, reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let stage = stage.to_string();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(stage = %stage, "{stream}: {line}");
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

async fn drain_lines(mut rx: mpsc::UnboundedReceiver<String>) -> String {
    let mut buf = String::new();
    let drain = async {
        while let Some(line) = rx.recv().await {
            buf.push_str(&line);
            buf.push('\n');
        }
    };
    if tokio::time::timeout(OUTPUT_DRAIN_GRACE, drain).await.is_err() {
        debug!("output pipes still open after process exit; truncating capture");
    }
    buf
}
