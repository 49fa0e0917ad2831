// src/exec/backend.rs

//! Pluggable process backend.
//!
//! The orchestrator talks to a `ProcessBackend` instead of spawning processes
//! itself. Production uses [`RealProcessBackend`]; tests provide a fake that
//! records calls and returns scripted outcomes without touching the OS.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::ServicePlan;
use crate::engine::Stage;
use crate::errors::StageFailure;

use super::command::{run_command, CommandEnv, Operation, StageResult};
use super::foreground::run_foreground;
use super::service::{start_service, BackgroundProcess};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything the orchestrator needs from the outside world.
pub trait ProcessBackend: Send {
    /// Run a finite stage command to completion (Command Runner).
    fn run_stage<'a>(
        &'a mut self,
        stage: &'a Stage,
        env: &'a CommandEnv,
    ) -> BoxFuture<'a, StageResult>;

    /// Spawn the background service and return as soon as it is running.
    fn start_service<'a>(
        &'a mut self,
        service: &'a ServicePlan,
        env: &'a CommandEnv,
    ) -> BoxFuture<'a, Result<BackgroundProcess, StageFailure>>;

    /// Run the application in the foreground and return its exit code.
    ///
    /// Once `shutdown` observes `true` the application is asked to stop and
    /// given `stop_grace` before it is killed.
    fn run_foreground<'a>(
        &'a mut self,
        app: &'a Operation,
        env: &'a CommandEnv,
        shutdown: Option<watch::Receiver<bool>>,
        stop_grace: Duration,
    ) -> BoxFuture<'a, Result<i32, StageFailure>>;

    /// Stop a service previously returned by `start_service`.
    fn terminate_service<'a>(&'a mut self, process: &'a mut BackgroundProcess) -> BoxFuture<'a, ()>;
}

/// Backend that spawns real OS processes through `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct RealProcessBackend;

impl RealProcessBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessBackend for RealProcessBackend {
    fn run_stage<'a>(
        &'a mut self,
        stage: &'a Stage,
        env: &'a CommandEnv,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(run_command(
            &stage.name,
            &stage.operation,
            env,
            stage.timeout,
            stage.output,
        ))
    }

    fn start_service<'a>(
        &'a mut self,
        service: &'a ServicePlan,
        env: &'a CommandEnv,
    ) -> BoxFuture<'a, Result<BackgroundProcess, StageFailure>> {
        Box::pin(async move { start_service(service, env) })
    }

    fn run_foreground<'a>(
        &'a mut self,
        app: &'a Operation,
        env: &'a CommandEnv,
        shutdown: Option<watch::Receiver<bool>>,
        stop_grace: Duration,
    ) -> BoxFuture<'a, Result<i32, StageFailure>> {
        Box::pin(run_foreground(app, env, shutdown, stop_grace))
    }

    fn terminate_service<'a>(&'a mut self, process: &'a mut BackgroundProcess) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            process.terminate().await;
        })
    }
}
