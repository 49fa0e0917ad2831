// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod readiness;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::load_plan;
use crate::engine::{Orchestrator, Pipeline, Provisioner, RunOutcome};
use crate::exec::{CommandEnv, RealProcessBackend};
use crate::fs::RealFileSystem;
use crate::readiness::probe_for;
use crate::types::ReadinessPolicy;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading (or the built-in plan)
/// - stage definitions and the per-command environment
/// - the real process backend and readiness probe
/// - SIGINT / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<RunOutcome> {
    let fs = Arc::new(RealFileSystem);
    let loaded = load_plan(args.plan.as_deref(), fs.as_ref())?;
    let base_dir = plan_root_dir(loaded.source.as_deref());

    let mut pipeline = Pipeline::from_plan(&loaded.plan, &base_dir, &args.app_config);
    if args.strict_readiness {
        pipeline.readiness_policy = ReadinessPolicy::Strict;
    }
    let env = pipeline.command_env(&loaded.plan);
    let probe = probe_for(&pipeline.service.readiness);

    if args.dry_run {
        print_dry_run(&pipeline, &env, &probe.describe());
        return Ok(RunOutcome::Success);
    }

    // SIGINT or SIGTERM -> stop the pipeline (or the application) and
    // release the service.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!(working_dir = %pipeline.working_dir.display(), "starting launch pipeline");
    let orchestrator = Orchestrator::new(
        pipeline,
        RealProcessBackend::new(),
        Provisioner::new(fs),
        probe,
        env,
    )
    .with_shutdown(shutdown_rx);

    Ok(orchestrator.run().await)
}

/// Resolves on the first SIGINT (Ctrl-C) or, on unix, SIGTERM.
///
/// A handler that cannot be installed only disables that signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT; shutting down"),
        () = terminate => info!("received SIGTERM; shutting down"),
    }
}

/// Directory the plan is resolved against.
///
/// - The plan file's parent directory when it has one (e.g.
///   "deploy/Launchpad.toml" -> "deploy").
/// - Otherwise the current working directory.
fn plan_root_dir(plan_path: Option<&Path>) -> PathBuf {
    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match plan_path.and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => {
            if parent.is_absolute() {
                parent.to_path_buf()
            } else {
                cwd().join(parent)
            }
        }
        _ => cwd(),
    }
}

fn print_dry_run(pipeline: &Pipeline, env: &CommandEnv, readiness: &str) {
    println!("launchpad dry-run");
    println!("  working_dir = {}", pipeline.working_dir.display());
    if let Some(path) = env.search_path() {
        println!("  PATH = {path}");
    }
    println!();

    println!("stages:");
    for line in pipeline.describe(readiness) {
        println!("  {line}");
    }

    debug!("dry-run complete (no execution)");
}
