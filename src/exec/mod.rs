// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] runs one finite command and classifies its outcome.
//! - [`service`] spawns and supervises the background data store.
//! - [`foreground`] runs the application with pass-through stdio.
//! - [`signal`] delivers stop signals to single processes and process groups.
//! - [`backend`] provides the `ProcessBackend` trait the orchestrator uses,
//!   and the `RealProcessBackend` used in production.

pub mod backend;
pub mod command;
pub mod foreground;
pub mod service;
pub mod signal;

pub use backend::{BoxFuture, ProcessBackend, RealProcessBackend};
pub use command::{
    exit_code, run_command, CommandEnv, Operation, StageOutcome, StageResult,
};
pub use foreground::run_foreground;
pub use service::{start_service, BackgroundProcess};
