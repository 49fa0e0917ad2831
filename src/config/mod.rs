// src/config/mod.rs

//! Launch plan loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan file from disk, or fall back to the built-in plan (`loader.rs`).
//! - Validate and resolve it into typed stage definitions (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_plan_path, load_and_validate, load_from_path, load_plan, LoadedPlan};
pub use model::{
    AppPlan, ConfigSection, EnvironmentPlan, EnvironmentSection, PlanFile, RawAppSection,
    RawPlanFile, RawReadiness, RawServiceSection, ReadinessSpec, ServicePlan, Settings,
    StagePlan, StageSection,
};
