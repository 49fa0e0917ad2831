// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{LaunchpadError, Result};
use crate::fs::FileSystem;

/// A validated plan plus the file it came from (`None` for the built-in plan).
#[derive(Debug, Clone)]
pub struct LoadedPlan {
    pub plan: PlanFile,
    pub source: Option<PathBuf>,
}

/// Load a plan file from a given path and return the raw `RawPlanFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] to get
/// a checked [`PlanFile`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawPlanFile = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load a plan file from path, apply defaults and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PlanFile> {
    let raw = load_from_path(&path)?;
    PlanFile::try_from(raw)
}

/// Resolve which plan to use.
///
/// - An explicit path must exist.
/// - Without one, `Launchpad.toml` in the current directory is used when
///   present, otherwise the built-in plan.
pub fn load_plan(explicit: Option<&Path>, fs: &dyn FileSystem) -> Result<LoadedPlan> {
    let path = match explicit {
        Some(path) => {
            if !fs.exists(path) {
                return Err(LaunchpadError::ConfigError(format!(
                    "plan file {} does not exist",
                    path.display()
                )));
            }
            if fs.is_dir(path) {
                return Err(LaunchpadError::ConfigError(format!(
                    "plan path {} is a directory",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => {
            let default = default_plan_path();
            if !fs.exists(&default) {
                info!("no {} found; using built-in plan", default.display());
                return Ok(LoadedPlan {
                    plan: PlanFile::try_from(RawPlanFile::default())?,
                    source: None,
                });
            }
            default
        }
    };

    let contents = fs.read_to_string(&path)?;
    let raw: RawPlanFile = toml::from_str(&contents)?;
    let plan = PlanFile::try_from(raw)?;
    info!(plan = %path.display(), "loaded launch plan");

    Ok(LoadedPlan {
        plan,
        source: Some(path),
    })
}

/// Plan file looked up when `--plan` is not given.
pub fn default_plan_path() -> PathBuf {
    PathBuf::from("Launchpad.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn explicit_missing_plan_is_an_error() {
        let fs = MockFileSystem::new();
        let err = load_plan(Some(Path::new("/etc/launchpad/missing.toml")), &fs).unwrap_err();
        assert!(matches!(err, LaunchpadError::ConfigError(msg) if msg.contains("does not exist")));
    }

    #[test]
    fn absent_default_plan_falls_back_to_built_in() {
        let fs = MockFileSystem::new();
        let loaded = load_plan(None, &fs).unwrap();
        assert!(loaded.source.is_none());
        assert_eq!(loaded.plan.sync.operation.to_string(), "git pull");
    }

    #[test]
    fn explicit_plan_is_read_through_the_filesystem() {
        let fs = MockFileSystem::new();
        fs.add_file("/srv/bot/Launchpad.toml", "[app]\ncmd = [\"./bot\"]\n");

        let loaded = load_plan(Some(Path::new("/srv/bot/Launchpad.toml")), &fs).unwrap();
        assert_eq!(loaded.source, Some(PathBuf::from("/srv/bot/Launchpad.toml")));
        assert_eq!(loaded.plan.app.operation.program, "./bot");
    }
}
