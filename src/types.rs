use std::time::Duration;

use serde::Deserialize;

/// Whether a failing stage stops the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fatality {
    Fatal,
    NonFatal,
}

impl Fatality {
    pub fn from_flag(fatal: bool) -> Self {
        if fatal { Fatality::Fatal } else { Fatality::NonFatal }
    }

    pub fn is_fatal(self) -> bool {
        matches!(self, Fatality::Fatal)
    }
}

/// What to do when the data store is not confirmed ready.
///
/// - `Optimistic`: log the signal and launch the application anyway
///   (default behaviour).
/// - `Strict`: treat the signal as a fatal failure of the readiness stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessPolicy {
    Optimistic,
    Strict,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        ReadinessPolicy::Optimistic
    }
}

/// How a stage's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Child shares the orchestrator's stdout/stderr.
    Inherit,
    /// Child output is piped, logged at debug and kept in the stage result.
    Capture,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Inherit
    }
}

/// Longest duration a plan may configure (7 days). Keeps every
/// `Instant + Duration` in the pipeline clear of overflow.
pub const MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
