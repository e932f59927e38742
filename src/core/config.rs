//! # Run budget configuration.
//!
//! [`ExecConfig`] centralizes the boundary controls the governor enforces
//! around one run.
//!
//! ## Sentinel values
//! - `max_steps = 0` → unlimited stage transitions
//! - `max_execution_time = 0s` → no wall-clock budget
//! - `max_tool_calls = 0` → unlimited tool calls

use std::time::Duration;

/// Boundary controls for one run.
///
/// ## Field semantics
/// - `max_steps`: ceiling on total stage transitions — a loop-count bound
///   distinct from `max_retries`, since the retrieval/draft stages count
///   too (`0` = unlimited).
/// - `max_execution_time`: wall-clock budget for the whole run, checked
///   cooperatively at stage boundaries (`0s` = unlimited).
/// - `max_retries`: the critic's rejection budget, copied into each run's
///   initial state.
/// - `max_tool_calls`: ceiling on recorded tool calls (`0` = unlimited).
/// - `enable_trace`: attach the final state snapshot to the report and
///   emit a `state.snapshot` event at completion.
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to
/// avoid sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct ExecConfig {
    /// Maximum stage transitions per run (`0` = unlimited).
    pub max_steps: u32,
    /// Wall-clock budget per run (`0s` = unlimited).
    pub max_execution_time: Duration,
    /// Critic rejection budget per run.
    pub max_retries: u32,
    /// Maximum recorded tool calls per run (`0` = unlimited).
    pub max_tool_calls: u32,
    /// Include the final state snapshot in report and audit trail.
    pub enable_trace: bool,
}

impl ExecConfig {
    /// Returns the step ceiling as an `Option`.
    #[inline]
    pub fn step_limit(&self) -> Option<u32> {
        if self.max_steps == 0 {
            None
        } else {
            Some(self.max_steps)
        }
    }

    /// Returns the wall-clock budget as an `Option`.
    #[inline]
    pub fn time_limit(&self) -> Option<Duration> {
        if self.max_execution_time == Duration::ZERO {
            None
        } else {
            Some(self.max_execution_time)
        }
    }

    /// Returns the tool-call ceiling as an `Option`.
    #[inline]
    pub fn tool_call_limit(&self) -> Option<u32> {
        if self.max_tool_calls == 0 {
            None
        } else {
            Some(self.max_tool_calls)
        }
    }
}

impl Default for ExecConfig {
    /// Default configuration:
    ///
    /// - `max_steps = 20`
    /// - `max_execution_time = 300s`
    /// - `max_retries = 2`
    /// - `max_tool_calls = 0` (unlimited)
    /// - `enable_trace = true`
    fn default() -> Self {
        Self {
            max_steps: 20,
            max_execution_time: Duration::from_secs(300),
            max_retries: 2,
            max_tool_calls: 0,
            enable_trace: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_mean_unlimited() {
        let cfg = ExecConfig {
            max_steps: 0,
            max_execution_time: Duration::ZERO,
            max_tool_calls: 0,
            ..ExecConfig::default()
        };
        assert_eq!(cfg.step_limit(), None);
        assert_eq!(cfg.time_limit(), None);
        assert_eq!(cfg.tool_call_limit(), None);

        let cfg = ExecConfig::default();
        assert_eq!(cfg.step_limit(), Some(20));
        assert_eq!(cfg.time_limit(), Some(Duration::from_secs(300)));
    }
}
