use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AutomationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LoopPhase {
    Idle,
    Running,
    Paused,
    Stopping,
    Stopped,
}

impl Default for LoopPhase {
    fn default() -> Self {
        LoopPhase::Idle
    }
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopPhase::Idle => "idle",
            LoopPhase::Running => "running",
            LoopPhase::Paused => "paused",
            LoopPhase::Stopping => "stopping",
            LoopPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// The single loop's lifecycle state. Transitions are guard-checked here so
/// caller misuse surfaces as `InvalidTransition` without ever corrupting
/// the phase; the struct lives behind a mutex owned by the controller.
///
/// `run_id`, timestamps, and `last_error` describe the current run while
/// one is active and linger as "last run" context after it ends, until the
/// next `begin_run` replaces them.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub phase: LoopPhase,
    pub run_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle -> Running. Anything else is a caller error.
    pub fn begin_run(
        &mut self,
        run_id: String,
        started_at: DateTime<Utc>,
    ) -> Result<(), AutomationError> {
        if self.phase != LoopPhase::Idle {
            return Err(AutomationError::InvalidTransition {
                current: self.phase,
                attempted: "start",
            });
        }

        *self = Self {
            phase: LoopPhase::Running,
            run_id: Some(run_id),
            started_at: Some(started_at),
            stopped_at: None,
            last_error: None,
        };
        Ok(())
    }

    /// Running -> Paused. Pausing an already-paused loop is a no-op.
    /// Returns whether the phase changed.
    pub fn request_pause(&mut self) -> Result<bool, AutomationError> {
        match self.phase {
            LoopPhase::Running => {
                self.phase = LoopPhase::Paused;
                Ok(true)
            }
            LoopPhase::Paused => Ok(false),
            current => Err(AutomationError::InvalidTransition {
                current,
                attempted: "pause",
            }),
        }
    }

    /// Paused -> Running. Resuming a running loop is a no-op.
    pub fn request_resume(&mut self) -> Result<bool, AutomationError> {
        match self.phase {
            LoopPhase::Paused => {
                self.phase = LoopPhase::Running;
                Ok(true)
            }
            LoopPhase::Running => Ok(false),
            current => Err(AutomationError::InvalidTransition {
                current,
                attempted: "resume",
            }),
        }
    }

    /// Running|Paused -> Stopping. Stopping an idle or already-stopped loop
    /// is a no-op (the caller still gets current stats back). Returns
    /// whether a cancellation should be issued.
    pub fn request_stop(&mut self) -> bool {
        match self.phase {
            LoopPhase::Running | LoopPhase::Paused => {
                self.phase = LoopPhase::Stopping;
                true
            }
            LoopPhase::Stopping | LoopPhase::Stopped | LoopPhase::Idle => false,
        }
    }

    /// The loop finished (completed, cancelled, or failed).
    pub fn mark_stopped(&mut self, stopped_at: DateTime<Utc>, error: Option<String>) {
        self.phase = LoopPhase::Stopped;
        self.stopped_at = Some(stopped_at);
        self.last_error = error;
    }

    /// Stopped -> Idle, making the controller startable again. Also forces
    /// Idle after a worker died without finalizing.
    pub fn settle_idle(&mut self) {
        self.phase = LoopPhase::Idle;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, LoopPhase::Idle | LoopPhase::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_state() -> RunState {
        let mut state = RunState::new();
        state
            .begin_run("run-1".to_string(), Utc::now())
            .unwrap();
        state
    }

    #[test]
    fn full_lifecycle() {
        let mut state = RunState::new();
        assert_eq!(state.phase, LoopPhase::Idle);

        state.begin_run("run-1".to_string(), Utc::now()).unwrap();
        assert_eq!(state.phase, LoopPhase::Running);

        assert!(state.request_pause().unwrap());
        assert_eq!(state.phase, LoopPhase::Paused);

        assert!(state.request_resume().unwrap());
        assert_eq!(state.phase, LoopPhase::Running);

        assert!(state.request_stop());
        assert_eq!(state.phase, LoopPhase::Stopping);

        state.mark_stopped(Utc::now(), None);
        assert_eq!(state.phase, LoopPhase::Stopped);

        state.settle_idle();
        assert_eq!(state.phase, LoopPhase::Idle);
    }

    #[test]
    fn start_is_only_valid_from_idle() {
        let mut state = running_state();
        let err = state.begin_run("run-2".to_string(), Utc::now());
        assert!(matches!(
            err,
            Err(AutomationError::InvalidTransition {
                current: LoopPhase::Running,
                attempted: "start",
            })
        ));
        // The failed call must not have touched anything.
        assert_eq!(state.run_id.as_deref(), Some("run-1"));
    }

    #[test]
    fn double_pause_is_a_noop() {
        let mut state = running_state();
        assert!(state.request_pause().unwrap());
        assert!(!state.request_pause().unwrap());
        assert_eq!(state.phase, LoopPhase::Paused);
    }

    #[test]
    fn pause_from_idle_is_invalid() {
        let mut state = RunState::new();
        assert!(matches!(
            state.request_pause(),
            Err(AutomationError::InvalidTransition { attempted: "pause", .. })
        ));
        assert_eq!(state.phase, LoopPhase::Idle);
    }

    #[test]
    fn resume_from_idle_is_invalid() {
        let mut state = RunState::new();
        assert!(state.request_resume().is_err());
    }

    #[test]
    fn stop_from_terminal_phases_is_a_noop() {
        let mut state = RunState::new();
        assert!(!state.request_stop());
        assert_eq!(state.phase, LoopPhase::Idle);

        let mut state = running_state();
        state.mark_stopped(Utc::now(), None);
        assert!(!state.request_stop());
        assert_eq!(state.phase, LoopPhase::Stopped);
    }

    #[test]
    fn stop_works_from_paused() {
        let mut state = running_state();
        state.request_pause().unwrap();
        assert!(state.request_stop());
        assert_eq!(state.phase, LoopPhase::Stopping);
    }

    #[test]
    fn mark_stopped_records_fatal_error() {
        let mut state = running_state();
        state.mark_stopped(Utc::now(), Some("device unavailable".to_string()));
        assert_eq!(state.last_error.as_deref(), Some("device unavailable"));
    }
}
