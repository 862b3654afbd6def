use thiserror::Error;

use crate::swiper::LoopPhase;

/// Error kinds surfaced by the control surface and the loop.
///
/// Per-iteration failures are folded into `Decision::error` instead of
/// propagating out of the loop; only configuration errors and escalated
/// device unavailability abort a run.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// Bad caller input. Never retried, surfaced immediately.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Caller misuse of the loop lifecycle. Reported without changing state.
    #[error("cannot {attempted} while loop is {current}")]
    InvalidTransition {
        current: LoopPhase,
        attempted: &'static str,
    },

    /// Repeated capture failures exhausted the retry budget; the run is over.
    #[error("device unavailable after {failures} consecutive capture failures")]
    DeviceUnavailable { failures: u32 },

    /// Every reference pair failed to score for this candidate.
    #[error("scoring unavailable: {0}")]
    ScoringUnavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AutomationError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        AutomationError::Configuration(msg.into())
    }

    pub fn scoring_unavailable(msg: impl Into<String>) -> Self {
        AutomationError::ScoringUnavailable(msg.into())
    }
}
