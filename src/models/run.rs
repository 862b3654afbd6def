use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// Loop is (or was, if the process died) actively iterating.
    Running,
    /// Swipe budget exhausted.
    Completed,
    /// Stopped by the caller.
    Stopped,
    /// Ended by an escalated device failure.
    Failed,
    /// Found still `Running` at startup; the previous process crashed.
    Interrupted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "Running",
            RunStatus::Completed => "Completed",
            RunStatus::Stopped => "Stopped",
            RunStatus::Failed => "Failed",
            RunStatus::Interrupted => "Interrupted",
        }
    }
}

/// One automation run as persisted: the config snapshot it started with
/// plus cumulative counters, finalized when the run ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub similarity_threshold: f64,
    pub delay_between_swipes_ms: u64,
    pub max_swipes: u32,
    pub swipes_performed: u32,
    pub likes: u64,
    pub passes: u64,
    pub errors: u64,
    pub matches: u64,
    pub fatal_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInfo {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub swipes_performed: u32,
    pub likes: u64,
    pub passes: u64,
    pub errors: u64,
    pub matches: u64,
}

impl From<Run> for RunInfo {
    fn from(run: Run) -> Self {
        Self {
            id: run.id,
            started_at: run.started_at,
            stopped_at: run.stopped_at,
            status: run.status,
            swipes_performed: run.swipes_performed,
            likes: run.likes,
            passes: run.passes,
            errors: run.errors,
            matches: run.matches,
        }
    }
}
