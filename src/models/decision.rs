use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SwipeOutcome {
    Like,
    Pass,
}

impl SwipeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeOutcome::Like => "Like",
            SwipeOutcome::Pass => "Pass",
        }
    }
}

/// One recorded loop iteration. Created for every iteration, including
/// capture failures (`outcome` is `None` exactly when `error` is set before
/// a decision could be computed). Immutable once appended, apart from
/// `swipe_attempted`, which is finalized after the gesture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: String,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    /// Path of the saved capture, when saving succeeded. Callers resolve
    /// this for thumbnails; a missing file means "capture unavailable".
    pub screenshot_path: Option<String>,
    pub best_reference_id: Option<String>,
    pub similarity: f64,
    pub outcome: Option<SwipeOutcome>,
    pub swipe_attempted: bool,
    pub error: Option<String>,
}

impl Decision {
    /// A decision the engine actually computed, recorded before the gesture.
    pub fn scored(
        id: String,
        run_id: String,
        timestamp: DateTime<Utc>,
        best_reference_id: String,
        similarity: f64,
        outcome: SwipeOutcome,
    ) -> Self {
        Self {
            id,
            run_id,
            timestamp,
            screenshot_path: None,
            best_reference_id: Some(best_reference_id),
            similarity,
            outcome: Some(outcome),
            swipe_attempted: false,
            error: None,
        }
    }

    /// An iteration that failed before a decision could be computed.
    pub fn errored(id: String, run_id: String, timestamp: DateTime<Utc>, error: String) -> Self {
        Self {
            id,
            run_id,
            timestamp,
            screenshot_path: None,
            best_reference_id: None,
            similarity: 0.0,
            outcome: None,
            swipe_attempted: false,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
