use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::models::{Decision, SwipeOutcome};

const MAX_RECENT_DECISIONS: usize = 25;

/// Cumulative counters for a run. Unlike the recent window these are never
/// evicted, so they stay correct over arbitrarily long runs.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub run_id: Option<String>,
    pub swipes_performed: u32,
    pub swipes_remaining: u32,
    pub likes: u64,
    pub passes: u64,
    pub errors: u64,
    pub matches: u64,
    pub average_similarity: f64,
    pub max_similarity: f64,
    pub min_similarity: f64,
}

#[derive(Default)]
struct LedgerState {
    run_id: Option<String>,
    max_swipes: u32,
    recent: VecDeque<Decision>,
    swipes_performed: u32,
    likes: u64,
    passes: u64,
    errors: u64,
    matches: u64,
    similarity_sum: f64,
    scored_count: u64,
    max_similarity: f64,
    min_similarity: f64,
}

/// Append-only record of the run's decisions: a bounded window of recent
/// entries for display plus cumulative statistics. Decisions are appended
/// by the loop only; everyone else reads snapshots.
#[derive(Clone)]
pub struct DecisionLedger {
    inner: Arc<Mutex<LedgerState>>,
}

impl DecisionLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LedgerState::default())),
        }
    }

    /// Reset the ledger for a fresh run.
    pub async fn begin_run(&self, run_id: String, max_swipes: u32) {
        let mut state = self.inner.lock().await;
        *state = LedgerState {
            run_id: Some(run_id),
            max_swipes,
            ..LedgerState::default()
        };
    }

    pub async fn append(&self, decision: Decision) {
        let mut state = self.inner.lock().await;

        if decision.is_error() {
            state.errors += 1;
        } else if let Some(outcome) = decision.outcome {
            match outcome {
                SwipeOutcome::Like => state.likes += 1,
                SwipeOutcome::Pass => state.passes += 1,
            }

            state.similarity_sum += decision.similarity;
            state.scored_count += 1;
            if state.scored_count == 1 {
                state.max_similarity = decision.similarity;
                state.min_similarity = decision.similarity;
            } else {
                state.max_similarity = state.max_similarity.max(decision.similarity);
                state.min_similarity = state.min_similarity.min(decision.similarity);
            }
        }

        state.recent.push_back(decision);
        if state.recent.len() > MAX_RECENT_DECISIONS {
            state.recent.pop_front();
        }
    }

    /// A computed decision consumed the current profile; count it against
    /// the budget. Errored iterations never reach this.
    pub async fn record_swipe(&self) {
        let mut state = self.inner.lock().await;
        state.swipes_performed += 1;
    }

    pub async fn record_match(&self) {
        let mut state = self.inner.lock().await;
        state.matches += 1;
    }

    /// Finalize the gesture flag on an already-appended decision. The entry
    /// may have been evicted from the window by later appends; counters are
    /// unaffected either way.
    pub async fn mark_swipe_attempted(&self, decision_id: &str, attempted: bool) {
        let mut state = self.inner.lock().await;
        if let Some(decision) = state
            .recent
            .iter_mut()
            .rev()
            .find(|decision| decision.id == decision_id)
        {
            decision.swipe_attempted = attempted;
        }
    }

    /// Up to `n` decisions, most recent first.
    pub async fn recent(&self, n: usize) -> Vec<Decision> {
        let state = self.inner.lock().await;
        state.recent.iter().rev().take(n).cloned().collect()
    }

    pub async fn summary(&self) -> LedgerSummary {
        let state = self.inner.lock().await;

        let average_similarity = if state.scored_count > 0 {
            state.similarity_sum / state.scored_count as f64
        } else {
            0.0
        };

        LedgerSummary {
            run_id: state.run_id.clone(),
            swipes_performed: state.swipes_performed,
            swipes_remaining: state.max_swipes.saturating_sub(state.swipes_performed),
            likes: state.likes,
            passes: state.passes,
            errors: state.errors,
            matches: state.matches,
            average_similarity,
            max_similarity: state.max_similarity,
            min_similarity: state.min_similarity,
        }
    }
}

impl Default for DecisionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn scored(id: &str, similarity: f64, outcome: SwipeOutcome) -> Decision {
        Decision::scored(
            id.to_string(),
            "run-1".to_string(),
            Utc::now(),
            "ref-1".to_string(),
            similarity,
            outcome,
        )
    }

    fn errored(id: &str) -> Decision {
        Decision::errored(
            id.to_string(),
            "run-1".to_string(),
            Utc::now(),
            "capture failed".to_string(),
        )
    }

    #[tokio::test]
    async fn counters_survive_window_eviction() {
        let ledger = DecisionLedger::new();
        ledger.begin_run("run-1".to_string(), 1000).await;

        for i in 0..(MAX_RECENT_DECISIONS + 10) {
            ledger
                .append(scored(&format!("d{i}"), 0.8, SwipeOutcome::Like))
                .await;
            ledger.record_swipe().await;
        }

        let summary = ledger.summary().await;
        assert_eq!(summary.likes, (MAX_RECENT_DECISIONS + 10) as u64);
        assert_eq!(summary.swipes_performed, (MAX_RECENT_DECISIONS + 10) as u32);
        assert_eq!(ledger.recent(usize::MAX).await.len(), MAX_RECENT_DECISIONS);
    }

    #[tokio::test]
    async fn errors_count_but_do_not_consume_budget() {
        let ledger = DecisionLedger::new();
        ledger.begin_run("run-1".to_string(), 10).await;

        ledger.append(errored("e1")).await;
        ledger.append(scored("d1", 0.3, SwipeOutcome::Pass)).await;
        ledger.record_swipe().await;

        let summary = ledger.summary().await;
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.passes, 1);
        assert_eq!(summary.swipes_performed, 1);
        assert_eq!(summary.swipes_remaining, 9);
    }

    #[tokio::test]
    async fn recent_is_most_recent_first() {
        let ledger = DecisionLedger::new();
        ledger.begin_run("run-1".to_string(), 10).await;
        ledger.append(scored("first", 0.2, SwipeOutcome::Pass)).await;
        ledger.append(scored("second", 0.9, SwipeOutcome::Like)).await;

        let recent = ledger.recent(2).await;
        assert_eq!(recent[0].id, "second");
        assert_eq!(recent[1].id, "first");
    }

    #[tokio::test]
    async fn similarity_aggregates_track_scored_decisions_only() {
        let ledger = DecisionLedger::new();
        ledger.begin_run("run-1".to_string(), 10).await;
        ledger.append(errored("e1")).await;
        ledger.append(scored("d1", 0.4, SwipeOutcome::Pass)).await;
        ledger.append(scored("d2", 0.8, SwipeOutcome::Like)).await;

        let summary = ledger.summary().await;
        assert!((summary.average_similarity - 0.6).abs() < 1e-9);
        assert!((summary.max_similarity - 0.8).abs() < 1e-9);
        assert!((summary.min_similarity - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn begin_run_clears_previous_run() {
        let ledger = DecisionLedger::new();
        ledger.begin_run("run-1".to_string(), 5).await;
        ledger.append(scored("d1", 0.8, SwipeOutcome::Like)).await;
        ledger.record_swipe().await;

        ledger.begin_run("run-2".to_string(), 5).await;
        let summary = ledger.summary().await;
        assert_eq!(summary.run_id.as_deref(), Some("run-2"));
        assert_eq!(summary.likes, 0);
        assert_eq!(summary.swipes_performed, 0);
        assert!(ledger.recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn gesture_flag_is_updated_in_place() {
        let ledger = DecisionLedger::new();
        ledger.begin_run("run-1".to_string(), 5).await;
        ledger.append(scored("d1", 0.8, SwipeOutcome::Like)).await;

        ledger.mark_swipe_attempted("d1", true).await;
        assert!(ledger.recent(1).await[0].swipe_attempted);

        ledger.mark_swipe_attempted("d1", false).await;
        assert!(!ledger.recent(1).await[0].swipe_attempted);
    }
}
