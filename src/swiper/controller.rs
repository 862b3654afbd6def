use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AutomationConfig;
use crate::db::Database;
use crate::device::DeviceDriver;
use crate::error::AutomationError;
use crate::ledger::{DecisionLedger, LedgerSummary};
use crate::matching::SimilarityScorer;
use crate::models::{Run, RunStatus};
use crate::references::ReferenceStore;

use super::loop_worker::{swipe_loop, LoopContext, LoopSignal};
use super::state::{LoopPhase, RunState};

/// Consistent point-in-time view of the loop, returned by every control
/// call. Safe to request concurrently with an in-flight iteration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopSnapshot {
    pub phase: LoopPhase,
    pub run_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub summary: LedgerSummary,
}

/// Owner of the singleton automation loop: lifecycle transitions, the
/// worker task, and the channels that control it.
#[derive(Clone)]
pub struct SwipeController {
    state: Arc<Mutex<RunState>>,
    ledger: DecisionLedger,
    references: ReferenceStore,
    db: Database,
    device: Arc<dyn DeviceDriver>,
    scorer: Arc<dyn SimilarityScorer>,
    captures_dir: Option<PathBuf>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    cancel_token: Arc<Mutex<Option<CancellationToken>>>,
    control_tx: Arc<Mutex<Option<watch::Sender<LoopSignal>>>>,
}

impl SwipeController {
    pub fn new(
        db: Database,
        references: ReferenceStore,
        device: Arc<dyn DeviceDriver>,
        scorer: Arc<dyn SimilarityScorer>,
        captures_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(RunState::new())),
            ledger: DecisionLedger::new(),
            references,
            db,
            device,
            scorer,
            captures_dir,
            worker: Arc::new(Mutex::new(None)),
            cancel_token: Arc::new(Mutex::new(None)),
            control_tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Begin a fresh run. Returns immediately with an acknowledgment
    /// snapshot; the loop iterates on its own task.
    pub async fn start(&self, config: AutomationConfig) -> Result<LoopSnapshot, AutomationError> {
        config.validate()?;

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        {
            let mut state = self.state.lock().await;
            state.begin_run(run_id.clone(), started_at)?;
        }

        self.ledger.begin_run(run_id.clone(), config.max_swipes).await;

        let run = Run {
            id: run_id.clone(),
            started_at,
            stopped_at: None,
            status: RunStatus::Running,
            similarity_threshold: config.similarity_threshold,
            delay_between_swipes_ms: config.delay_between_swipes_ms,
            max_swipes: config.max_swipes,
            swipes_performed: 0,
            likes: 0,
            passes: 0,
            errors: 0,
            matches: 0,
            fatal_error: None,
            created_at: started_at,
            updated_at: started_at,
        };

        if let Err(err) = self.db.insert_run(&run).await {
            // Roll the phase back so the caller can retry.
            self.state.lock().await.settle_idle();
            return Err(AutomationError::Other(err));
        }

        let cancel_token = CancellationToken::new();
        let (control_tx, control_rx) = watch::channel(LoopSignal::Run);

        let context = LoopContext {
            state: Arc::clone(&self.state),
            ledger: self.ledger.clone(),
            references: self.references.clone(),
            db: self.db.clone(),
            device: Arc::clone(&self.device),
            scorer: Arc::clone(&self.scorer),
            config,
            run_id: run_id.clone(),
            captures_dir: self.captures_dir.clone(),
        };

        let handle = tokio::spawn(swipe_loop(context, cancel_token.clone(), control_rx));

        *self.worker.lock().await = Some(handle);
        *self.cancel_token.lock().await = Some(cancel_token);
        *self.control_tx.lock().await = Some(control_tx);

        info!("automation run {run_id} started");
        Ok(self.snapshot().await)
    }

    /// Suspend iterating after the in-flight iteration finishes. A second
    /// pause is a no-op; pausing an idle loop is a caller error.
    pub async fn pause(&self) -> Result<LoopSnapshot, AutomationError> {
        let changed = {
            let mut state = self.state.lock().await;
            state.request_pause()?
        };

        if changed {
            self.signal(LoopSignal::Pause).await;
            info!("automation loop paused");
        }

        Ok(self.snapshot().await)
    }

    pub async fn resume(&self) -> Result<LoopSnapshot, AutomationError> {
        let changed = {
            let mut state = self.state.lock().await;
            state.request_resume()?
        };

        if changed {
            self.signal(LoopSignal::Run).await;
            info!("automation loop resumed");
        }

        Ok(self.snapshot().await)
    }

    /// Stop the run, letting any in-flight iteration finish, and wait for
    /// the worker to wind down. Stopping an idle loop is a no-op that still
    /// returns current stats.
    pub async fn stop(&self) -> Result<LoopSnapshot, AutomationError> {
        let should_cancel = {
            let mut state = self.state.lock().await;
            state.request_stop()
        };

        if should_cancel {
            if let Some(token) = self.cancel_token.lock().await.take() {
                token.cancel();
            }
        }

        // Join the worker even on a no-op stop; a completed run leaves a
        // finished handle behind.
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!("swipe loop task failed to join: {err}");
            }
        }
        *self.control_tx.lock().await = None;
        *self.cancel_token.lock().await = None;

        {
            // The worker settles the state itself; this only covers a
            // worker that died without finalizing.
            let mut state = self.state.lock().await;
            if !state.is_terminal() {
                state.mark_stopped(Utc::now(), Some("loop worker terminated abnormally".into()));
            }
            state.settle_idle();
        }

        info!("automation loop stopped");
        Ok(self.snapshot().await)
    }

    pub async fn snapshot(&self) -> LoopSnapshot {
        let state = self.state.lock().await.clone();
        let summary = self.ledger.summary().await;

        LoopSnapshot {
            phase: state.phase,
            run_id: state.run_id,
            started_at: state.started_at,
            stopped_at: state.stopped_at,
            last_error: state.last_error,
            summary,
        }
    }

    pub async fn recent_decisions(&self, n: usize) -> Vec<crate::models::Decision> {
        self.ledger.recent(n).await
    }

    async fn signal(&self, signal: LoopSignal) {
        if let Some(tx) = self.control_tx.lock().await.as_ref() {
            let _ = tx.send(signal);
        }
    }
}
