use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use image::DynamicImage;
use log::{error, info, warn};
use rand::Rng;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AutomationConfig;
use crate::db::Database;
use crate::device::{run_launch_plan, DeviceDriver, SwipeDirection};
use crate::error::AutomationError;
use crate::ledger::DecisionLedger;
use crate::matching::{decide, isolate_profile_region, MatchDecision, SimilarityScorer};
use crate::models::{Decision, RunStatus, SwipeOutcome};
use crate::references::ReferenceStore;

use super::state::RunState;

const MAX_CONSECUTIVE_CAPTURE_FAILURES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_CAP_MS: u64 = 8_000;
const BACKOFF_JITTER_MS: u64 = 250;

const MATCH_POPUP_DESCRIPTION: &str = "It's a Match popup or Keep Swiping button";
const MATCH_POPUP_TIMEOUT: Duration = Duration::from_secs(2);
const MATCH_DISMISS_QUERY: &str = "Click on the Keep Swiping button";

/// Pause/resume signal fed to the loop. Stop goes through the cancellation
/// token instead, so a paused loop still sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopSignal {
    Run,
    Pause,
}

pub(crate) struct LoopContext {
    pub state: Arc<Mutex<RunState>>,
    pub ledger: DecisionLedger,
    pub references: ReferenceStore,
    pub db: Database,
    pub device: Arc<dyn DeviceDriver>,
    pub scorer: Arc<dyn SimilarityScorer>,
    pub config: AutomationConfig,
    pub run_id: String,
    pub captures_dir: Option<PathBuf>,
}

enum RunEnd {
    /// Swipe budget exhausted.
    Completed,
    /// Cancelled by the caller.
    Cancelled,
    /// Escalated failure; the message lands in the run's `fatal_error`.
    Fatal(String),
}

enum IterationOutcome {
    Swiped,
    /// Recoverable failure; wait `backoff` before the next attempt.
    SoftFailure { backoff: Duration },
    /// Stop was requested after the decision was recorded but before the
    /// gesture; the budget was not consumed.
    CancelledBeforeGesture,
    Fatal(String),
}

pub(crate) async fn swipe_loop(
    ctx: LoopContext,
    cancel: CancellationToken,
    mut control: watch::Receiver<LoopSignal>,
) {
    let end = drive(&ctx, &cancel, &mut control).await;
    finalize(&ctx, end).await;
}

async fn drive(
    ctx: &LoopContext,
    cancel: &CancellationToken,
    control: &mut watch::Receiver<LoopSignal>,
) -> RunEnd {
    if let Some(plan) = &ctx.config.launch {
        info!("run {}: executing launch plan ({} steps)", ctx.run_id, plan.steps.len());
        if let Err(err) = run_launch_plan(ctx.device.as_ref(), plan, cancel).await {
            if cancel.is_cancelled() {
                return RunEnd::Cancelled;
            }
            return RunEnd::Fatal(format!("launch plan failed: {err:#}"));
        }
    }

    let mut capture_failures = 0u32;

    loop {
        if !wait_while_paused(control, cancel).await {
            return RunEnd::Cancelled;
        }

        let summary = ctx.ledger.summary().await;
        if summary.swipes_performed >= ctx.config.max_swipes {
            info!(
                "run {}: swipe budget exhausted ({}/{})",
                ctx.run_id, summary.swipes_performed, ctx.config.max_swipes
            );
            return RunEnd::Completed;
        }

        let wait = match perform_iteration(ctx, cancel, &mut capture_failures).await {
            IterationOutcome::Swiped => {
                // Don't sit out the delay when that swipe was the last one.
                let summary = ctx.ledger.summary().await;
                if summary.swipes_performed >= ctx.config.max_swipes {
                    continue;
                }
                Duration::from_millis(ctx.config.delay_between_swipes_ms)
            }
            IterationOutcome::SoftFailure { backoff } => backoff,
            IterationOutcome::CancelledBeforeGesture => return RunEnd::Cancelled,
            IterationOutcome::Fatal(message) => return RunEnd::Fatal(message),
        };

        if !interruptible_sleep(wait, cancel, control).await {
            return RunEnd::Cancelled;
        }
    }
}

/// One capture -> score -> decide -> act cycle.
async fn perform_iteration(
    ctx: &LoopContext,
    cancel: &CancellationToken,
    capture_failures: &mut u32,
) -> IterationOutcome {
    let timestamp = Utc::now();
    let decision_id = Uuid::new_v4().to_string();

    // Capture. Bytes the decoder rejects are just as much a capture failure
    // as a driver error: the device handed back a frame we cannot use.
    let frame = match capture_frame(ctx).await {
        Ok(frame) => {
            *capture_failures = 0;
            frame
        }
        Err(err) => {
            *capture_failures += 1;
            let message = format!("screenshot capture failed: {err:#}");
            warn!(
                "run {}: {message} ({}/{MAX_CONSECUTIVE_CAPTURE_FAILURES} consecutive)",
                ctx.run_id, capture_failures
            );

            record_errored_decision(ctx, decision_id, timestamp, message).await;

            if *capture_failures >= MAX_CONSECUTIVE_CAPTURE_FAILURES {
                let fatal = AutomationError::DeviceUnavailable {
                    failures: *capture_failures,
                };
                return IterationOutcome::Fatal(fatal.to_string());
            }
            return IterationOutcome::SoftFailure {
                backoff: backoff_delay(*capture_failures),
            };
        }
    };

    // Score + decide against the reference snapshot taken this iteration.
    let match_decision = match run_engine(ctx, Arc::clone(&frame.processed)).await {
        Ok(decision) => decision,
        Err(err) => {
            let message = err.to_string();
            warn!("run {}: iteration not scored: {message}", ctx.run_id);
            record_errored_decision(ctx, decision_id, timestamp, message).await;
            return IterationOutcome::SoftFailure {
                backoff: backoff_delay(1),
            };
        }
    };

    let screenshot_path = save_capture(ctx, &decision_id, &frame.raw).await;

    let mut decision = Decision::scored(
        decision_id.clone(),
        ctx.run_id.clone(),
        timestamp,
        match_decision.best_reference_id.clone(),
        match_decision.similarity,
        match_decision.outcome,
    );
    decision.screenshot_path = screenshot_path;

    // The append must land before anything else happens so the ledger sees
    // decisions in true temporal order even if the gesture below fails.
    ctx.ledger.append(decision.clone()).await;
    if let Err(err) = ctx.db.insert_decision(&decision).await {
        error!("run {}: failed to persist decision: {err:#}", ctx.run_id);
    }

    // Honor a stop that arrived while we were scoring: the decision stays
    // recorded, but no gesture is issued and no budget is consumed.
    if cancel.is_cancelled() {
        return IterationOutcome::CancelledBeforeGesture;
    }

    let direction = match match_decision.outcome {
        SwipeOutcome::Like => SwipeDirection::Right,
        SwipeOutcome::Pass => SwipeDirection::Left,
    };

    let attempted = match ctx.device.swipe(direction).await {
        Ok(()) => true,
        Err(err) => {
            warn!(
                "run {}: {} swipe failed (profile still consumed): {err:#}",
                ctx.run_id,
                direction.as_str()
            );
            false
        }
    };

    ctx.ledger.mark_swipe_attempted(&decision_id, attempted).await;
    if let Err(err) = ctx.db.set_decision_swipe_attempted(&decision_id, attempted).await {
        error!("run {}: failed to persist swipe flag: {err:#}", ctx.run_id);
    }

    // The decision was computed, so the profile is consumed and the budget
    // is charged whether or not the gesture landed.
    ctx.ledger.record_swipe().await;

    if match_decision.outcome == SwipeOutcome::Like && ctx.config.detect_matches {
        check_for_match(ctx).await;
    }

    let summary = ctx.ledger.summary().await;
    info!(
        "run {}: {} (similarity {:.3} vs {} -> {}), {}/{} swipes",
        ctx.run_id,
        match_decision.outcome.as_str(),
        match_decision.similarity,
        match_decision.best_reference_id,
        direction.as_str(),
        summary.swipes_performed,
        ctx.config.max_swipes
    );
    if let Err(err) = ctx.db.update_run_progress(&ctx.run_id, &summary, Utc::now()).await {
        error!("run {}: failed to persist run progress: {err:#}", ctx.run_id);
    }

    IterationOutcome::Swiped
}

struct CapturedFrame {
    raw: Arc<Vec<u8>>,
    processed: Arc<DynamicImage>,
}

async fn capture_frame(ctx: &LoopContext) -> Result<CapturedFrame> {
    let bytes = ctx
        .device
        .screenshot()
        .await
        .context("device screenshot call failed")?;

    let raw = Arc::new(bytes);
    let decode_input = Arc::clone(&raw);
    let processed = tokio::task::spawn_blocking(move || -> Result<DynamicImage> {
        let frame =
            image::load_from_memory(&decode_input).context("could not decode screenshot")?;
        Ok(isolate_profile_region(&frame))
    })
    .await
    .context("decode worker join failed")??;

    Ok(CapturedFrame {
        raw,
        processed: Arc::new(processed),
    })
}

async fn run_engine(
    ctx: &LoopContext,
    candidate: Arc<DynamicImage>,
) -> Result<MatchDecision, AutomationError> {
    let references = ctx.references.snapshot();
    let scorer = Arc::clone(&ctx.scorer);
    let threshold = ctx.config.similarity_threshold;

    tokio::task::spawn_blocking(move || {
        decide(&candidate, &references, threshold, scorer.as_ref())
    })
    .await
    .map_err(|err| AutomationError::Other(anyhow!("scoring worker join failed: {err}")))?
}

async fn record_errored_decision(
    ctx: &LoopContext,
    decision_id: String,
    timestamp: chrono::DateTime<Utc>,
    message: String,
) {
    let decision = Decision::errored(decision_id, ctx.run_id.clone(), timestamp, message);
    ctx.ledger.append(decision.clone()).await;
    if let Err(err) = ctx.db.insert_decision(&decision).await {
        error!("run {}: failed to persist errored decision: {err:#}", ctx.run_id);
    }

    let summary = ctx.ledger.summary().await;
    if let Err(err) = ctx.db.update_run_progress(&ctx.run_id, &summary, Utc::now()).await {
        error!("run {}: failed to persist run progress: {err:#}", ctx.run_id);
    }
}

/// Best-effort save of the raw capture for the UI's decision thumbnails.
async fn save_capture(ctx: &LoopContext, decision_id: &str, raw: &Arc<Vec<u8>>) -> Option<String> {
    let dir = ctx.captures_dir.as_ref()?;
    let path = dir.join(format!("{decision_id}.png"));

    match tokio::fs::write(&path, raw.as_slice()).await {
        Ok(()) => Some(path.to_string_lossy().into_owned()),
        Err(err) => {
            warn!("failed to save capture {}: {err}", path.display());
            None
        }
    }
}

/// After a Like, look for the match popup and dismiss it so the card stack
/// keeps moving. Every step here is best-effort; a missed popup only costs
/// a counter increment.
async fn check_for_match(ctx: &LoopContext) {
    match ctx
        .device
        .check_visible(MATCH_POPUP_DESCRIPTION, MATCH_POPUP_TIMEOUT)
        .await
    {
        Ok(true) => {
            info!("run {}: match detected", ctx.run_id);
            ctx.ledger.record_match().await;
            if let Err(err) = ctx.device.execute_action(MATCH_DISMISS_QUERY, None).await {
                warn!("run {}: could not dismiss match popup: {err:#}", ctx.run_id);
            }
        }
        Ok(false) => {}
        Err(err) => {
            warn!("run {}: match check failed: {err:#}", ctx.run_id);
        }
    }
}

/// Block while the control signal says Pause. Returns false once the run is
/// cancelled (a paused loop must still stop promptly).
async fn wait_while_paused(
    control: &mut watch::Receiver<LoopSignal>,
    cancel: &CancellationToken,
) -> bool {
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        if *control.borrow_and_update() == LoopSignal::Run {
            return true;
        }

        tokio::select! {
            _ = cancel.cancelled() => return false,
            changed = control.changed() => {
                if changed.is_err() {
                    // Controller dropped the sender; treat as stop.
                    return false;
                }
            }
        }
    }
}

/// Sleep that yields immediately to stop, and early to a pause signal (the
/// pause gate at the top of the loop then takes over). Returns false when
/// cancelled.
async fn interruptible_sleep(
    duration: Duration,
    cancel: &CancellationToken,
    control: &mut watch::Receiver<LoopSignal>,
) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
        changed = control.changed() => changed.is_ok(),
    }
}

fn backoff_delay(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(3);
    let base = BACKOFF_BASE_MS.saturating_mul(1u64 << exponent).min(BACKOFF_CAP_MS);
    let jitter = rand::thread_rng().gen_range(0..=BACKOFF_JITTER_MS);
    Duration::from_millis(base + jitter)
}

async fn finalize(ctx: &LoopContext, end: RunEnd) {
    let stopped_at = Utc::now();
    let (status, fatal_error) = match end {
        RunEnd::Completed => (RunStatus::Completed, None),
        RunEnd::Cancelled => (RunStatus::Stopped, None),
        RunEnd::Fatal(message) => (RunStatus::Failed, Some(message)),
    };

    {
        let mut state = ctx.state.lock().await;
        state.mark_stopped(stopped_at, fatal_error.clone());
    }

    let summary = ctx.ledger.summary().await;
    if let Err(err) = ctx.db.update_run_progress(&ctx.run_id, &summary, stopped_at).await {
        error!("run {}: failed to persist final progress: {err:#}", ctx.run_id);
    }
    if let Err(err) = ctx
        .db
        .mark_run_status(&ctx.run_id, status.clone(), fatal_error.clone(), Some(stopped_at), stopped_at)
        .await
    {
        error!("run {}: failed to persist final status: {err:#}", ctx.run_id);
    }

    info!(
        "run {} finished ({}): {} likes, {} passes, {} errors, {} swipes{}",
        ctx.run_id,
        status.as_str(),
        summary.likes,
        summary.passes,
        summary.errors,
        summary.swipes_performed,
        fatal_error
            .map(|message| format!(" - {message}"))
            .unwrap_or_default()
    );

    // Stopped -> Idle so the controller is startable again without an
    // explicit stop() after a completed or failed run.
    let mut state = ctx.state.lock().await;
    state.settle_idle();
}
