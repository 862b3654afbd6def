use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::DeviceDriver;

const DEFAULT_STEP_TIMEOUT_MS: u64 = 10_000;
const KEYSTROKE_GAP_MS: u64 = 100;

/// One typed step of a launch script. Steps run strictly in order; a step
/// marked `optional` logs its failure and lets the script continue, any
/// other failure aborts the script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LaunchStep {
    OpenApp {
        name: String,
        #[serde(default)]
        wait_ms: u64,
    },
    Action {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference_element: Option<String>,
        #[serde(default)]
        optional: bool,
    },
    TypeText {
        text: String,
    },
    PressKey {
        key: String,
    },
    Wait {
        ms: u64,
    },
}

impl LaunchStep {
    fn is_optional(&self) -> bool {
        matches!(self, LaunchStep::Action { optional: true, .. })
    }

    fn describe(&self) -> String {
        match self {
            LaunchStep::OpenApp { name, .. } => format!("open app '{name}'"),
            LaunchStep::Action { query, .. } => format!("action '{query}'"),
            LaunchStep::TypeText { text } => format!("type '{text}'"),
            LaunchStep::PressKey { key } => format!("press '{key}'"),
            LaunchStep::Wait { ms } => format!("wait {ms}ms"),
        }
    }
}

/// Scripted navigation that brings the target app on screen before the
/// swipe loop starts iterating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPlan {
    pub steps: Vec<LaunchStep>,
    /// Upper bound for any single step. Zero means the default.
    #[serde(default)]
    pub step_timeout_ms: u64,
}

impl LaunchPlan {
    pub fn new(steps: Vec<LaunchStep>) -> Self {
        Self {
            steps,
            step_timeout_ms: 0,
        }
    }

    fn step_timeout(&self) -> Duration {
        let ms = if self.step_timeout_ms == 0 {
            DEFAULT_STEP_TIMEOUT_MS
        } else {
            self.step_timeout_ms
        };
        Duration::from_millis(ms)
    }
}

/// Interpret a launch plan against the device. Cancellation is honored
/// between steps; an in-flight device call is allowed to finish.
pub async fn run_launch_plan(
    device: &dyn DeviceDriver,
    plan: &LaunchPlan,
    cancel: &CancellationToken,
) -> Result<()> {
    let step_timeout = plan.step_timeout();

    for (index, step) in plan.steps.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(anyhow!("launch cancelled before step {}", index + 1));
        }

        info!("launch step {}/{}: {}", index + 1, plan.steps.len(), step.describe());

        let result = timeout(step_timeout, execute_step(device, step))
            .await
            .map_err(|_| anyhow!("step timed out after {step_timeout:?}"))
            .and_then(|inner| inner);

        if let Err(err) = result {
            if step.is_optional() {
                warn!("optional launch step failed, continuing: {err:#}");
                continue;
            }
            return Err(err).with_context(|| format!("launch step {} failed", index + 1));
        }
    }

    Ok(())
}

async fn execute_step(device: &dyn DeviceDriver, step: &LaunchStep) -> Result<()> {
    match step {
        LaunchStep::OpenApp { name, wait_ms } => {
            device.open_app(name, Duration::from_millis(*wait_ms)).await
        }
        LaunchStep::Action {
            query,
            reference_element,
            ..
        } => {
            device
                .execute_action(query, reference_element.as_deref())
                .await
        }
        LaunchStep::TypeText { text } => {
            // Search fields on the mirrored device drop characters when they
            // arrive as a burst, so type one key at a time.
            for ch in text.chars() {
                device.press_key(&ch.to_string()).await?;
                tokio::time::sleep(Duration::from_millis(KEYSTROKE_GAP_MS)).await;
            }
            Ok(())
        }
        LaunchStep::PressKey { key } => device.press_key(key).await,
        LaunchStep::Wait { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            Ok(())
        }
    }
}
