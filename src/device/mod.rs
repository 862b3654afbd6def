pub mod script;

pub use script::{run_launch_plan, LaunchPlan, LaunchStep};

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
        }
    }
}

/// Port onto the device-mirroring/automation driver. The driver itself is an
/// external collaborator; the loop only assumes these calls can each fail
/// independently and may take a while.
///
/// Implementations must be safe to share across tasks; the controller holds
/// one behind an `Arc`.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Open (or attach to) an application and give it `wait` to settle.
    async fn open_app(&self, name: &str, wait: Duration) -> Result<()>;

    /// Capture the mirrored screen. Returns encoded image bytes (PNG/JPEG).
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Perform a directional swipe gesture on the current screen.
    async fn swipe(&self, direction: SwipeDirection) -> Result<()>;

    /// Execute a natural-language UI action, optionally anchored to a saved
    /// reference element.
    async fn execute_action(&self, query: &str, reference_element: Option<&str>) -> Result<()>;

    async fn press_key(&self, key: &str) -> Result<()>;

    /// Check whether an element matching `description` becomes visible
    /// within `timeout`.
    async fn check_visible(&self, description: &str, timeout: Duration) -> Result<bool>;
}
