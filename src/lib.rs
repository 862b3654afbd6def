pub mod config;
pub mod db;
pub mod device;
pub mod error;
pub mod ledger;
pub mod matching;
pub mod models;
pub mod references;
pub mod service;
pub mod settings;
pub mod swiper;

pub use config::{AutomationConfig, SimilarityMode};
pub use device::{DeviceDriver, LaunchPlan, LaunchStep, SwipeDirection};
pub use error::AutomationError;
pub use ledger::{DecisionLedger, LedgerSummary};
pub use matching::{PhashScorer, SimilarityScorer};
pub use models::{Decision, Run, RunInfo, RunStatus, SwipeOutcome};
pub use references::{ReferenceImageInfo, ReferenceStore};
pub use service::{LoopStats, SwipeService};
pub use swiper::{LoopPhase, LoopSnapshot, SwipeController};

/// Initialize logging for shells that don't bring their own subscriber
/// (reads RUST_LOG env var). Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
