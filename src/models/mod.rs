pub mod decision;
pub mod run;

pub use decision::{Decision, SwipeOutcome};
pub use run::{Run, RunInfo, RunStatus};
