pub mod controller;
mod loop_worker;
pub mod state;

pub use controller::{LoopSnapshot, SwipeController};
pub use state::{LoopPhase, RunState};
