//! Trajectory lifecycle: legal transitions plus phase-named hook attachment

pub mod hooks;
pub mod state;

pub use hooks::{PhaseHook, Trajectory};
pub use state::{TrajectoryState, TransitionTracker};
