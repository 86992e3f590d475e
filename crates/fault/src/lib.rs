#![doc = include_str!("../README.md")]

//! The bisection dispute game and its coordinator for the Balin settlement core.

mod types;
pub use self::types::{
    Declaration, DisputePhase, Effect, GameError, GameEvent, Resolution, ResolutionKind,
};

mod state;
pub use self::state::BisectionState;

mod traits;
pub use self::traits::{BatchProvider, StepOracle, TraceOracle};

mod coordinator;
pub use self::coordinator::{ActiveSet, DisputeCoordinator};

pub mod providers;
