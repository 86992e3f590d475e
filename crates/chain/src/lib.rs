#![doc = include_str!("../README.md")]

//! The settlement-side ledger for Balin: commitment storage, challenge
//! windows, and derived finality.

mod chain;
pub use chain::{ChainError, StateCommitmentChain};

mod window;
pub use window::ChallengeWindow;

mod finality;
pub use finality::FinalityTracker;
