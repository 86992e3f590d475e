#![doc = include_str!("../README.md")]

//! Primitives for Balin, a library for building the settlement and dispute
//! core of an optimistic rollup.

mod dispute_game;
pub use dispute_game::{Claim, GameStatus, Party};

mod commitment;
pub use commitment::{
    ChainEvent, Commitment, CommitmentHeader, CommitmentStatus, SequenceNumber, Timestamp,
};

mod config;
pub use config::{ProtocolConfig, DEFAULT_BOND, DEFAULT_CHALLENGE_WINDOW, DEFAULT_ROUND_TIMEOUT};

mod traits;
pub use traits::{ActiveDisputes, DisputeGame, NoDisputes};
