//! The traits module contains traits used throughout the library.

use crate::{dispute_game::Claim, GameStatus, SequenceNumber};

/// The [DisputeGame] trait is the highest level trait in the library, describing the observable
/// state of a dispute game played over one published state commitment.
pub trait DisputeGame {
    /// Returns the sequence number of the commitment under dispute.
    fn sequence_number(&self) -> SequenceNumber;

    /// Returns the state root the disputed commitment published.
    fn root_claim(&self) -> Claim;

    /// Returns the current status of the game.
    fn status(&self) -> GameStatus;

    /// Returns `true` if the game has resolved in either party's favor.
    fn is_resolved(&self) -> bool {
        self.status() != GameStatus::InProgress
    }
}

/// The [ActiveDisputes] trait is a read-only view over a dispute registry, answering whether a
/// commitment currently has an open game against it. Finalization consults it so that a
/// commitment whose window has elapsed mid-dispute still waits for the game's verdict.
pub trait ActiveDisputes {
    /// Returns `true` if an unresolved dispute game exists for `sequence_number`.
    fn has_active_dispute(&self, sequence_number: SequenceNumber) -> bool;
}

/// The [NoDisputes] struct implements [ActiveDisputes] for contexts that carry no dispute
/// registry, such as chain-only tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDisputes;

impl ActiveDisputes for NoDisputes {
    fn has_active_dispute(&self, _: SequenceNumber) -> bool {
        false
    }
}
