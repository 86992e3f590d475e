//! The types module holds the events, effects, and errors of the bisection game.

use balin_chain::ChainError;
use balin_primitives::{Claim, Party, SequenceNumber, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The [DisputePhase] enum describes how far a dispute has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputePhase {
    /// The parties are still narrowing the disputed interval.
    Bisecting = 0,
    /// One transaction remains in dispute; the engine replay is pending. Only this dispute
    /// waits on it.
    AwaitingArbitration = 1,
    /// The game has ended and a winner is recorded.
    Resolved = 2,
}

/// The [Declaration] struct is one party's asserted state root at an interval midpoint. The
/// game keeps every declaration it has accepted, append-only, so a dispute's history can be
/// replayed for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// The declaring party.
    pub party: Party,
    /// The boundary index the declaration speaks for: the state after executing the first
    /// `midpoint` transactions of the block.
    pub midpoint: u64,
    /// The declared state root at that boundary.
    pub state_root: Claim,
    /// The settlement-chain time the declaration was accepted.
    pub declared_at: Timestamp,
}

/// The [GameEvent] enum is the input alphabet of the bisection state machine. Event order is
/// decided by the settlement chain, and replaying an already applied event is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// A party declares the state root at the current interval midpoint.
    Declare {
        /// The declaring party.
        party: Party,
        /// The boundary index being declared.
        midpoint: u64,
        /// The declared state root.
        state_root: Claim,
        /// The settlement-chain time of the declaration.
        now: Timestamp,
    },
    /// The settlement clock is consulted; if the party on turn has missed its round deadline,
    /// it forfeits.
    Timeout {
        /// The current settlement-chain time.
        now: Timestamp,
    },
    /// The execution engine's replay of the single disputed transaction has produced a
    /// post-state root.
    EngineResult {
        /// The replayed post-state root.
        state_root: Claim,
    },
}

/// The [Effect] enum names the outward actions a transition asks its caller to perform. The
/// state machine never touches the ledger or the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Ask the execution engine to replay one transaction of the disputed block.
    RequestReplay {
        /// The disputed commitment.
        sequence: SequenceNumber,
        /// The index of the transaction to replay.
        index: u64,
        /// The boundary state root both parties agree precedes it.
        pre_state_root: Claim,
    },
    /// Record the disputed commitment as refuted on the ledger.
    MarkInvalid {
        /// The disputed commitment.
        sequence: SequenceNumber,
    },
    /// Return the disputed commitment to its published standing on the ledger.
    RestoreSubmitted {
        /// The disputed commitment.
        sequence: SequenceNumber,
    },
    /// Pay the game's escrow, both parties' bonds, to the winner.
    AwardBond {
        /// The winning party.
        to: Party,
        /// The full escrowed amount.
        amount: u128,
    },
}

/// The [ResolutionKind] enum records how a dispute ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionKind {
    /// The engine replay matched one party's declared root.
    Arbitrated,
    /// The party on turn missed its round deadline.
    TimeoutForfeit,
    /// The engine replay matched neither declared root. The published root is refuted all the
    /// same, so the challenger prevails.
    ExecutionMismatch,
}

/// The [Resolution] struct is the terminal record of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// The winning party.
    pub winner: Party,
    /// How the win was decided.
    pub kind: ResolutionKind,
    /// The transaction index arbitration replayed, when the game got that far.
    pub step_index: Option<u64>,
    /// The post-state root the engine produced, when the game was arbitrated.
    pub engine_root: Option<Claim>,
}

/// Errors raised by the bisection game and its coordinator.
#[derive(Debug, Error)]
pub enum GameError {
    /// The commitment's challenge window has closed, or its status no longer admits a
    /// challenge.
    #[error("commitment {0} is no longer challengeable")]
    StaleChallenge(SequenceNumber),
    /// A dispute is already active for the commitment. Concurrent challenges are rejected, not
    /// queued.
    #[error("commitment {0} already has an active dispute")]
    DoubleChallenge(SequenceNumber),
    /// The challenger's claimed root is identical to the published root, asserting nothing.
    #[error("claimed state root matches the published commitment")]
    VacuousChallenge,
    /// A declaration arrived from the party not on turn.
    #[error("awaiting a declaration from {expected:?}, not {actual:?}")]
    WrongTurn {
        /// The party whose declaration is due.
        expected: Party,
        /// The party that declared.
        actual: Party,
    },
    /// A declaration names a boundary other than the current interval midpoint.
    #[error("declaration names boundary {actual}; the current midpoint is {expected}")]
    WrongMidpoint {
        /// The midpoint of the current interval.
        expected: u64,
        /// The boundary the declaration named.
        actual: u64,
    },
    /// The event does not apply to the dispute's current phase.
    #[error("dispute does not accept this event while {0:?}")]
    InvalidPhase(DisputePhase),
    /// No dispute, active or archived, exists for the commitment.
    #[error("no dispute exists for commitment {0}")]
    UnknownDispute(SequenceNumber),
    /// The ledger refused a transition the game asked for.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// A provider (engine, batch source) failed.
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}
