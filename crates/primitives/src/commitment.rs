//! Types describing state commitments and their lifecycle on the settlement chain.

use crate::Claim;
use alloy_primitives::B256;
use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// The [SequenceNumber] type is an alias to [u64], identifying a commitment's position in the
/// settlement chain. Sequence numbers are dense: commitment `n + 1` extends commitment `n`.
pub type SequenceNumber = u64;

/// The [Timestamp] type is an alias to [u64], carrying settlement-chain time in seconds.
pub type Timestamp = u64;

/// The [CommitmentStatus] enum tracks a commitment through its lifecycle on the settlement chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentStatus {
    /// The commitment has been published and its challenge window is open (or has elapsed without
    /// finalization yet being recorded).
    Submitted = 0,
    /// An active dispute game has been opened against the commitment.
    Challenged = 1,
    /// The commitment was refuted in a dispute, or descends from one that was. Terminal.
    Invalid = 2,
    /// The commitment survived its full challenge window with no open dispute. Terminal for
    /// ordinary operation; only descendant invalidation can override it.
    Finalized = 3,
}

impl CommitmentStatus {
    /// Returns `true` if the status admits no further ordinary transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, CommitmentStatus::Invalid | CommitmentStatus::Finalized)
    }
}

impl TryFrom<u8> for CommitmentStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CommitmentStatus::Submitted),
            1 => Ok(CommitmentStatus::Challenged),
            2 => Ok(CommitmentStatus::Invalid),
            3 => Ok(CommitmentStatus::Finalized),
            _ => bail!("Invalid commitment status"),
        }
    }
}

/// The [CommitmentHeader] struct is the sequencer's input to the settlement chain: everything a
/// commitment asserts about one rollup block, before the chain stamps it with a publication time
/// and a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentHeader {
    /// The position this commitment claims in the chain. Publication rejects anything other than
    /// the current head's sequence number plus one.
    pub sequence_number: SequenceNumber,
    /// The hash of the rollup block this commitment describes.
    pub block_hash: B256,
    /// The hash of the parent rollup block. Must match the head commitment's `block_hash`.
    pub parent_block_hash: B256,
    /// The claimed post-state root after executing every transaction in the block.
    pub state_root: Claim,
    /// The root of the Merkle tree over the block's transactions.
    pub transactions_root: B256,
    /// The number of transactions in the block. Bounds the bisection interval of any dispute.
    pub transaction_count: u64,
}

/// The [Commitment] struct is a [CommitmentHeader] as recorded by the settlement chain, stamped
/// with its publication time and current [CommitmentStatus].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// The header as published by the sequencer.
    pub header: CommitmentHeader,
    /// The settlement-chain time at which the commitment was published. Anchors the challenge
    /// window.
    pub published_at: Timestamp,
    /// The commitment's current lifecycle status.
    pub status: CommitmentStatus,
}

impl Commitment {
    /// Creates a new [Commitment] in the [CommitmentStatus::Submitted] state.
    pub const fn new(header: CommitmentHeader, published_at: Timestamp) -> Self {
        Self {
            header,
            published_at,
            status: CommitmentStatus::Submitted,
        }
    }

    /// Returns the commitment's position in the settlement chain.
    pub const fn sequence_number(&self) -> SequenceNumber {
        self.header.sequence_number
    }

    /// Returns the claimed post-state root.
    pub const fn state_root(&self) -> Claim {
        self.header.state_root
    }
}

/// The [ChainEvent] enum describes a single append-only entry in the settlement chain's event
/// log. Consumers replaying the log in order reconstruct every status the chain has ever held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
    /// A commitment was appended to the chain.
    Published(SequenceNumber),
    /// A dispute game was opened against the commitment.
    Challenged(SequenceNumber),
    /// The commitment was marked invalid, directly or as a descendant of a refuted commitment.
    Invalidated(SequenceNumber),
    /// A dispute against the commitment was resolved in the defender's favor and the commitment
    /// returned to [CommitmentStatus::Submitted].
    Restored(SequenceNumber),
    /// The commitment was finalized after its challenge window elapsed undisputed.
    Finalized(SequenceNumber),
}

impl ChainEvent {
    /// Returns the sequence number the event refers to.
    pub const fn sequence_number(&self) -> SequenceNumber {
        match self {
            ChainEvent::Published(seq)
            | ChainEvent::Challenged(seq)
            | ChainEvent::Invalidated(seq)
            | ChainEvent::Restored(seq)
            | ChainEvent::Finalized(seq) => *seq,
        }
    }
}
