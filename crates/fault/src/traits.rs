//! This module holds the trait seams between the dispute game and its external collaborators.

use anyhow::Result;
use balin_merkle::MerkleProof;
use balin_primitives::{Claim, SequenceNumber};

/// A [StepOracle] is the gateway to the external execution engine: given an agreed pre-state
/// and one transaction, it deterministically produces the post-state root. It is consulted
/// exactly once per dispute, for the single transaction bisection has narrowed to.
#[async_trait::async_trait]
pub trait StepOracle {
    /// Replays one transaction against a pre-state.
    ///
    /// ### Takes
    /// - `pre_state_root`: The state root the transaction executes against.
    /// - `transaction`: The raw transaction bytes.
    ///
    /// ### Returns
    /// - `Claim` or [Err]: The post-state root after executing the transaction.
    async fn replay_one(&self, pre_state_root: Claim, transaction: &[u8]) -> Result<Claim>;
}

/// A [BatchProvider] serves the transactions of committed blocks, each with an inclusion proof
/// against the block's transactions root so arbitration replays exactly what was committed to.
#[async_trait::async_trait]
pub trait BatchProvider {
    /// Fetches one transaction of a committed block.
    ///
    /// ### Takes
    /// - `sequence`: The commitment whose block holds the transaction.
    /// - `index`: The transaction's index within the block.
    ///
    /// ### Returns
    /// - [MerkleProof] or [Err]: The raw transaction as the proof's leaf, provable against the
    ///   commitment's transactions root.
    async fn transaction(&self, sequence: SequenceNumber, index: u64) -> Result<MerkleProof>;
}

/// A [TraceOracle] is one party's view of a block's execution: the state root at every boundary
/// index. An honest actor declares whatever its oracle returns at the midpoint the game asks
/// about.
#[async_trait::async_trait]
pub trait TraceOracle {
    /// Returns the party's state root at a boundary index of a committed block: the state after
    /// executing the block's first `boundary` transactions.
    async fn state_root_at(&self, sequence: SequenceNumber, boundary: u64) -> Result<Claim>;
}
