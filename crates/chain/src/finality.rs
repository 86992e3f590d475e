//! The derived finality view over the commitment ledger.

use crate::{ChainError, ChallengeWindow, StateCommitmentChain};
use balin_primitives::{ActiveDisputes, CommitmentStatus, SequenceNumber, Timestamp};

/// The [FinalityTracker] struct is the read surface that combines the ledger's stored status
/// with the challenge-window predicate. A [CommitmentStatus::Submitted] commitment whose window
/// has closed with no open dispute reports as [CommitmentStatus::Finalized] here even before the
/// ledger records the explicit mark; the ledger mark remains the single authoritative write
/// path that fund release is gated on.
#[derive(Debug, Clone, Copy)]
pub struct FinalityTracker<'a, A> {
    chain: &'a StateCommitmentChain,
    active: &'a A,
}

impl<'a, A: ActiveDisputes> FinalityTracker<'a, A> {
    /// Creates a view over `chain` that consults `active` for unresolved disputes.
    pub fn new(chain: &'a StateCommitmentChain, active: &'a A) -> Self {
        Self { chain, active }
    }

    /// Returns the commitment's logical status at `now`.
    pub fn status_of(
        &self,
        sequence: SequenceNumber,
        now: Timestamp,
    ) -> Result<CommitmentStatus, ChainError> {
        let commitment = self
            .chain
            .get(sequence)
            .ok_or(ChainError::UnknownCommitment(sequence))?;
        let window = ChallengeWindow::new(self.chain.config().challenge_window);
        if window.is_finalizable(commitment, now, self.active) {
            return Ok(CommitmentStatus::Finalized);
        }
        Ok(commitment.status)
    }

    /// Returns `true` if the commitment reports [CommitmentStatus::Finalized] at `now`.
    pub fn is_final(&self, sequence: SequenceNumber, now: Timestamp) -> bool {
        matches!(
            self.status_of(sequence, now),
            Ok(CommitmentStatus::Finalized)
        )
    }

    /// Returns the highest sequence number that reports [CommitmentStatus::Finalized] at `now`.
    pub fn latest_finalized(&self, now: Timestamp) -> Option<SequenceNumber> {
        (0..self.chain.len() as u64)
            .rev()
            .find(|sequence| self.is_final(*sequence, now))
    }
}
