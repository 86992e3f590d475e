//! Challenge-window predicates.
//!
//! Time enters through an explicit `now` parameter carrying settlement-chain-confirmed
//! seconds. Nothing here reads a wall clock, so every predicate is deterministic under
//! synthetic timestamps.

use balin_primitives::{ActiveDisputes, Commitment, CommitmentStatus, Timestamp};

/// The [ChallengeWindow] struct evaluates a commitment's challenge period: a fixed number of
/// seconds after publication during which the commitment may be disputed, after which it may
/// finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeWindow {
    duration: Timestamp,
}

impl ChallengeWindow {
    /// Creates a window of `duration` seconds.
    pub const fn new(duration: Timestamp) -> Self {
        Self { duration }
    }

    /// Returns the window's duration in seconds.
    pub const fn duration(&self) -> Timestamp {
        self.duration
    }

    /// Returns the settlement-chain time at which the commitment's window closes.
    pub const fn closes_at(&self, commitment: &Commitment) -> Timestamp {
        commitment.published_at.saturating_add(self.duration)
    }

    /// Returns `true` if a dispute may be opened against the commitment at `now`: it is
    /// [CommitmentStatus::Submitted] and its window has not yet closed.
    pub fn is_challengeable(&self, commitment: &Commitment, now: Timestamp) -> bool {
        commitment.status == CommitmentStatus::Submitted && now < self.closes_at(commitment)
    }

    /// Returns `true` if the commitment may finalize at `now`: it is
    /// [CommitmentStatus::Submitted], its window has closed, and no unresolved dispute
    /// references it.
    pub fn is_finalizable(
        &self,
        commitment: &Commitment,
        now: Timestamp,
        active: &impl ActiveDisputes,
    ) -> bool {
        commitment.status == CommitmentStatus::Submitted
            && now >= self.closes_at(commitment)
            && !active.has_active_dispute(commitment.sequence_number())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::B256;
    use balin_primitives::{CommitmentHeader, NoDisputes, SequenceNumber};

    fn commitment_at(published_at: Timestamp) -> Commitment {
        let header = CommitmentHeader {
            sequence_number: 0,
            block_hash: B256::with_last_byte(1),
            parent_block_hash: B256::ZERO,
            state_root: B256::with_last_byte(0x80),
            transactions_root: B256::with_last_byte(0xC0),
            transaction_count: 4,
        };
        Commitment::new(header, published_at)
    }

    #[test]
    fn window_boundary_is_half_open() {
        let window = ChallengeWindow::new(100);
        let commitment = commitment_at(50);

        assert!(window.is_challengeable(&commitment, 50));
        assert!(window.is_challengeable(&commitment, 149));
        assert!(!window.is_challengeable(&commitment, 150));

        assert!(!window.is_finalizable(&commitment, 149, &NoDisputes));
        assert!(window.is_finalizable(&commitment, 150, &NoDisputes));
    }

    #[test]
    fn non_submitted_commitments_are_neither() {
        let window = ChallengeWindow::new(100);
        let mut commitment = commitment_at(0);
        commitment.status = CommitmentStatus::Challenged;

        assert!(!window.is_challengeable(&commitment, 10));
        assert!(!window.is_finalizable(&commitment, 500, &NoDisputes));
    }

    #[test]
    fn open_disputes_block_finalization() {
        struct Disputed;
        impl ActiveDisputes for Disputed {
            fn has_active_dispute(&self, _: SequenceNumber) -> bool {
                true
            }
        }

        let window = ChallengeWindow::new(100);
        let commitment = commitment_at(0);
        assert!(!window.is_finalizable(&commitment, 200, &Disputed));
    }

    #[test]
    fn duration_overflow_saturates() {
        let window = ChallengeWindow::new(Timestamp::MAX);
        let commitment = commitment_at(10);
        assert_eq!(window.closes_at(&commitment), Timestamp::MAX);
        assert!(window.is_challengeable(&commitment, Timestamp::MAX - 1));
    }
}
