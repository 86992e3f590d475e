//! The append-only state commitment ledger.

use crate::ChallengeWindow;
use alloy_primitives::B256;
use balin_primitives::{
    ActiveDisputes, ChainEvent, Claim, Commitment, CommitmentHeader, CommitmentStatus,
    ProtocolConfig, SequenceNumber, Timestamp,
};
use thiserror::Error;

/// Errors raised by [StateCommitmentChain] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The published header does not link to the current chain head. Fatal to publication; the
    /// chain halts until an operator resumes it.
    #[error("commitment {sequence} does not link to the chain head: expected parent {expected}, got {actual}")]
    Linkage {
        /// The sequence number of the rejected header.
        sequence: SequenceNumber,
        /// The block hash of the current head.
        expected: B256,
        /// The parent block hash the header carried.
        actual: B256,
    },
    /// Publication is halted after a linkage fault.
    #[error("publication is halted after a linkage fault")]
    Halted,
    /// The published header skips ahead of the next expected sequence number.
    #[error("commitment {sequence} is not contiguous with the chain; expected {expected}")]
    NonContiguous {
        /// The sequence number of the rejected header.
        sequence: SequenceNumber,
        /// The sequence number the chain expects next.
        expected: SequenceNumber,
    },
    /// The published header covers a block with no transactions, which nothing could dispute.
    #[error("commitment {0} covers an empty block")]
    EmptyBlock(SequenceNumber),
    /// A sequence number was re-published with a header that differs from the stored one.
    #[error("commitment {0} was re-published with conflicting content")]
    ConflictingPublish(SequenceNumber),
    /// The sequence number has never been published.
    #[error("unknown commitment {0}")]
    UnknownCommitment(SequenceNumber),
    /// The requested status transition is not part of the commitment lifecycle.
    #[error("commitment {sequence} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// The sequence number of the commitment.
        sequence: SequenceNumber,
        /// The commitment's current status.
        from: CommitmentStatus,
        /// The requested status.
        to: CommitmentStatus,
    },
    /// Finalization was requested before the commitment's challenge window elapsed.
    #[error("challenge window for commitment {sequence} is open until {closes_at}")]
    WindowStillOpen {
        /// The sequence number of the commitment.
        sequence: SequenceNumber,
        /// The settlement-chain time at which the window closes.
        closes_at: Timestamp,
    },
    /// Finalization was requested while a dispute against the commitment is unresolved.
    #[error("commitment {0} has an unresolved dispute")]
    ActiveDispute(SequenceNumber),
}

/// The [StateCommitmentChain] struct is the append-only ledger of published commitments. Entries
/// live in a dense arena indexed by sequence number and are never removed; refuted commitments
/// stay recorded as [CommitmentStatus::Invalid]. Every status change appends a [ChainEvent] to
/// the chain's event log.
#[derive(Debug, Clone)]
pub struct StateCommitmentChain {
    config: ProtocolConfig,
    genesis_block_hash: B256,
    genesis_state_root: Claim,
    commitments: Vec<Commitment>,
    events: Vec<ChainEvent>,
    halted: bool,
}

impl StateCommitmentChain {
    /// Creates an empty chain anchored at the genesis block. The first published commitment must
    /// name `genesis_block_hash` as its parent; `genesis_state_root` is the pre-state of any
    /// dispute over commitment zero.
    pub fn new(
        config: ProtocolConfig,
        genesis_block_hash: B256,
        genesis_state_root: Claim,
    ) -> Self {
        Self {
            config,
            genesis_block_hash,
            genesis_state_root,
            commitments: Vec::new(),
            events: Vec::new(),
            halted: false,
        }
    }

    /// Appends a commitment to the chain with status [CommitmentStatus::Submitted] and
    /// `published_at = now`. The header must carry the next sequence number and link to the
    /// current head by parent block hash. A linkage mismatch halts all further publication until
    /// [StateCommitmentChain::resume] is called. Re-publishing an existing sequence number with
    /// an identical header is a no-op, so a replayed publication event cannot double-apply.
    pub fn publish(&mut self, header: CommitmentHeader, now: Timestamp) -> Result<(), ChainError> {
        if self.halted {
            return Err(ChainError::Halted);
        }
        let expected = self.commitments.len() as u64;
        if header.sequence_number < expected {
            let stored = &self.commitments[header.sequence_number as usize];
            return if stored.header == header {
                Ok(())
            } else {
                Err(ChainError::ConflictingPublish(header.sequence_number))
            };
        }
        if header.sequence_number > expected {
            return Err(ChainError::NonContiguous {
                sequence: header.sequence_number,
                expected,
            });
        }
        if header.transaction_count == 0 {
            return Err(ChainError::EmptyBlock(header.sequence_number));
        }

        let expected_parent = self
            .commitments
            .last()
            .map(|head| head.header.block_hash)
            .unwrap_or(self.genesis_block_hash);
        if header.parent_block_hash != expected_parent {
            self.halted = true;
            tracing::error!(
                sequence = header.sequence_number,
                expected = %expected_parent,
                actual = %header.parent_block_hash,
                "parent linkage mismatch, halting publication"
            );
            return Err(ChainError::Linkage {
                sequence: header.sequence_number,
                expected: expected_parent,
                actual: header.parent_block_hash,
            });
        }

        self.commitments.push(Commitment::new(header, now));
        self.events.push(ChainEvent::Published(header.sequence_number));
        tracing::info!(
            sequence = header.sequence_number,
            state_root = %header.state_root,
            "published state commitment"
        );
        Ok(())
    }

    /// Marks a commitment [CommitmentStatus::Challenged] when a dispute opens against it. A
    /// commitment that is already challenged is left as is.
    pub fn mark_challenged(&mut self, sequence: SequenceNumber) -> Result<(), ChainError> {
        let commitment = self.get_mut(sequence)?;
        match commitment.status {
            CommitmentStatus::Submitted => {
                commitment.status = CommitmentStatus::Challenged;
                self.events.push(ChainEvent::Challenged(sequence));
                tracing::warn!(sequence, "state commitment challenged");
                Ok(())
            }
            CommitmentStatus::Challenged => Ok(()),
            from => Err(ChainError::InvalidTransition {
                sequence,
                from,
                to: CommitmentStatus::Challenged,
            }),
        }
    }

    /// Returns a challenged commitment to [CommitmentStatus::Submitted] after its defender won
    /// the dispute. The challenge window is unchanged; the commitment may be challenged again
    /// while the window remains open.
    pub fn restore_submitted(&mut self, sequence: SequenceNumber) -> Result<(), ChainError> {
        let commitment = self.get_mut(sequence)?;
        match commitment.status {
            CommitmentStatus::Challenged => {
                commitment.status = CommitmentStatus::Submitted;
                self.events.push(ChainEvent::Restored(sequence));
                tracing::info!(sequence, "state commitment restored after defender win");
                Ok(())
            }
            CommitmentStatus::Submitted => Ok(()),
            from => Err(ChainError::InvalidTransition {
                sequence,
                from,
                to: CommitmentStatus::Submitted,
            }),
        }
    }

    /// Marks a refuted commitment [CommitmentStatus::Invalid], along with every commitment of
    /// greater sequence number. Descendants were built on the refuted state, so they are
    /// invalidated regardless of their own status; even a finalized descendant is overridden.
    /// Only a [CommitmentStatus::Challenged] commitment can be invalidated directly.
    pub fn mark_invalid(&mut self, sequence: SequenceNumber) -> Result<(), ChainError> {
        let commitment = self.get_mut(sequence)?;
        match commitment.status {
            CommitmentStatus::Challenged => {
                commitment.status = CommitmentStatus::Invalid;
                self.events.push(ChainEvent::Invalidated(sequence));
                tracing::warn!(sequence, "state commitment invalidated");
            }
            CommitmentStatus::Invalid => return Ok(()),
            from => {
                return Err(ChainError::InvalidTransition {
                    sequence,
                    from,
                    to: CommitmentStatus::Invalid,
                })
            }
        }

        for descendant in (sequence + 1)..self.commitments.len() as u64 {
            let commitment = &mut self.commitments[descendant as usize];
            if commitment.status != CommitmentStatus::Invalid {
                commitment.status = CommitmentStatus::Invalid;
                self.events.push(ChainEvent::Invalidated(descendant));
                tracing::warn!(
                    sequence = descendant,
                    ancestor = sequence,
                    "descendant commitment invalidated"
                );
            }
        }
        Ok(())
    }

    /// Marks a commitment [CommitmentStatus::Finalized]. Requires the commitment to be
    /// [CommitmentStatus::Submitted], its challenge window to have elapsed, and no unresolved
    /// dispute to reference it. Finalizing an already finalized commitment is a no-op.
    pub fn mark_finalized(
        &mut self,
        sequence: SequenceNumber,
        now: Timestamp,
        active: &impl ActiveDisputes,
    ) -> Result<(), ChainError> {
        let commitment = self
            .commitments
            .get(sequence as usize)
            .ok_or(ChainError::UnknownCommitment(sequence))?;
        match commitment.status {
            CommitmentStatus::Finalized => return Ok(()),
            CommitmentStatus::Submitted => {}
            from => {
                return Err(ChainError::InvalidTransition {
                    sequence,
                    from,
                    to: CommitmentStatus::Finalized,
                })
            }
        }

        let closes_at = ChallengeWindow::new(self.config.challenge_window).closes_at(commitment);
        if now < closes_at {
            return Err(ChainError::WindowStillOpen { sequence, closes_at });
        }
        if active.has_active_dispute(sequence) {
            return Err(ChainError::ActiveDispute(sequence));
        }

        self.commitments[sequence as usize].status = CommitmentStatus::Finalized;
        self.events.push(ChainEvent::Finalized(sequence));
        tracing::info!(sequence, "state commitment finalized");
        Ok(())
    }

    /// Finalizes every commitment that is ready at `now`, in sequence order, and returns the
    /// sequence numbers finalized. The sweep stops at the first commitment that cannot finalize
    /// yet, so the finalized region of the chain grows as a prefix.
    pub fn finalize_ready(
        &mut self,
        now: Timestamp,
        active: &impl ActiveDisputes,
    ) -> Vec<SequenceNumber> {
        let mut finalized = Vec::new();
        for sequence in 0..self.commitments.len() as u64 {
            match self.commitments[sequence as usize].status {
                CommitmentStatus::Finalized | CommitmentStatus::Invalid => continue,
                CommitmentStatus::Submitted => {
                    if self.mark_finalized(sequence, now, active).is_ok() {
                        finalized.push(sequence);
                    } else {
                        break;
                    }
                }
                CommitmentStatus::Challenged => break,
            }
        }
        finalized
    }

    /// Returns the commitment at `sequence`, if published.
    pub fn get(&self, sequence: SequenceNumber) -> Option<&Commitment> {
        self.commitments.get(sequence as usize)
    }

    /// Returns the chain head.
    pub fn head(&self) -> Option<&Commitment> {
        self.commitments.last()
    }

    /// Returns the number of published commitments.
    pub fn len(&self) -> usize {
        self.commitments.len()
    }

    /// Returns `true` if nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.commitments.is_empty()
    }

    /// Returns the most recent `count` commitments, oldest first.
    pub fn latest(&self, count: usize) -> &[Commitment] {
        &self.commitments[self.commitments.len().saturating_sub(count)..]
    }

    /// Returns every commitment currently in `status`, in sequence order.
    pub fn by_status(&self, status: CommitmentStatus) -> Vec<Commitment> {
        self.commitments
            .iter()
            .filter(|commitment| commitment.status == status)
            .copied()
            .collect()
    }

    /// Returns the append-only event log.
    pub fn events(&self) -> &[ChainEvent] {
        &self.events
    }

    /// Returns the state root a dispute over `sequence` starts from: the parent commitment's
    /// state root, or the genesis state root for commitment zero.
    pub fn pre_state_root(&self, sequence: SequenceNumber) -> Result<Claim, ChainError> {
        if sequence as usize >= self.commitments.len() {
            return Err(ChainError::UnknownCommitment(sequence));
        }
        Ok(match sequence.checked_sub(1) {
            Some(parent) => self.commitments[parent as usize].state_root(),
            None => self.genesis_state_root,
        })
    }

    /// Returns `true` if publication is halted after a linkage fault.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Clears the halt latch set by a linkage fault.
    pub fn resume(&mut self) {
        if self.halted {
            self.halted = false;
            tracing::info!("commitment publication resumed");
        }
    }

    /// Returns the protocol configuration the chain was built with.
    pub fn config(&self) -> ProtocolConfig {
        self.config
    }

    /// Returns the state root the chain is anchored at.
    pub fn genesis_state_root(&self) -> Claim {
        self.genesis_state_root
    }

    fn get_mut(&mut self, sequence: SequenceNumber) -> Result<&mut Commitment, ChainError> {
        self.commitments
            .get_mut(sequence as usize)
            .ok_or(ChainError::UnknownCommitment(sequence))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use balin_primitives::NoDisputes;

    const WINDOW: Timestamp = 100;

    fn test_chain() -> StateCommitmentChain {
        let config = ProtocolConfig::default().with_challenge_window(WINDOW);
        StateCommitmentChain::new(config, block_hash(0), B256::ZERO)
    }

    fn block_hash(sequence: u64) -> B256 {
        B256::with_last_byte(sequence as u8 + 1)
    }

    fn header(sequence: u64) -> CommitmentHeader {
        CommitmentHeader {
            sequence_number: sequence,
            block_hash: block_hash(sequence + 1),
            parent_block_hash: block_hash(sequence),
            state_root: B256::with_last_byte(0x80 + sequence as u8),
            transactions_root: B256::with_last_byte(0xC0 + sequence as u8),
            transaction_count: 8,
        }
    }

    fn published(count: u64) -> StateCommitmentChain {
        let mut chain = test_chain();
        for sequence in 0..count {
            chain.publish(header(sequence), 0).unwrap();
        }
        chain
    }

    #[test]
    fn publish_appends_in_order() {
        let chain = published(3);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.head().unwrap().sequence_number(), 2);
        assert_eq!(
            chain.events(),
            &[
                ChainEvent::Published(0),
                ChainEvent::Published(1),
                ChainEvent::Published(2)
            ]
        );
    }

    #[test]
    fn publish_rejects_sequence_gap() {
        let mut chain = published(1);
        assert_eq!(
            chain.publish(header(2), 0).unwrap_err(),
            ChainError::NonContiguous {
                sequence: 2,
                expected: 1
            }
        );
        assert!(!chain.is_halted());
    }

    #[test]
    fn publish_rejects_empty_block() {
        let mut chain = test_chain();
        let mut first = header(0);
        first.transaction_count = 0;
        assert_eq!(
            chain.publish(first, 0).unwrap_err(),
            ChainError::EmptyBlock(0)
        );
    }

    #[test]
    fn replayed_publish_is_a_no_op() {
        let mut chain = published(2);
        chain.publish(header(1), 99).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.events().len(), 2);
        assert_eq!(chain.get(1).unwrap().published_at, 0);
    }

    #[test]
    fn conflicting_republish_is_rejected() {
        let mut chain = published(2);
        let mut forged = header(1);
        forged.state_root = B256::with_last_byte(0xFF);
        assert_eq!(
            chain.publish(forged, 0).unwrap_err(),
            ChainError::ConflictingPublish(1)
        );
    }

    #[test]
    fn linkage_fault_halts_until_resumed() {
        let mut chain = published(1);
        let mut bad = header(1);
        bad.parent_block_hash = B256::with_last_byte(0xEE);
        let err = chain.publish(bad, 0).unwrap_err();
        assert!(matches!(err, ChainError::Linkage { sequence: 1, .. }));
        assert!(chain.is_halted());

        // Even a correctly linked header is refused while halted.
        assert_eq!(chain.publish(header(1), 0).unwrap_err(), ChainError::Halted);

        chain.resume();
        chain.publish(header(1), 0).unwrap();
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn linkage_is_checked_even_with_correct_sequence() {
        let mut chain = test_chain();
        let mut first = header(0);
        first.parent_block_hash = B256::with_last_byte(0xEE);
        assert!(matches!(
            chain.publish(first, 0).unwrap_err(),
            ChainError::Linkage { sequence: 0, .. }
        ));
    }

    #[test]
    fn challenge_and_restore_round_trip() {
        let mut chain = published(1);
        chain.mark_challenged(0).unwrap();
        assert_eq!(chain.get(0).unwrap().status, CommitmentStatus::Challenged);

        // Replayed challenge events do not double-apply.
        chain.mark_challenged(0).unwrap();
        assert_eq!(chain.events().len(), 2);

        chain.restore_submitted(0).unwrap();
        assert_eq!(chain.get(0).unwrap().status, CommitmentStatus::Submitted);
        assert_eq!(
            chain.events(),
            &[
                ChainEvent::Published(0),
                ChainEvent::Challenged(0),
                ChainEvent::Restored(0)
            ]
        );
    }

    #[test]
    fn invalidation_requires_a_challenge() {
        let mut chain = published(1);
        assert_eq!(
            chain.mark_invalid(0).unwrap_err(),
            ChainError::InvalidTransition {
                sequence: 0,
                from: CommitmentStatus::Submitted,
                to: CommitmentStatus::Invalid
            }
        );
    }

    #[test]
    fn invalidation_sweeps_descendants() {
        let mut chain = published(5);
        chain.mark_challenged(2).unwrap();
        chain.mark_invalid(2).unwrap();

        assert_eq!(chain.get(0).unwrap().status, CommitmentStatus::Submitted);
        assert_eq!(chain.get(1).unwrap().status, CommitmentStatus::Submitted);
        for sequence in 2..5 {
            assert_eq!(chain.get(sequence).unwrap().status, CommitmentStatus::Invalid);
        }

        // Replaying the invalidation adds no further events.
        let events_before = chain.events().len();
        chain.mark_invalid(2).unwrap();
        assert_eq!(chain.events().len(), events_before);
    }

    #[test]
    fn invalidation_overrides_finalized_descendants() {
        let mut chain = published(4);
        chain.mark_finalized(3, WINDOW, &NoDisputes).unwrap();
        assert_eq!(chain.get(3).unwrap().status, CommitmentStatus::Finalized);

        chain.mark_challenged(1).unwrap();
        chain.mark_invalid(1).unwrap();
        for sequence in 1..4 {
            assert_eq!(chain.get(sequence).unwrap().status, CommitmentStatus::Invalid);
        }
    }

    #[test]
    fn finalization_waits_for_the_window() {
        let mut chain = published(1);
        assert_eq!(
            chain.mark_finalized(0, WINDOW - 1, &NoDisputes).unwrap_err(),
            ChainError::WindowStillOpen {
                sequence: 0,
                closes_at: WINDOW
            }
        );
        chain.mark_finalized(0, WINDOW, &NoDisputes).unwrap();
        assert_eq!(chain.get(0).unwrap().status, CommitmentStatus::Finalized);

        // Finalization is terminal and idempotent.
        chain.mark_finalized(0, WINDOW, &NoDisputes).unwrap();
        assert_eq!(chain.events().len(), 2);
    }

    #[test]
    fn finalization_waits_for_open_disputes() {
        struct AlwaysDisputed;
        impl ActiveDisputes for AlwaysDisputed {
            fn has_active_dispute(&self, _: SequenceNumber) -> bool {
                true
            }
        }

        let mut chain = published(1);
        assert_eq!(
            chain.mark_finalized(0, WINDOW, &AlwaysDisputed).unwrap_err(),
            ChainError::ActiveDispute(0)
        );
    }

    #[test]
    fn sweep_finalizes_a_prefix() {
        let mut chain = published(5);
        chain.mark_challenged(2).unwrap();

        // The sweep stops at the challenged commitment even though later windows have elapsed.
        assert_eq!(chain.finalize_ready(WINDOW, &NoDisputes), vec![0, 1]);
        assert_eq!(chain.get(3).unwrap().status, CommitmentStatus::Submitted);

        chain.restore_submitted(2).unwrap();
        assert_eq!(chain.finalize_ready(WINDOW, &NoDisputes), vec![2, 3, 4]);
    }

    #[test]
    fn sweep_skips_invalid_commitments() {
        let mut chain = published(3);
        chain.mark_challenged(0).unwrap();
        chain.mark_invalid(0).unwrap();
        assert_eq!(chain.finalize_ready(WINDOW, &NoDisputes), Vec::<u64>::new());
    }

    #[test]
    fn pre_state_root_anchors_at_genesis() {
        let chain = published(2);
        assert_eq!(chain.pre_state_root(0).unwrap(), B256::ZERO);
        assert_eq!(
            chain.pre_state_root(1).unwrap(),
            chain.get(0).unwrap().state_root()
        );
        assert_eq!(
            chain.pre_state_root(2).unwrap_err(),
            ChainError::UnknownCommitment(2)
        );
    }

    #[test]
    fn status_queries() {
        let mut chain = published(3);
        chain.mark_challenged(1).unwrap();
        let challenged = chain.by_status(CommitmentStatus::Challenged);
        assert_eq!(challenged.len(), 1);
        assert_eq!(challenged[0].sequence_number(), 1);

        let latest = chain.latest(2);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].sequence_number(), 1);
        assert_eq!(chain.latest(10).len(), 3);
    }
}
